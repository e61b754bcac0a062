//! Semantic Token Linting
//!
//! Checks the persisted store beyond plain JSON validity. Validation is
//! exhaustive: every rule runs over every leaf and all issues are returned
//! together.
//!
//! ## Rules
//! 1. **KEY_FORMAT**: every leaf dot path matches `[a-z0-9]+(\.[a-z0-9]+)*`
//! 2. **DEPRECATED_NO_REPLACEMENT**: `deprecated: true` without `replacement`
//! 3. **REPLACEMENT_MISSING**: `replacement` names no existing token
//! 4. **DUPLICATE_VALUE_SAME_CATEGORY**: one literal value used twice in a category
//! 5. **DUPLICATE_VALUE_CROSS_CATEGORY**: one literal value across categories
//!    with no alias evidence on any member
//! 6. **STORE_EMPTY**: the store has no tokens
//!
//! Rules 2, 3 and 5 are warnings in [`RunMode::Fast`] and errors in
//! [`RunMode::Deep`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::naming::is_canonical;
use crate::store::TokenStore;

/// Fields whose presence marks a token as an intentional alias
const ALIAS_EVIDENCE_FIELDS: &[&str] = &["replacement", "aliasOf", "mappedTo"];

/// Strictness of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Local runs
    #[default]
    Fast,
    /// CI runs
    Deep,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(RunMode::Fast),
            "deep" => Ok(RunMode::Deep),
            other => Err(format!("unknown lint mode '{}' (expected fast or deep)", other)),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Fast => write!(f, "fast"),
            RunMode::Deep => write!(f, "deep"),
        }
    }
}

/// Result of linting a store
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub mode: RunMode,
    pub tokens: usize,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Error lines, for [`TokenError::Validation`](crate::TokenError::Validation)
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect()
    }

    /// Push a mode-dependent issue
    fn escalate(&mut self, mode: RunMode, code: &'static str, message: String, path: String) {
        match mode {
            RunMode::Deep => self.errors.push(LintError { code, message, path }),
            RunMode::Fast => self.warnings.push(LintWarning { code, message, path }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LintError {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

/// One leaf as seen by the duplicate-value rule
struct Member {
    path: String,
    category: String,
    alias_evidence: bool,
}

/// The semantic validator
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticValidator {
    mode: RunMode,
}

impl SemanticValidator {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn validate(&self, store: &TokenStore) -> LintResult {
        let leaves = store.leaves();
        let mut result = LintResult {
            mode: self.mode,
            tokens: leaves.len(),
            ..Default::default()
        };

        if leaves.is_empty() {
            result.warnings.push(LintWarning {
                code: "STORE_EMPTY",
                message: "Token store contains no tokens".to_string(),
                path: String::new(),
            });
            return result;
        }

        for leaf in &leaves {
            self.check_key_format(&leaf.path, &mut result);
            self.check_deprecation(&leaf.path, leaf.record, store, &mut result);
        }
        self.check_duplicates(
            leaves.iter().map(|l| (l.path.as_str(), l.record)),
            &mut result,
        );

        result
    }

    fn check_key_format(&self, path: &str, result: &mut LintResult) {
        if !is_canonical(path) {
            result.errors.push(LintError {
                code: "KEY_FORMAT",
                message: format!(
                    "Invalid token key format: \"{}\". Use lowercase alphanum and dots.",
                    path
                ),
                path: path.to_string(),
            });
        }
    }

    fn check_deprecation(
        &self,
        path: &str,
        record: &Map<String, Value>,
        store: &TokenStore,
        result: &mut LintResult,
    ) {
        let replacement = record
            .get("replacement")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty());

        if record.get("deprecated") == Some(&Value::Bool(true)) && replacement.is_none() {
            result.escalate(
                self.mode,
                "DEPRECATED_NO_REPLACEMENT",
                format!("Token {} is deprecated but has no 'replacement' field.", path),
                path.to_string(),
            );
        }

        if let Some(target) = replacement {
            if !store.is_leaf(target) {
                result.escalate(
                    self.mode,
                    "REPLACEMENT_MISSING",
                    format!("Token {} names replacement {} which does not exist.", path, target),
                    path.to_string(),
                );
            }
        }
    }

    fn check_duplicates<'a>(
        &self,
        leaves: impl Iterator<Item = (&'a str, &'a Map<String, Value>)>,
        result: &mut LintResult,
    ) {
        // value groups in first-seen order
        let mut groups: Vec<(String, Vec<Member>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (path, record) in leaves {
            let Some(key) = record.get("value").and_then(literal_key) else {
                continue;
            };
            let member = Member {
                path: path.to_string(),
                category: category_of(path, record),
                alias_evidence: has_alias_evidence(record),
            };
            match index.get(&key) {
                Some(&i) => groups[i].1.push(member),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, vec![member]));
                }
            }
        }

        for (value, members) in groups.iter().filter(|(_, m)| m.len() > 1) {
            let mut categories: Vec<(&str, Vec<&str>)> = Vec::new();
            for member in members {
                let (category, path) = (member.category.as_str(), member.path.as_str());
                match categories.iter_mut().find(|(c, _)| *c == category) {
                    Some((_, paths)) => paths.push(path),
                    None => categories.push((category, vec![path])),
                }
            }

            for (category, paths) in categories.iter().filter(|(_, p)| p.len() > 1) {
                result.errors.push(LintError {
                    code: "DUPLICATE_VALUE_SAME_CATEGORY",
                    message: format!(
                        "Duplicate value \"{}\" in category {}: {}",
                        value,
                        category,
                        paths.join(", ")
                    ),
                    path: paths[0].to_string(),
                });
            }

            if categories.len() > 1 && !members.iter().any(|m| m.alias_evidence) {
                let names: Vec<&str> = categories.iter().map(|(c, _)| *c).collect();
                let paths: Vec<&str> = members.iter().map(|m| m.path.as_str()).collect();
                result.escalate(
                    self.mode,
                    "DUPLICATE_VALUE_CROSS_CATEGORY",
                    format!(
                        "Value \"{}\" shared across categories {} without alias evidence: {}",
                        value,
                        names.join(", "),
                        paths.join(", ")
                    ),
                    members[0].path.clone(),
                );
            }
        }
    }
}

/// Grouping key for a literal value: trimmed strings, compact JSON otherwise
fn literal_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// `type`, else `attributes.category`, else the first path segment
fn category_of(path: &str, record: &Map<String, Value>) -> String {
    record
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| {
            record
                .get("attributes")
                .and_then(|a| a.get("category"))
                .and_then(Value::as_str)
        })
        .map(String::from)
        .unwrap_or_else(|| path.split('.').next().unwrap_or_default().to_string())
}

fn has_alias_evidence(record: &Map<String, Value>) -> bool {
    record.get("deprecated") == Some(&Value::Bool(true))
        || ALIAS_EVIDENCE_FIELDS
            .iter()
            .any(|field| record.get(*field).map(is_truthy).unwrap_or(false))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Human-readable lint output
pub fn render_text(result: &LintResult) -> String {
    let mut out = Vec::new();
    if !result.errors.is_empty() {
        out.push(format!("Errors ({}):", result.errors.len()));
        for e in &result.errors {
            out.push(format!(" - [{}] {}", e.code, e.message));
        }
    }
    if !result.warnings.is_empty() {
        out.push(format!("Warnings ({}):", result.warnings.len()));
        for w in &result.warnings {
            out.push(format!(" - [{}] {}", w.code, w.message));
        }
    }
    if result.is_clean() {
        out.push(format!("OK: {} tokens passed {} lint rules.", result.tokens, result.mode));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(v: Value) -> TokenStore {
        TokenStore::from_value(v).unwrap()
    }

    fn codes<T>(items: &[T], code: impl Fn(&T) -> &'static str) -> Vec<&'static str> {
        items.iter().map(code).collect()
    }

    #[test]
    fn test_key_format() {
        let s = store(json!({"Color": {"Brand": {"value": "#FFFFFF"}}, "ok": {"value": 1}}));
        let result = SemanticValidator::default().validate(&s);
        assert_eq!(codes(&result.errors, |e| e.code), vec!["KEY_FORMAT"]);
        assert_eq!(result.errors[0].path, "Color.Brand");
    }

    #[test]
    fn test_deprecated_severity_follows_mode() {
        let s = store(json!({"old": {"value": 1, "deprecated": true}}));
        let fast = SemanticValidator::new(RunMode::Fast).validate(&s);
        assert!(fast.is_clean());
        assert_eq!(codes(&fast.warnings, |w| w.code), vec!["DEPRECATED_NO_REPLACEMENT"]);

        let deep = SemanticValidator::new(RunMode::Deep).validate(&s);
        assert_eq!(codes(&deep.errors, |e| e.code), vec!["DEPRECATED_NO_REPLACEMENT"]);
    }

    #[test]
    fn test_replacement_must_exist() {
        let s = store(json!({
            "a": {"value": 1, "deprecated": true, "replacement": "b"},
            "c": {"value": 2, "deprecated": true, "replacement": "missing.key"},
            "b": {"value": 3}
        }));
        let result = SemanticValidator::new(RunMode::Deep).validate(&s);
        assert_eq!(codes(&result.errors, |e| e.code), vec!["REPLACEMENT_MISSING"]);
        assert_eq!(result.errors[0].path, "c");
    }

    #[test]
    fn test_duplicate_same_category_is_one_error() {
        let s = store(json!({
            "color": {
                "a": {"value": "#FFFFFF", "type": "color"},
                "b": {"value": " #FFFFFF ", "type": "color"}
            }
        }));
        let result = SemanticValidator::default().validate(&s);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "DUPLICATE_VALUE_SAME_CATEGORY");
        assert!(result.errors[0].message.contains("color.a, color.b"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_same_category_even_with_alias_evidence() {
        let s = store(json!({
            "a": {"value": 4, "type": "spacing", "aliasOf": "b"},
            "b": {"value": 4, "type": "spacing"}
        }));
        let result = SemanticValidator::default().validate(&s);
        assert_eq!(codes(&result.errors, |e| e.code), vec!["DUPLICATE_VALUE_SAME_CATEGORY"]);
    }

    #[test]
    fn test_cross_category_needs_alias_evidence() {
        let plain = store(json!({
            "color": {"white": {"value": "#FFFFFF"}},
            "surface": {"bg": {"value": "#FFFFFF"}}
        }));
        let deep = SemanticValidator::new(RunMode::Deep).validate(&plain);
        assert_eq!(codes(&deep.errors, |e| e.code), vec!["DUPLICATE_VALUE_CROSS_CATEGORY"]);
        let fast = SemanticValidator::new(RunMode::Fast).validate(&plain);
        assert!(fast.is_clean());
        assert_eq!(codes(&fast.warnings, |w| w.code), vec!["DUPLICATE_VALUE_CROSS_CATEGORY"]);

        let aliased = store(json!({
            "color": {"white": {"value": "#FFFFFF"}},
            "surface": {"bg": {"value": "#FFFFFF", "mappedTo": "color.white"}}
        }));
        let result = SemanticValidator::new(RunMode::Deep).validate(&aliased);
        assert!(result.is_clean());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_falsy_alias_fields_are_not_evidence() {
        let s = store(json!({
            "color": {"white": {"value": "#FFFFFF", "aliasOf": "", "deprecated": false}},
            "surface": {"bg": {"value": "#FFFFFF", "mappedTo": null}}
        }));
        let result = SemanticValidator::new(RunMode::Deep).validate(&s);
        assert_eq!(codes(&result.errors, |e| e.code), vec!["DUPLICATE_VALUE_CROSS_CATEGORY"]);
    }

    #[test]
    fn test_category_from_attributes() {
        let s = store(json!({
            "x": {"value": 8, "attributes": {"category": "size"}},
            "y": {"value": 8, "attributes": {"category": "size"}}
        }));
        let result = SemanticValidator::default().validate(&s);
        assert!(result.errors[0].message.contains("category size"));
    }

    #[test]
    fn test_empty_store_warns() {
        let result = SemanticValidator::default().validate(&TokenStore::new());
        assert!(result.is_clean());
        assert_eq!(codes(&result.warnings, |w| w.code), vec!["STORE_EMPTY"]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("deep".parse::<RunMode>().unwrap(), RunMode::Deep);
        assert!("strict".parse::<RunMode>().is_err());
    }
}

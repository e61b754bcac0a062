//! Canonical token types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a canonical token came from.
///
/// Persisted under `meta.raw`. Small entries are kept verbatim; oversized ones
/// are reduced to their key list so stores and fixtures stay a predictable size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Verbatim { raw: Value },
    Truncated { keys: Vec<String>, bytes: usize },
}

impl Provenance {
    /// Capture a raw entry, truncating when it serializes past `limit` bytes
    pub fn capture(raw: &Value, limit: usize) -> Self {
        let bytes = serde_json::to_string(raw).map(|s| s.len()).unwrap_or(0);
        if bytes <= limit {
            return Provenance::Verbatim { raw: raw.clone() };
        }
        let keys = raw
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        Provenance::Truncated { keys, bytes }
    }

    /// The value stored as `meta.raw`
    pub fn to_meta_value(&self) -> Value {
        match self {
            Provenance::Verbatim { raw } => raw.clone(),
            Provenance::Truncated { keys, bytes } => serde_json::json!({
                "truncated": true,
                "keys": keys,
                "bytes": bytes,
            }),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Provenance::Truncated { .. })
    }
}

/// A canonical token, recomputed from raw input on every run
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Name as it appeared in the export (for reports)
    pub name: String,
    /// Unique store key
    pub dot_path: String,
    /// Scalar, canonical color string, or mode map
    pub value: Value,
    /// Semantic category (e.g. "color", "spacing")
    pub token_type: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
    /// Dot path of the successor token
    pub replacement: Option<String>,
    /// Extensible metadata, excluding `raw`
    pub meta: Map<String, Value>,
    pub provenance: Provenance,
}

impl Token {
    /// The record written at this token's dot path in the persisted store
    pub fn to_store_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("value".to_string(), self.value.clone());
        self.insert_optional_fields(&mut record);
        record.insert("meta".to_string(), Value::Object(self.full_meta()));
        record
    }

    /// The entry written into a canonical export document's `tokens` array
    pub fn to_export_entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".to_string(), Value::String(self.name.clone()));
        entry.insert("dotPath".to_string(), Value::String(self.dot_path.clone()));
        entry.insert("value".to_string(), self.value.clone());
        self.insert_optional_fields(&mut entry);
        entry.insert("meta".to_string(), Value::Object(self.full_meta()));
        Value::Object(entry)
    }

    /// `meta` including the provenance under `raw`
    pub fn full_meta(&self) -> Map<String, Value> {
        let mut meta = self.meta.clone();
        meta.insert("raw".to_string(), self.provenance.to_meta_value());
        meta
    }

    fn insert_optional_fields(&self, target: &mut Map<String, Value>) {
        if let Some(t) = &self.token_type {
            target.insert("type".to_string(), Value::String(t.clone()));
        }
        if let Some(d) = &self.description {
            target.insert("description".to_string(), Value::String(d.clone()));
        }
        if let Some(d) = self.deprecated {
            target.insert("deprecated".to_string(), Value::Bool(d));
        }
        if let Some(r) = &self.replacement {
            target.insert("replacement".to_string(), Value::String(r.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Token {
        Token {
            name: "color/brand/primary".to_string(),
            dot_path: "color.brand.primary".to_string(),
            value: json!("#FF0000"),
            token_type: Some("color".to_string()),
            description: None,
            deprecated: None,
            replacement: None,
            meta: Map::new(),
            provenance: Provenance::capture(&json!({"value": "#f00"}), 4096),
        }
    }

    #[test]
    fn test_store_record_shape() {
        let record = sample().to_store_record();
        assert_eq!(record["value"], json!("#FF0000"));
        assert_eq!(record["type"], json!("color"));
        assert_eq!(record["meta"]["raw"], json!({"value": "#f00"}));
        assert!(!record.contains_key("description"));
    }

    #[test]
    fn test_export_entry_carries_names() {
        let entry = sample().to_export_entry();
        assert_eq!(entry["name"], json!("color/brand/primary"));
        assert_eq!(entry["dotPath"], json!("color.brand.primary"));
    }

    #[test]
    fn test_provenance_is_bounded() {
        let big = json!({"value": "x".repeat(200), "type": "color"});
        let p = Provenance::capture(&big, 64);
        assert!(p.is_truncated());
        let meta = p.to_meta_value();
        assert_eq!(meta["truncated"], json!(true));
        assert_eq!(meta["keys"], json!(["value", "type"]));
    }
}

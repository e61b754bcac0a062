//! Canonicalization
//!
//! Turns flattened `(rawName, rawEntry)` pairs into canonical [`Token`]s:
//! resolves the dot path, pulls the descriptive fields, delegates value work
//! to the [`ValueNormalizer`], and attaches bounded provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TokenError};
use crate::extract::RawEntry;
use crate::naming::{is_addressable, normalize_dot_path};
use crate::token::{Provenance, Token};
use crate::value::ValueNormalizer;

/// Schema version written into canonical export documents
pub const CANONICAL_SCHEMA_VERSION: &str = "1.0";

// =============================================================================
// Style Map
// =============================================================================

/// Explicit raw-name to dot-path mappings (`FIGMA_STYLE_MAP.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleMap {
    #[serde(default)]
    pub mappings: HashMap<String, String>,
}

impl StyleMap {
    /// Load a style map. A missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no style map, using name-derived dot paths");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| TokenError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, raw_name: &str) -> Option<&str> {
        self.mappings.get(raw_name).map(String::as_str)
    }
}

// =============================================================================
// Canonicalizer
// =============================================================================

/// Outcome for a single raw entry
#[derive(Debug, Clone, PartialEq)]
pub enum Canonicalized {
    Token(Box<Token>),
    /// No usable dot path
    Unmapped { name: String, reason: String },
    /// Dot path resolved but no value could be derived
    Dropped {
        name: String,
        dot_path: String,
        reason: String,
    },
}

/// All canonical tokens for one run, plus the entries that did not make it
#[derive(Debug, Default)]
pub struct CanonicalBatch {
    pub tokens: Vec<Token>,
    pub unmapped: Vec<(String, String)>,
    /// (dot path, raw name, note)
    pub dropped: Vec<(String, String, String)>,
}

/// Converts raw entries into canonical tokens
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    normalizer: ValueNormalizer,
    style_map: StyleMap,
    provenance_limit: usize,
}

impl Canonicalizer {
    pub fn new(normalizer: ValueNormalizer, style_map: StyleMap, provenance_limit: usize) -> Self {
        Self {
            normalizer,
            style_map,
            provenance_limit,
        }
    }

    /// Explicit `dotPath` wins, then the style map, then the normalized name
    pub fn resolve_dot_path(&self, name: &str, entry: &Map<String, Value>) -> String {
        if let Some(explicit) = entry.get("dotPath").and_then(Value::as_str) {
            if !explicit.trim().is_empty() {
                return explicit.to_string();
            }
        }
        if let Some(mapped) = self.style_map.get(name) {
            return mapped.to_string();
        }
        normalize_dot_path(name)
    }

    pub fn canonicalize(&self, raw: &RawEntry) -> Canonicalized {
        let name = raw.name.trim_start_matches('/').to_string();
        let entry = &raw.entry;

        let dot_path = self.resolve_dot_path(&name, entry);
        if dot_path.trim().is_empty() {
            return Canonicalized::Unmapped {
                name,
                reason: "empty token key after mapping".to_string(),
            };
        }
        if !is_addressable(&dot_path) {
            return Canonicalized::Unmapped {
                name,
                reason: format!("dot path '{}' has empty segments", dot_path),
            };
        }

        let token_type = string_field(entry, "type").or_else(|| string_field(entry, "category"));

        let normalized = match self.normalizer.normalize_entry(&name, entry, token_type.as_deref()) {
            Ok(n) => n,
            Err(reason) => {
                return Canonicalized::Dropped {
                    name,
                    dot_path,
                    reason,
                }
            }
        };

        let mut meta = entry
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        // an already-canonical entry carries the original source entry
        let provenance_source = meta.shift_remove("raw").unwrap_or_else(|| Value::Object(entry.clone()));
        if let Some(modes) = normalized.modes {
            meta.insert("modes".to_string(), Value::Object(modes));
        }
        if normalized.inferred_from_name {
            meta.insert("inferredFrom".to_string(), Value::String("name".to_string()));
        }

        Canonicalized::Token(Box::new(Token {
            name,
            dot_path,
            value: normalized.value,
            token_type,
            description: string_field(entry, "description"),
            deprecated: entry.get("deprecated").and_then(Value::as_bool),
            replacement: string_field(entry, "replacement"),
            meta,
            provenance: Provenance::capture(&provenance_source, self.provenance_limit),
        }))
    }

    pub fn canonicalize_all(&self, entries: &[RawEntry]) -> CanonicalBatch {
        let mut batch = CanonicalBatch::default();
        for raw in entries {
            match self.canonicalize(raw) {
                Canonicalized::Token(token) => batch.tokens.push(*token),
                Canonicalized::Unmapped { name, reason } => batch.unmapped.push((name, reason)),
                Canonicalized::Dropped {
                    name,
                    dot_path,
                    reason,
                } => {
                    debug!(%dot_path, %name, %reason, "token dropped");
                    batch.dropped.push((dot_path, name, reason));
                }
            }
        }
        batch
    }
}

fn string_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Merge record metadata on update: the incoming meta replaces the prior one,
/// except protected fields, which survive from `prior` when `incoming` lacks them.
pub fn merge_meta(
    prior: &Map<String, Value>,
    incoming: &Map<String, Value>,
    protected: &[String],
) -> Map<String, Value> {
    let mut merged = incoming.clone();
    for field in protected {
        if merged.contains_key(field) {
            continue;
        }
        if let Some(value) = prior.get(field) {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}

// =============================================================================
// Canonical Export Document
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSource {
    pub plugin: String,
}

/// The canonical export written by the adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalExport {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    pub source: ExportSource,
    pub tokens: Vec<Value>,
}

impl CanonicalExport {
    pub fn new(plugin: impl Into<String>, exported_at: DateTime<Utc>, tokens: &[Token]) -> Self {
        Self {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            exported_at,
            source: ExportSource {
                plugin: plugin.into(),
            },
            tokens: tokens.iter().map(Token::to_export_entry).collect(),
        }
    }
}

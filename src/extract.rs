//! Export Shape Detection
//!
//! Design tools export tokens in several ad-hoc nested JSON shapes. Each
//! supported shape is an [`ExportShape`] variant with a pure detection
//! predicate and a pure flatten function; [`extract`] tries them in priority
//! order and stops at the first one that yields entries.
//!
//! This is pure structural work - no value normalization happens here.

use semver::Version;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TokenError};

/// Keys whose presence marks an object as a token leaf in a generic tree
const LEAF_MARKERS: &[&str] = &["value", "type", "description", "meta"];

/// Explicit node-kind flag that overrides the leaf heuristic
pub const NODE_KIND_KEY: &str = "$node";

/// Root keys that wrap the actual token tree in some tools
const TREE_ROOTS: &[&str] = &["tokens", "global", "values", "dictionary"];

// =============================================================================
// Raw Entries
// =============================================================================

/// One flattened `(rawName, rawEntry)` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEntry {
    /// Name as exported, segments joined by `/`
    pub name: String,
    /// Entry object, primitives already wrapped as `{value}`
    pub entry: Map<String, Value>,
}

impl RawEntry {
    fn new(name: impl Into<String>, entry: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            entry,
        }
    }

    fn wrapped(name: impl Into<String>, value: &Value) -> Self {
        let mut entry = Map::new();
        entry.insert("value".to_string(), value.clone());
        Self::new(name, entry)
    }
}

/// Non-fatal issue found while flattening
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractWarning {
    /// Name path of the node concerned (empty for document-level issues)
    pub path: String,
    pub note: String,
}

impl ExtractWarning {
    fn new(path: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            note: note.into(),
        }
    }
}

/// Output of one shape's flatten function
#[derive(Debug, Default)]
pub struct Flattened {
    pub entries: Vec<RawEntry>,
    pub warnings: Vec<ExtractWarning>,
}

// =============================================================================
// Export Shapes
// =============================================================================

/// Supported export document shapes, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportShape {
    /// `{schemaVersion, tokens: [{name, dotPath?, value, ...}]}`
    Canonical,
    /// `{"color/brand/primary": {"value": ..., "type": ...}, ...}`
    FlatMap,
    /// `{"properties": {...}}` or `{"props": {...}}`
    Properties,
    /// `{"styles": [...]}` or a bare array of named styles
    Styles,
    /// Any other object tree
    Tree,
}

impl ExportShape {
    pub const PRIORITY: [ExportShape; 5] = [
        ExportShape::Canonical,
        ExportShape::FlatMap,
        ExportShape::Properties,
        ExportShape::Styles,
        ExportShape::Tree,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExportShape::Canonical => "canonical",
            ExportShape::FlatMap => "flat-map",
            ExportShape::Properties => "properties",
            ExportShape::Styles => "styles",
            ExportShape::Tree => "tree",
        }
    }

    /// Whether `doc` structurally looks like this shape
    pub fn detect(&self, doc: &Value) -> bool {
        match self {
            ExportShape::Canonical => doc.get("tokens").map(Value::is_array).unwrap_or(false),
            ExportShape::FlatMap => doc
                .as_object()
                .map(|obj| {
                    let mut children = obj.values().filter(|v| !v.is_null()).peekable();
                    children.peek().is_some()
                        && children.all(|v| {
                            v.as_object()
                                .map(|o| o.contains_key("value") || o.contains_key("type"))
                                .unwrap_or(false)
                        })
                })
                .unwrap_or(false),
            ExportShape::Properties => properties_root(doc).is_some(),
            ExportShape::Styles => styles_root(doc).is_some(),
            ExportShape::Tree => doc.is_object(),
        }
    }

    /// Flatten `doc` into raw entries. Callers check [`detect`](Self::detect) first.
    pub fn flatten(&self, doc: &Value) -> Flattened {
        match self {
            ExportShape::Canonical => flatten_canonical(doc),
            ExportShape::FlatMap => flatten_flat_map(doc),
            ExportShape::Properties => {
                let mut out = Flattened::default();
                if let Some(props) = properties_root(doc) {
                    walk_tree(props, &mut Vec::new(), &mut out);
                }
                out
            }
            ExportShape::Styles => flatten_styles(doc),
            ExportShape::Tree => {
                let mut out = Flattened::default();
                if let Some(root) = tree_root(doc) {
                    walk_tree(root, &mut Vec::new(), &mut out);
                }
                out
            }
        }
    }
}

/// Result of shape detection + flattening
#[derive(Debug, Default)]
pub struct Extraction {
    /// Shape that produced the entries (None when nothing matched)
    pub shape: Option<ExportShape>,
    pub entries: Vec<RawEntry>,
    pub warnings: Vec<ExtractWarning>,
}

/// Read an export document from disk
pub fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| TokenError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Detect the export shape of `doc` and flatten it
pub fn extract(doc: &Value) -> Extraction {
    for shape in ExportShape::PRIORITY {
        if !shape.detect(doc) {
            continue;
        }
        let flattened = shape.flatten(doc);
        if flattened.entries.is_empty() {
            debug!(shape = shape.label(), "shape matched but yielded no entries");
            continue;
        }
        debug!(shape = shape.label(), entries = flattened.entries.len(), "export shape detected");
        return Extraction {
            shape: Some(shape),
            entries: flattened.entries,
            warnings: flattened.warnings,
        };
    }
    Extraction::default()
}

// =============================================================================
// Shape Roots
// =============================================================================

fn properties_root(doc: &Value) -> Option<&Map<String, Value>> {
    doc.get("properties")
        .and_then(Value::as_object)
        .or_else(|| doc.get("props").and_then(Value::as_object))
}

fn styles_root(doc: &Value) -> Option<&Vec<Value>> {
    match doc {
        Value::Array(items) if !items.is_empty() => Some(items),
        _ => doc
            .get("styles")
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty()),
    }
}

fn tree_root(doc: &Value) -> Option<&Map<String, Value>> {
    let obj = doc.as_object()?;
    for key in TREE_ROOTS {
        if let Some(inner) = obj.get(*key).and_then(Value::as_object) {
            return Some(inner);
        }
    }
    Some(obj)
}

// =============================================================================
// Flatten Functions
// =============================================================================

fn flatten_canonical(doc: &Value) -> Flattened {
    let mut out = Flattened::default();

    if let Some(version) = doc.get("schemaVersion") {
        let supported = version.as_str().map(schema_version_supported).unwrap_or(false);
        if !supported {
            out.warnings.push(ExtractWarning::new(
                "",
                format!("schemaVersion {} is not 1.x; processing anyway", version),
            ));
        }
    }

    let Some(tokens) = doc.get("tokens").and_then(Value::as_array) else {
        return out;
    };
    for (idx, item) in tokens.iter().enumerate() {
        match item {
            Value::Null => continue,
            Value::Object(obj) => {
                let name = obj
                    .get("name")
                    .and_then(Value::as_str)
                    .or_else(|| obj.get("dotPath").and_then(Value::as_str))
                    .unwrap_or_default();
                out.entries.push(RawEntry::new(name, obj.clone()));
            }
            _ => out.warnings.push(ExtractWarning::new(
                format!("tokens/{}", idx),
                "token entry is not an object",
            )),
        }
    }
    out
}

fn flatten_flat_map(doc: &Value) -> Flattened {
    let mut out = Flattened::default();
    if let Some(obj) = doc.as_object() {
        for (name, child) in obj {
            if let Some(entry) = child.as_object() {
                out.entries.push(RawEntry::new(name.clone(), entry.clone()));
            }
        }
    }
    out
}

fn flatten_styles(doc: &Value) -> Flattened {
    let mut out = Flattened::default();
    let Some(items) = styles_root(doc) else {
        return out;
    };

    for (idx, item) in items.iter().enumerate() {
        let Some(style) = item.as_object() else {
            continue;
        };
        let Some(name) = style.get("name").and_then(Value::as_str) else {
            out.warnings.push(ExtractWarning::new(
                format!("styles/{}", idx),
                "style has no name; skipped",
            ));
            continue;
        };

        let mut entry = style.clone();
        if entry.get("value").map(Value::is_null).unwrap_or(true) {
            if let Some(value) = style_value(style) {
                entry.insert("value".to_string(), value.clone());
            }
        }
        if !entry.contains_key("type") {
            if let Some(t) = style.get("style").and_then(|s| s.get("type")).and_then(Value::as_str) {
                // Figma paint styles
                let t = if t.eq_ignore_ascii_case("fill") { "color" } else { t };
                entry.insert("type".to_string(), Value::String(t.to_string()));
            }
        }
        out.entries.push(RawEntry::new(name, entry));
    }
    out
}

/// Tool-specific color locations on a style object
fn style_value(style: &Map<String, Value>) -> Option<&Value> {
    let inner = style.get("style");
    inner
        .and_then(|s| s.get("color"))
        .or_else(|| {
            inner
                .and_then(|s| s.get("fills"))
                .and_then(|f| f.get(0))
                .and_then(|f| f.get("color"))
        })
        .filter(|v| !v.is_null())
}

// =============================================================================
// Generic Tree Walk
// =============================================================================

/// How the walker classified an object node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Leaf,
    Group,
}

fn classify_node(obj: &Map<String, Value>, path: &str, out: &mut Flattened) -> NodeKind {
    match obj.get(NODE_KIND_KEY).and_then(Value::as_str) {
        Some("token") | Some("leaf") => return NodeKind::Leaf,
        Some("group") | Some("namespace") => return NodeKind::Group,
        Some(other) => out.warnings.push(ExtractWarning::new(
            path,
            format!("unknown {} flag '{}'; using leaf heuristic", NODE_KIND_KEY, other),
        )),
        None => {}
    }

    if !is_leaf_like(obj) {
        return NodeKind::Group;
    }

    // No value, and either every marker holds an object (children literally
    // named "type"/"meta"/...) or other children look like tokens (a group
    // carrying its own description)
    if !obj.contains_key("value") {
        let only_object_markers = LEAF_MARKERS
            .iter()
            .filter_map(|m| obj.get(*m))
            .all(Value::is_object);
        let token_children = obj.iter().any(|(k, v)| {
            !LEAF_MARKERS.contains(&k.as_str()) && v.as_object().map(is_leaf_like).unwrap_or(false)
        });
        if only_object_markers || token_children {
            out.warnings.push(ExtractWarning::new(
                path,
                format!(
                    "ambiguous node: has marker keys but no value; treated as a group. \
                     Set \"{}\": \"group\" or \"token\" to disambiguate",
                    NODE_KIND_KEY
                ),
            ));
            return NodeKind::Group;
        }
    }

    // A marker key holding a token-shaped object next to a real value
    let shadowed: Vec<&str> = LEAF_MARKERS
        .iter()
        .copied()
        .filter(|m| obj.get(*m).and_then(Value::as_object).map(is_leaf_like).unwrap_or(false))
        .collect();
    if !shadowed.is_empty() {
        out.warnings.push(ExtractWarning::new(
            path,
            format!(
                "ambiguous node: child(ren) {:?} look like tokens; treated as a leaf. \
                 Set \"{}\": \"group\" or \"token\" to disambiguate",
                shadowed, NODE_KIND_KEY
            ),
        ));
    }
    NodeKind::Leaf
}

fn is_leaf_like(obj: &Map<String, Value>) -> bool {
    LEAF_MARKERS.iter().any(|m| obj.contains_key(*m))
}

fn strip_node_flag(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut entry = obj.clone();
    entry.shift_remove(NODE_KIND_KEY);
    entry
}

fn walk_tree(node: &Map<String, Value>, prefix: &mut Vec<String>, out: &mut Flattened) {
    for (key, child) in node {
        if key.starts_with('$') {
            continue;
        }
        prefix.push(key.clone());
        walk_child(child, prefix, out);
        prefix.pop();
    }
}

fn walk_child(child: &Value, prefix: &mut Vec<String>, out: &mut Flattened) {
    let name = prefix.join("/");
    match child {
        Value::Null => {}
        Value::Object(obj) => match classify_node(obj, &name, out) {
            NodeKind::Leaf => out.entries.push(RawEntry::new(name, strip_node_flag(obj))),
            NodeKind::Group => walk_tree(obj, prefix, out),
        },
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                prefix.push(idx.to_string());
                match item {
                    Value::Null => {}
                    Value::Object(_) => walk_child(item, prefix, out),
                    other => out.entries.push(RawEntry::wrapped(prefix.join("/"), other)),
                }
                prefix.pop();
            }
        }
        primitive => out.entries.push(RawEntry::wrapped(name, primitive)),
    }
}

/// `schemaVersion` must be 1.x; two-part versions like "1.0" are accepted
pub fn schema_version_supported(raw: &str) -> bool {
    let trimmed = raw.trim().trim_start_matches('v');
    let padded = match trimmed.split('.').count() {
        1 => format!("{}.0.0", trimmed),
        2 => format!("{}.0", trimmed),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map(|v| v.major == 1).unwrap_or(false)
}

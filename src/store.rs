//! Persisted Token Store
//!
//! The store is a nested JSON object. A node is a leaf iff it is an object
//! with a `value` field; every other object is a namespace. A dot path is the
//! nesting path joined by dots. Leaves are never descended into, so a path
//! can never be both a leaf and a namespace.

use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TokenError};

/// What currently lives at a dot path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Namespace,
    /// Occupied by a value that is neither a token nor a namespace
    Stray,
    Absent,
    /// An ancestor is a leaf or a non-object, so nothing can live here
    Blocked,
}

/// A leaf with its reconstructed dot path
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<'a> {
    pub path: String,
    pub record: &'a Map<String, Value>,
}

/// In-memory view of the persisted store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStore {
    root: Map<String, Value>,
}

/// Whether a store node is a leaf record
pub fn is_leaf_node(node: &Value) -> bool {
    node.as_object().map(|o| o.contains_key("value")).unwrap_or(false)
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a parsed document; the top level must be an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(root) => Some(Self { root }),
            _ => None,
        }
    }

    /// Load a store file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| TokenError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(value).ok_or_else(|| TokenError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "token store must be a JSON object",
            ),
        })
    }

    /// Load a store file, treating a missing file as an empty store
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "store not found, starting empty");
            return Ok(Self::new());
        }
        Self::load(path)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Pretty-printed JSON with a trailing newline
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.root)?;
        out.push('\n');
        Ok(out)
    }

    pub fn get(&self, dot_path: &str) -> Option<&Value> {
        let mut segments = dot_path.split('.');
        let mut node = self.root.get(segments.next()?)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// The leaf record at `dot_path`, if that path is a leaf
    pub fn leaf(&self, dot_path: &str) -> Option<&Map<String, Value>> {
        self.get(dot_path)
            .filter(|node| is_leaf_node(node))
            .and_then(Value::as_object)
    }

    pub fn leaf_mut(&mut self, dot_path: &str) -> Option<&mut Map<String, Value>> {
        let mut segments = dot_path.split('.');
        let mut node = self.root.get_mut(segments.next()?)?;
        for segment in segments {
            node = node.as_object_mut()?.get_mut(segment)?;
        }
        if !is_leaf_node(node) {
            return None;
        }
        node.as_object_mut()
    }

    pub fn is_leaf(&self, dot_path: &str) -> bool {
        self.leaf(dot_path).is_some()
    }

    /// Whether a token or a namespace lives at `dot_path`. Fields inside a
    /// token record never count.
    pub fn contains_node(&self, dot_path: &str) -> bool {
        matches!(self.node_kind(dot_path), NodeKind::Leaf | NodeKind::Namespace)
    }

    pub fn node_kind(&self, dot_path: &str) -> NodeKind {
        let segments: Vec<&str> = dot_path.split('.').collect();
        let mut current = &self.root;
        for (i, segment) in segments.iter().enumerate() {
            let Some(node) = current.get(*segment) else {
                return NodeKind::Absent;
            };
            let last = i + 1 == segments.len();
            if last {
                return if is_leaf_node(node) {
                    NodeKind::Leaf
                } else if node.is_object() {
                    NodeKind::Namespace
                } else {
                    NodeKind::Stray
                };
            }
            match node {
                Value::Object(obj) if !is_leaf_node(node) => current = obj,
                _ => return NodeKind::Blocked,
            }
        }
        NodeKind::Absent
    }

    /// Write the leaf `record` at `dot_path`, creating namespaces as needed.
    ///
    /// Returns false (and writes nothing) when an ancestor is a leaf.
    pub fn set(&mut self, dot_path: &str, record: Map<String, Value>) -> bool {
        self.set_node(dot_path, Value::Object(record))
    }

    /// Write any node (leaf or whole namespace subtree) at `dot_path`
    pub fn set_node(&mut self, dot_path: &str, node: Value) -> bool {
        if self.node_kind(dot_path) == NodeKind::Blocked {
            return false;
        }
        let segments: Vec<&str> = dot_path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return false,
        };
        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry.as_object_mut() {
                Some(obj) => obj,
                None => return false,
            };
        }
        current.insert(last.to_string(), node);
        true
    }

    /// Remove the node at `dot_path`, pruning namespaces left empty
    pub fn remove(&mut self, dot_path: &str) -> Option<Value> {
        let segments: Vec<&str> = dot_path.split('.').collect();
        let removed = remove_in(&mut self.root, &segments)?;
        Some(removed)
    }

    /// All leaves in document order
    pub fn leaves(&self) -> Vec<Leaf<'_>> {
        let mut out = Vec::new();
        collect_leaves(&self.root, "", &mut out);
        out
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }
}

fn remove_in(map: &mut Map<String, Value>, segments: &[&str]) -> Option<Value> {
    match segments {
        [] => None,
        [last] => map.shift_remove(*last),
        [head, rest @ ..] => {
            let child = map.get_mut(*head)?.as_object_mut()?;
            let removed = remove_in(child, rest)?;
            if child.is_empty() {
                map.shift_remove(*head);
            }
            Some(removed)
        }
    }
}

fn collect_leaves<'a>(map: &'a Map<String, Value>, prefix: &str, out: &mut Vec<Leaf<'a>>) {
    for (key, node) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let Some(obj) = node.as_object() else {
            continue;
        };
        if obj.contains_key("value") {
            out.push(Leaf { path, record: obj });
        } else {
            collect_leaves(obj, &path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(v: Value) -> TokenStore {
        TokenStore::from_value(v).unwrap()
    }

    fn record(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_node_kinds() {
        let s = store(json!({"color": {"brand": {"value": "#fff", "meta": {"x": {"value": 1}}}}}));
        assert_eq!(s.node_kind("color"), NodeKind::Namespace);
        assert_eq!(s.node_kind("color.brand"), NodeKind::Leaf);
        assert_eq!(s.node_kind("color.other"), NodeKind::Absent);
        assert_eq!(s.node_kind("color.brand.meta"), NodeKind::Blocked);
        assert_eq!(s.node_kind("spacing.small"), NodeKind::Absent);
    }

    #[test]
    fn test_record_fields_are_not_nodes() {
        let s = store(json!({"color": {"brand": {"value": "#fff"}, "note": "draft"}}));
        assert_eq!(s.node_kind("color.note"), NodeKind::Stray);
        assert_eq!(s.node_kind("color.brand.value"), NodeKind::Blocked);
        assert!(s.get("color.brand.value").is_some());
        assert!(!s.contains_node("color.brand.value"));
        assert!(!s.contains_node("color.note"));
        assert!(s.contains_node("color.brand"));
        assert!(s.contains_node("color"));
    }

    #[test]
    fn test_set_creates_namespaces() {
        let mut s = TokenStore::new();
        assert!(s.set("a.b.c", record(json!({"value": 1}))));
        assert_eq!(s.to_value(), json!({"a": {"b": {"c": {"value": 1}}}}));
    }

    #[test]
    fn test_set_refuses_leaf_ancestor() {
        let mut s = store(json!({"a": {"value": 1}}));
        assert!(!s.set("a.b", record(json!({"value": 2}))));
        assert_eq!(s.to_value(), json!({"a": {"value": 1}}));
    }

    #[test]
    fn test_remove_prunes_empty_namespaces() {
        let mut s = store(json!({"a": {"b": {"value": 1}}, "c": {"value": 2}}));
        assert_eq!(s.remove("a.b"), Some(json!({"value": 1})));
        assert_eq!(s.to_value(), json!({"c": {"value": 2}}));
        assert_eq!(s.remove("missing.key"), None);
    }

    #[test]
    fn test_leaves_in_document_order() {
        let s = store(json!({
            "z": {"value": 1},
            "a": {"b": {"value": 2}, "c": {"value": 3}}
        }));
        let paths: Vec<String> = s.leaves().into_iter().map(|l| l.path).collect();
        assert_eq!(paths, vec!["z", "a.b", "a.c"]);
    }

    #[test]
    fn test_pretty_json_has_trailing_newline() {
        let s = store(json!({"a": {"value": 1}}));
        assert!(s.to_pretty_json().unwrap().ends_with("}\n"));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert!(TokenStore::from_value(json!([1, 2])).is_none());
    }
}

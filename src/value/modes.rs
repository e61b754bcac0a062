//! Multi-mode values (light/dark and friends)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Mode picked as the scalar value when present
const PREFERRED_MODE: &str = "light";

/// How a mode map becomes a canonical value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeStrategy {
    /// Scalar default mode as the value, full map under `meta.modes`
    #[default]
    Meta,
    /// Entire map as the value
    Expand,
}

impl FromStr for ModeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta" => Ok(ModeStrategy::Meta),
            "expand" => Ok(ModeStrategy::Expand),
            other => Err(format!("unknown modes strategy '{}' (expected meta or expand)", other)),
        }
    }
}

impl fmt::Display for ModeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeStrategy::Meta => write!(f, "meta"),
            ModeStrategy::Expand => write!(f, "expand"),
        }
    }
}

/// Canonical value derived from a mode map
#[derive(Debug, Clone, PartialEq)]
pub struct ModeResolution {
    pub value: Value,
    /// Set under the `meta` strategy
    pub modes: Option<Map<String, Value>>,
    /// Mode used for the scalar value (meta strategy only)
    pub default_mode: Option<String>,
}

/// Find a mode map on a raw entry.
///
/// Looks at `entry.modes`, `entry.value.modes`, and finally at `entry.value`
/// itself when every key is a known mode name.
pub fn detect_mode_map<'a>(
    entry: &'a Map<String, Value>,
    mode_names: &[String],
) -> Option<&'a Map<String, Value>> {
    if let Some(modes) = entry.get("modes").and_then(Value::as_object) {
        if !modes.is_empty() {
            return Some(modes);
        }
    }
    let value = entry.get("value").and_then(Value::as_object)?;
    if let Some(modes) = value.get("modes").and_then(Value::as_object) {
        if !modes.is_empty() {
            return Some(modes);
        }
    }
    let all_modes = !value.is_empty() && value.keys().all(|k| mode_names.iter().any(|m| m == k));
    all_modes.then_some(value)
}

/// Resolve a mode map under `strategy`, normalizing every member with `normalize`
pub fn resolve_modes(
    modes: &Map<String, Value>,
    strategy: ModeStrategy,
    normalize: impl Fn(&Value) -> Value,
) -> Option<ModeResolution> {
    let normalized: Map<String, Value> = modes
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), normalize(v)))
        .collect();
    if normalized.is_empty() {
        return None;
    }

    match strategy {
        ModeStrategy::Meta => {
            let default_mode = if normalized.contains_key(PREFERRED_MODE) {
                PREFERRED_MODE.to_string()
            } else {
                normalized.keys().next()?.clone()
            };
            Some(ModeResolution {
                value: normalized[&default_mode].clone(),
                modes: Some(normalized),
                default_mode: Some(default_mode),
            })
        }
        ModeStrategy::Expand => Some(ModeResolution {
            value: Value::Object(normalized),
            modes: None,
            default_mode: None,
        }),
    }
}

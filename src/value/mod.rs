//! Value Normalization
//!
//! Pure functions turning raw token values into canonical forms:
//! - colors (hex, `rgb()`, component objects) via [`color`]
//! - multi-mode maps via [`modes`]
//! - numbers inferred from a name suffix via [`units`]
//!
//! A value that cannot be derived by any strategy is reported back to the
//! caller as a reason string; the caller drops the token and records a
//! warning. Nothing here aborts a batch.

pub mod color;
pub mod modes;
pub mod units;

use serde_json::{Map, Value};

pub use color::{normalize_color, Rgba};
pub use modes::{ModeResolution, ModeStrategy};

/// Fallback fields consulted when `value` is absent, in order
const FALLBACK_VALUE_FIELDS: &[&str] = &["val", "default"];

/// Canonical value for one raw entry
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedValue {
    pub value: Value,
    /// Full mode map, kept under `meta.modes` (meta strategy)
    pub modes: Option<Map<String, Value>>,
    /// The value came from the name suffix rather than the entry
    pub inferred_from_name: bool,
}

impl NormalizedValue {
    fn plain(value: Value) -> Self {
        Self {
            value,
            modes: None,
            inferred_from_name: false,
        }
    }
}

/// Normalizes raw entry values according to the run configuration
#[derive(Debug, Clone)]
pub struct ValueNormalizer {
    strategy: ModeStrategy,
    mode_names: Vec<String>,
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self::new(ModeStrategy::Meta, vec!["light".to_string(), "dark".to_string()])
    }
}

impl ValueNormalizer {
    pub fn new(strategy: ModeStrategy, mode_names: Vec<String>) -> Self {
        Self {
            strategy,
            mode_names,
        }
    }

    pub fn strategy(&self) -> ModeStrategy {
        self.strategy
    }

    /// Derive the canonical value of `entry`, named `name` in the export.
    ///
    /// Order: mode map, `value`, fallback fields, `raw.value`, name suffix.
    pub fn normalize_entry(
        &self,
        name: &str,
        entry: &Map<String, Value>,
        token_type: Option<&str>,
    ) -> Result<NormalizedValue, String> {
        if let Some(mode_map) = modes::detect_mode_map(entry, &self.mode_names) {
            let resolved = modes::resolve_modes(mode_map, self.strategy, |v| {
                normalize_scalar(v, token_type)
            })
            .ok_or_else(|| "mode map has no usable members".to_string())?;
            return Ok(NormalizedValue {
                value: resolved.value,
                modes: resolved.modes,
                inferred_from_name: false,
            });
        }

        if let Some(value) = non_null(entry.get("value")) {
            return Ok(NormalizedValue::plain(normalize_scalar(value, token_type)));
        }

        for field in FALLBACK_VALUE_FIELDS {
            if let Some(value) = non_null(entry.get(*field)) {
                return Ok(NormalizedValue::plain(normalize_scalar(value, token_type)));
            }
        }

        if let Some(value) = non_null(entry.get("raw").and_then(|raw| raw.get("value"))) {
            return Ok(NormalizedValue::plain(normalize_scalar(value, token_type)));
        }

        if let Some(value) = units::infer_from_name(name) {
            return Ok(NormalizedValue {
                value,
                modes: None,
                inferred_from_name: true,
            });
        }

        Err("no value extracted".to_string())
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Canonicalize a single value. Colors are normalized unless the token is
/// typed as something other than a color.
pub fn normalize_scalar(value: &Value, token_type: Option<&str>) -> Value {
    let color_eligible = token_type
        .map(|t| t.to_ascii_lowercase().contains("color"))
        .unwrap_or(true);
    if color_eligible {
        if let Some(color) = normalize_color(value) {
            return Value::String(color);
        }
    }
    value.clone()
}

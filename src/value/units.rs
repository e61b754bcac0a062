//! Unit inference from token names
//!
//! Used only when an entry carries no value at all: `spacing/scale/4` yields
//! `4`, `radius-8px` yields `"8px"`.

use regex::Regex;
use serde_json::{Number, Value};
use std::sync::OnceLock;

fn suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[/\s._-])(-?\d+(?:\.\d+)?)([A-Za-z%]+)?$").unwrap()
    })
}

/// Parse a trailing `<number><unit>?` segment off a raw name
pub fn infer_from_name(name: &str) -> Option<Value> {
    let caps = suffix_re().captures(name.trim())?;
    let number = &caps[1];
    match caps.get(2) {
        Some(unit) => Some(Value::String(format!("{}{}", number, unit.as_str().to_lowercase()))),
        None if number.contains('.') => number
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        None => number.parse::<i64>().ok().map(|n| Value::Number(n.into())),
    }
}

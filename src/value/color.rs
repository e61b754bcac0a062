//! Color normalization
//!
//! Accepts hex strings (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`), CSS
//! `rgb()`/`rgba()` strings, and `{r,g,b,a}` / `{red,green,blue,alpha}`
//! objects. Opaque colors serialize as `#RRGGBB`; translucent ones as
//! `rgba(r, g, b, a)` with alpha rounded to three decimals.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Alpha at or above this serializes as opaque hex
const OPAQUE_ALPHA: f64 = 0.999;

fn rgb_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^rgba?\(\s*([^)]*)\)$").unwrap())
}

/// A color with channels in 0-255 and alpha in 0-1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    /// Build from raw components. When every color channel is at most 1 the
    /// channels are read as 0-1 fractions.
    pub fn from_components(r: f64, g: f64, b: f64, a: Option<f64>) -> Self {
        let fractional = r <= 1.0 && g <= 1.0 && b <= 1.0;
        let scale = |c: f64| if fractional { c * 255.0 } else { c };
        let a = match a {
            Some(a) if a > 1.0 => a / 255.0,
            Some(a) => a,
            None => 1.0,
        };
        Self {
            r: scale(r).clamp(0.0, 255.0),
            g: scale(g).clamp(0.0, 255.0),
            b: scale(b).clamp(0.0, 255.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Canonical string form
    pub fn to_canonical(&self) -> String {
        let (r, g, b) = (channel(self.r), channel(self.g), channel(self.b));
        if self.a >= OPAQUE_ALPHA {
            format!("#{:02X}{:02X}{:02X}", r, g, b)
        } else {
            format!("rgba({}, {}, {}, {})", r, g, b, format_alpha(self.a))
        }
    }
}

fn channel(c: f64) -> u8 {
    c.round().clamp(0.0, 255.0) as u8
}

fn format_alpha(a: f64) -> String {
    let fixed = format!("{:.3}", a);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a raw value to a canonical color string, if it is a color
pub fn normalize_color(value: &Value) -> Option<String> {
    parse_color(value).map(|c| c.to_canonical())
}

/// Parse any supported color representation
pub fn parse_color(value: &Value) -> Option<Rgba> {
    match value {
        Value::String(s) => parse_color_str(s.trim()),
        Value::Object(obj) => {
            let component = |short: &str, long: &str| {
                obj.get(short)
                    .or_else(|| obj.get(long))
                    .and_then(Value::as_f64)
            };
            let r = component("r", "red")?;
            let g = component("g", "green")?;
            let b = component("b", "blue")?;
            let a = component("a", "alpha");
            Some(Rgba::from_components(r, g, b, a))
        }
        _ => None,
    }
}

fn parse_color_str(s: &str) -> Option<Rgba> {
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let caps = rgb_fn_re().captures(s)?;
    let parts: Vec<&str> = caps[1]
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let mut nums = Vec::with_capacity(4);
    let mut any_percent = false;
    for part in &parts[..3] {
        let (n, percent) = parse_component(part)?;
        any_percent |= percent;
        nums.push(n);
    }
    if any_percent {
        // percentages are fractions; bring the plain channels into the same scale
        for n in nums.iter_mut() {
            if *n > 1.0 {
                *n /= 255.0;
            }
        }
    }
    let alpha = match parts.get(3) {
        Some(part) => Some(parse_component(part)?.0),
        None => None,
    };
    Some(Rgba::from_components(nums[0], nums[1], nums[2], alpha))
}

fn parse_component(part: &str) -> Option<(f64, bool)> {
    match part.strip_suffix('%') {
        Some(p) => p.trim().parse::<f64>().ok().map(|n| (n / 100.0, true)),
        None => part.trim().parse::<f64>().ok().map(|n| (n, false)),
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok().map(f64::from);
    let (r, g, b) = (byte(0)?, byte(2)?, byte(4)?);
    let a = if expanded.len() == 8 { byte(6)? / 255.0 } else { 1.0 };
    // hex channels are always 0-255, never fractions
    Some(Rgba {
        r,
        g,
        b,
        a,
    })
}

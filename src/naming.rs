//! Dot-path naming rules
//!
//! Canonical token keys are lowercase alphanumeric segments joined by single
//! dots. Names coming out of design tools use `/`, spaces, `_` and `-` as
//! separators and carry arbitrary punctuation; [`normalize_dot_path`] folds
//! them into the canonical grammar.

use regex::Regex;
use std::sync::OnceLock;

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[/\s_-]+").unwrap())
}

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9.]").unwrap())
}

fn repeated_dots_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{2,}").unwrap())
}

fn canonical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(\.[a-z0-9]+)*$").unwrap())
}

/// Normalize a raw tool name into a canonical dot path.
///
/// ```
/// use design_tokens::naming::normalize_dot_path;
///
/// assert_eq!(normalize_dot_path("Color/Brand Primary"), "color.brand.primary");
/// assert_eq!(normalize_dot_path("spacing_scale-4"), "spacing.scale.4");
/// assert_eq!(normalize_dot_path("color.brand.primary"), "color.brand.primary");
/// ```
pub fn normalize_dot_path(name: &str) -> String {
    let s = separator_re().replace_all(name.trim(), ".");
    let s = disallowed_re().replace_all(&s, "");
    let s = repeated_dots_re().replace_all(&s, ".");
    s.trim_matches('.').to_lowercase()
}

/// Whether a key already satisfies the canonical grammar
pub fn is_canonical(path: &str) -> bool {
    canonical_re().is_match(path)
}

/// Whether a key can address a store node (no empty segments)
pub fn is_addressable(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_collapse_to_single_dot() {
        assert_eq!(normalize_dot_path("color/brand/primary"), "color.brand.primary");
        assert_eq!(normalize_dot_path("type / body -- 16_regular"), "type.body.16.regular");
        assert_eq!(normalize_dot_path("/leading/slash/"), "leading.slash");
    }

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(normalize_dot_path("Shadow (Elevation) #2"), "shadow.elevation.2");
        assert_eq!(normalize_dot_path("brand..primary"), "brand.primary");
        assert_eq!(normalize_dot_path("größe/klein"), "gre.klein");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["Color/Brand Primary", "a.b.c", "Spacing_Scale-4", "  x  "] {
            let once = normalize_dot_path(raw);
            assert_eq!(normalize_dot_path(&once), once);
            assert!(once.is_empty() || is_canonical(&once));
        }
    }

    #[test]
    fn test_empty_names() {
        assert_eq!(normalize_dot_path(""), "");
        assert_eq!(normalize_dot_path("///"), "");
    }

    #[test]
    fn test_grammar() {
        assert!(is_canonical("color.brand.primary"));
        assert!(!is_canonical("Color.brand"));
        assert!(!is_canonical("color..brand"));
        assert!(!is_canonical("color-brand"));
        assert!(is_addressable("Color.Brand"));
        assert!(!is_addressable("a..b"));
    }
}

//! Placeholder extraction for `{{ key }}` interpolation markers

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Matches `{{ key }}` where key is word characters and/or hyphens.
pub(crate) static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w-]+)\s*\}\}").expect("placeholder pattern is valid"));

/// Distinct placeholder keys appearing in `content`
pub fn extract(content: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Whether any interpolation marker is still present
pub fn has_unresolved(content: &str) -> bool {
    PLACEHOLDER.is_match(content)
}

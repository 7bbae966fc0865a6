//! Locale fallback resolution
//!
//! Copy for a requested locale is assembled in three tiers:
//!
//! 1. entries for the exact locale (`en-GB`)
//! 2. entries for its base language (`en`), when the locale has a region
//! 3. entries for the global default `en`, unless the locale is `en` itself
//!
//! A key filled by an earlier tier is never replaced by a later one. The
//! locale is renderable only when every template placeholder ends up covered.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::CopyEntry;

/// Last-resort locale for missing keys
pub const GLOBAL_DEFAULT_LOCALE: &str = "en";

/// Base language subtag of a regional locale (`en-GB` -> `en`)
pub fn base_language(locale: &str) -> Option<&str> {
    let (base, region) = locale.split_once(['-', '_'])?;
    if base.is_empty() || region.is_empty() {
        return None;
    }
    Some(base)
}

/// Copy values chosen for one locale, with the locale each key came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCopy {
    pub locale: String,
    pub values: BTreeMap<String, String>,
    pub sources: BTreeMap<String, String>,
}

impl ResolvedCopy {
    fn overlay(&mut self, tier_locale: &str, entries: &[CopyEntry]) {
        // Within a tier the last entry for a key wins; across tiers the first.
        let mut tier: BTreeMap<&str, &str> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.locale == tier_locale) {
            tier.insert(&entry.key, &entry.value);
        }

        for (key, value) in tier {
            if !self.values.contains_key(key) {
                self.values.insert(key.to_string(), value.to_string());
                self.sources.insert(key.to_string(), tier_locale.to_string());
            }
        }
    }

    pub fn covers(&self, placeholders: &BTreeSet<String>) -> bool {
        placeholders.iter().all(|k| self.values.contains_key(k))
    }

    pub fn missing(&self, placeholders: &BTreeSet<String>) -> BTreeSet<String> {
        placeholders
            .iter()
            .filter(|k| !self.values.contains_key(*k))
            .cloned()
            .collect()
    }
}

/// Outcome of resolving one locale against a template's placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedCopy),
    /// Not an error: the locale simply cannot be rendered yet
    Unresolvable {
        locale: String,
        missing: BTreeSet<String>,
    },
}

impl Resolution {
    pub fn resolved(self) -> Option<ResolvedCopy> {
        match self {
            Resolution::Resolved(copy) => Some(copy),
            Resolution::Unresolvable { .. } => None,
        }
    }
}

/// Apply the fallback chain for `locale` without checking coverage
pub fn fallback_copy(locale: &str, entries: &[CopyEntry]) -> ResolvedCopy {
    let mut copy = ResolvedCopy {
        locale: locale.to_string(),
        ..Default::default()
    };

    copy.overlay(locale, entries);

    if let Some(base) = base_language(locale) {
        copy.overlay(base, entries);
    }

    if locale != GLOBAL_DEFAULT_LOCALE {
        copy.overlay(GLOBAL_DEFAULT_LOCALE, entries);
    }

    copy
}

/// Resolve the copy map for `locale`, rejecting it if `placeholders` are not covered
pub fn resolve(placeholders: &BTreeSet<String>, locale: &str, entries: &[CopyEntry]) -> Resolution {
    let copy = fallback_copy(locale, entries);
    if copy.covers(placeholders) {
        Resolution::Resolved(copy)
    } else {
        Resolution::Unresolvable {
            locale: locale.to_string(),
            missing: copy.missing(placeholders),
        }
    }
}

/// Distinct locales present in a copy pool, sorted
pub fn requested_locales(entries: &[CopyEntry]) -> Vec<String> {
    let locales: BTreeSet<&str> = entries.iter().map(|e| e.locale.as_str()).collect();
    locales.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn entry(locale: &str, key: &str, value: &str) -> CopyEntry {
        CopyEntry::new("t1", locale, key, value)
    }

    fn keys(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("en-GB", Some("en"))]
    #[test_case("pt_BR", Some("pt"))]
    #[test_case("zh-Hant-TW", Some("zh"))]
    #[test_case("en", None)]
    #[test_case("-GB", None)]
    #[test_case("en-", None)]
    fn test_base_language(locale: &str, expected: Option<&str>) {
        assert_eq!(base_language(locale), expected);
    }

    #[test]
    fn test_specific_locale_wins() {
        let entries = vec![entry("en", "k", "A"), entry("en-GB", "k", "B")];
        let copy = resolve(&keys(&["k"]), "en-GB", &entries).resolved().unwrap();
        assert_eq!(copy.values["k"], "B");
        assert_eq!(copy.sources["k"], "en-GB");
    }

    #[test]
    fn test_base_language_fills_gap() {
        let entries = vec![entry("en", "k", "A")];
        let copy = resolve(&keys(&["k"]), "en-GB", &entries).resolved().unwrap();
        assert_eq!(copy.values["k"], "A");
    }

    #[test]
    fn test_no_cross_language_fallback() {
        let entries = vec![entry("fr", "k", "C")];
        match resolve(&keys(&["k"]), "en-GB", &entries) {
            Resolution::Unresolvable { missing, .. } => assert_eq!(missing, keys(&["k"])),
            other => panic!("expected unresolvable, got {:?}", other),
        }
    }

    #[test]
    fn test_base_tier_beats_global_default() {
        let entries = vec![
            entry("en", "title", "Hello"),
            entry("de", "title", "Hallo"),
            entry("de-AT", "cta", "Jetzt kaufen"),
            entry("en", "footer", "Unsubscribe"),
        ];
        let copy = resolve(&keys(&["title", "cta", "footer"]), "de-AT", &entries)
            .resolved()
            .unwrap();
        assert_eq!(copy.values["title"], "Hallo");
        assert_eq!(copy.values["cta"], "Jetzt kaufen");
        assert_eq!(copy.values["footer"], "Unsubscribe");
        assert_eq!(copy.sources["footer"], "en");
    }

    #[test]
    fn test_global_default_fills_other_languages() {
        let entries = vec![entry("fr", "title", "Bonjour"), entry("en", "cta", "Buy")];
        let copy = resolve(&keys(&["title", "cta"]), "fr", &entries).resolved().unwrap();
        assert_eq!(copy.values["cta"], "Buy");
    }

    #[test]
    fn test_last_entry_wins_within_tier() {
        let entries = vec![entry("fr", "k", "old"), entry("fr", "k", "new")];
        let copy = fallback_copy("fr", &entries);
        assert_eq!(copy.values["k"], "new");
    }

    #[test]
    fn test_resolved_map_always_covers_placeholders() {
        let pool = vec![
            entry("en", "a", "1"),
            entry("en-US", "b", "2"),
            entry("es", "a", "3"),
            entry("es-MX", "c", "4"),
        ];
        let placeholders = keys(&["a", "b", "c"]);
        for locale in ["en", "en-US", "es", "es-MX", "fr"] {
            match resolve(&placeholders, locale, &pool) {
                Resolution::Resolved(copy) => assert!(copy.covers(&placeholders)),
                Resolution::Unresolvable { missing, .. } => {
                    let reachable = fallback_copy(locale, &pool);
                    assert!(!missing.is_empty());
                    assert!(!reachable.covers(&placeholders));
                }
            }
        }
    }

    #[test]
    fn test_requested_locales_sorted_distinct() {
        let entries = vec![entry("fr", "k", "v"), entry("en", "k", "v"), entry("fr", "j", "v")];
        assert_eq!(requested_locales(&entries), vec!["en", "fr"]);
    }
}

//! Element addressing
//!
//! Scenario steps name elements by their `data-testid`. Inline checks run
//! against the static DOM and accept a looser needle that may be an id, a
//! class or any attribute value.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::assert::normalize_text;

static ANY_ELEMENT: Lazy<Selector> = Lazy::new(|| Selector::parse("*").expect("static selector"));
static WITH_TESTID: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid]").expect("static selector"));

/// Characters kept from an element's text in discovery output
const TEXT_PREVIEW_CHARS: usize = 50;

/// CSS selector for the element whose `data-testid` is exactly `testid`
pub fn testid_selector(testid: &str) -> String {
    let escaped = testid.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[data-testid=\"{}\"]", escaped)
}

/// How an inline needle was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Id,
    Class,
    TestId,
    AttributeContains,
}

/// First element matched by an inline needle
#[derive(Debug, Clone, Copy)]
pub struct InlineMatch<'a> {
    pub element: ElementRef<'a>,
    pub strategy: Strategy,
}

/// Resolve `needle` in document order, trying exact id, class, test id and
/// finally any attribute value containing it
pub fn resolve_inline<'a>(document: &'a Html, needle: &str) -> Option<InlineMatch<'a>> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }

    let strategies: [(Strategy, fn(ElementRef<'_>, &str) -> bool); 4] = [
        (Strategy::Id, |el, n| el.value().id() == Some(n)),
        (Strategy::Class, |el, n| el.value().classes().any(|c| c == n)),
        (Strategy::TestId, |el, n| el.value().attr("data-testid") == Some(n)),
        (Strategy::AttributeContains, |el, n| {
            el.value().attrs().any(|(_, value)| value.contains(n))
        }),
    ];

    strategies.iter().find_map(|(strategy, matches)| {
        document
            .select(&ANY_ELEMENT)
            .find(|el| matches(*el, needle))
            .map(|element| InlineMatch {
                element,
                strategy: *strategy,
            })
    })
}

/// Normalized text of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// An element carrying a `data-testid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdElement {
    pub testid: String,
    pub tag: String,
    pub text: String,
    pub selector: String,
}

/// Every element with a non-empty `data-testid`, in document order
pub fn extract_testids(html: &str) -> Vec<TestIdElement> {
    let document = Html::parse_document(html);
    document
        .select(&WITH_TESTID)
        .filter_map(|el| {
            let testid = el.value().attr("data-testid")?.trim();
            if testid.is_empty() {
                return None;
            }
            Some(TestIdElement {
                testid: testid.to_string(),
                tag: el.value().name().to_string(),
                text: element_text(el).chars().take(TEXT_PREVIEW_CHARS).collect(),
                selector: testid_selector(testid),
            })
        })
        .collect()
}

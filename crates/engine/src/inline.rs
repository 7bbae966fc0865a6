//! Inline checks for generated emails
//!
//! These run against the parsed static document; no browser is involved.
//! The vocabulary is deliberately small: `expectText` steps, link integrity
//! and leftover placeholder detection. Scenario actions such as `click` are
//! reported as unsupported rather than reinterpreted.

use mailproof_common::placeholder;
use mailproof_common::{ActionKind, GeneratedEmail};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::assert::{normalize_text, text_contains};
use crate::error::EngineResult;
use crate::selector::{element_text, resolve_inline};

static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));

pub const UNREPLACED_PLACEHOLDERS: &str = "Unreplaced placeholders";
pub const MISSING_HREF: &str = "missing href";

/// One inline step as supplied by a caller: `{type, selector, text?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineStep {
    #[serde(rename = "type")]
    pub kind: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl InlineStep {
    pub fn expect_text(selector: &str, text: &str) -> Self {
        Self {
            kind: ActionKind::ExpectText.as_str().to_string(),
            selector: selector.to_string(),
            text: Some(text.to_string()),
        }
    }

    /// Parse a JSON array of steps
    pub fn parse_list(json: &str) -> EngineResult<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome of inline checks on one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineReport {
    pub passed: bool,
    pub issues: Vec<String>,
}

/// Inline report for a stored email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCheck {
    pub email_id: Uuid,
    pub template_id: String,
    pub locale: String,
    #[serde(flatten)]
    pub report: InlineReport,
}

/// Run link integrity, the given steps and the placeholder check on `html`
pub fn check_html(html: &str, steps: &[InlineStep]) -> InlineReport {
    let document = Html::parse_document(html);
    let mut issues = Vec::new();

    for link in document.select(&LINKS) {
        match link.value().attr("href") {
            Some(href) if !href.trim().is_empty() => {}
            _ => issues.push(MISSING_HREF.to_string()),
        }
    }

    issues.extend(steps.iter().filter_map(|step| check_step(&document, step)));

    if placeholder::has_unresolved(html) {
        issues.push(UNREPLACED_PLACEHOLDERS.to_string());
    }

    InlineReport {
        passed: issues.is_empty(),
        issues,
    }
}

fn check_step(document: &Html, step: &InlineStep) -> Option<String> {
    match ActionKind::parse(&step.kind) {
        ActionKind::ExpectText => {}
        ActionKind::Unrecognized(name) => return Some(format!("Unknown action: {}", name)),
        other => {
            return Some(format!(
                "Action '{}' is not supported by inline checks",
                other
            ))
        }
    }

    let Some(expected) = step.text.as_deref() else {
        return Some(format!("expectText on '{}' has no text", step.selector));
    };

    let Some(found) = resolve_inline(document, &step.selector) else {
        return Some(format!("Element '{}' not found", step.selector));
    };

    let actual = element_text(found.element);
    debug!(
        "Inline expectText '{}' via {:?}: found '{}'",
        step.selector, found.strategy, actual
    );

    if text_contains(&actual, expected) {
        None
    } else {
        Some(format!(
            "Expected text '{}' not found in element '{}' (found '{}')",
            normalize_text(expected),
            step.selector,
            actual
        ))
    }
}

pub fn check_email(email: &GeneratedEmail, steps: &[InlineStep]) -> EmailCheck {
    EmailCheck {
        email_id: email.id,
        template_id: email.template_id.clone(),
        locale: email.locale.clone(),
        report: check_html(&email.html, steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERO: &str = r#"<html><body>
        <h1 class="Hero-Heading">Shop Our Back-to-School Essentials</h1>
        <a href="https://example.com/shop">Shop</a>
    </body></html>"#;

    #[test]
    fn test_expect_text_containment() {
        let report = check_html(HERO, &[InlineStep::expect_text("Hero-Heading", "Shop")]);
        assert!(report.passed, "{:?}", report.issues);

        let report = check_html(HERO, &[InlineStep::expect_text("Hero-Heading", "Shop Now")]);
        assert!(!report.passed);
        assert!(report.issues[0].contains("Shop Now"));
    }

    #[test]
    fn test_missing_element_is_reported() {
        let report = check_html(HERO, &[InlineStep::expect_text("Footer", "Unsubscribe")]);
        assert!(!report.passed);
        assert_eq!(report.issues, vec!["Element 'Footer' not found".to_string()]);
    }

    #[test]
    fn test_links_without_href_flagged() {
        let report = check_html(r#"<a>one</a><a href="">two</a><a href="/ok">three</a>"#, &[]);
        assert_eq!(report.issues, vec![MISSING_HREF.to_string(), MISSING_HREF.to_string()]);
    }

    #[test]
    fn test_unreplaced_placeholders_flagged() {
        let report = check_html("<p>Hi {{ first_name }}</p>", &[]);
        assert!(!report.passed);
        assert_eq!(report.issues, vec![UNREPLACED_PLACEHOLDERS.to_string()]);
    }

    #[test]
    fn test_scenario_actions_are_not_inline() {
        let step = InlineStep {
            kind: "click".into(),
            selector: "Hero-Heading".into(),
            text: None,
        };
        let report = check_html(HERO, &[step]);
        assert!(report.issues[0].contains("not supported"));

        let step = InlineStep {
            kind: "hover".into(),
            selector: "x".into(),
            text: None,
        };
        assert_eq!(check_html(HERO, &[step]).issues, vec!["Unknown action: hover".to_string()]);
    }

    #[test]
    fn test_wire_shape() {
        let steps = InlineStep::parse_list(
            r#"[{"type":"expectText","selector":"Hero-Heading","text":"Essentials"}]"#,
        )
        .unwrap();
        assert_eq!(steps, vec![InlineStep::expect_text("Hero-Heading", "Essentials")]);
        assert!(check_html(HERO, &steps).passed);
    }

    #[test]
    fn test_check_email_carries_identity() {
        let email = GeneratedEmail::new("t1", "fr", "<p>Bonjour</p>".into(), None);
        let check = check_email(&email, &[]);
        assert_eq!(check.email_id, email.id);
        assert_eq!(check.locale, "fr");
        assert!(check.report.passed);
    }
}

//! Assertion semantics shared by scripted runs and inline checks
//!
//! Text comparisons normalize both sides (trim, collapse whitespace runs)
//! and then test containment. URL checks are raw substring tests. Titles
//! and attributes must match exactly.

use std::fmt;

/// Trim and collapse every whitespace run to a single space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A check that ran and did not hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure(pub String);

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type AssertResult = Result<(), AssertionFailure>;

pub fn text_contains(actual: &str, expected: &str) -> bool {
    normalize_text(actual).contains(&normalize_text(expected))
}

pub fn expect_text(actual: &str, expected: &str) -> AssertResult {
    if text_contains(actual, expected) {
        Ok(())
    } else {
        Err(AssertionFailure(format!(
            "Expected text '{}' not found in '{}'",
            normalize_text(expected),
            normalize_text(actual)
        )))
    }
}

pub fn expect_attr(name: &str, actual: Option<&str>, expected: &str) -> AssertResult {
    match actual {
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(AssertionFailure(format!(
            "Expected attribute {}='{}', got '{}'",
            name, expected, value
        ))),
        None => Err(AssertionFailure(format!(
            "Expected attribute {}='{}', but the attribute is absent",
            name, expected
        ))),
    }
}

pub fn expect_url_contains(url: &str, expected: &str) -> AssertResult {
    if url.contains(expected) {
        Ok(())
    } else {
        Err(AssertionFailure(format!(
            "Expected URL to contain '{}', got '{}'",
            expected, url
        )))
    }
}

pub fn expect_title(title: &str, expected: &str) -> AssertResult {
    if title == expected {
        Ok(())
    } else {
        Err(AssertionFailure(format!(
            "Expected page title '{}', got '{}'",
            expected, title
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("  Hello \n\t world  ", "Hello world" ; "collapses runs")]
    #[test_case("", "" ; "empty")]
    #[test_case("Prix\u{a0}: 10 €", "Prix : 10 €" ; "no-break space")]
    #[test_case("  Shop   Now\n", "Shop Now" ; "button label")]
    fn test_normalize_text(input: &str, expected: &str) {
        assert_eq!(normalize_text(input), expected);
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        for input in ["  Hello \n\t world  ", "", "Prix\u{a0}: 10 €", "  Shop   Now\n", "\r\n\t"] {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_expect_text_is_containment_after_normalizing() {
        assert!(expect_text("Welcome   back,\n Sam!", "back, Sam").is_ok());
        let err = expect_text("Welcome back", "Goodbye").unwrap_err();
        assert!(err.0.contains("Goodbye"));
    }

    #[test]
    fn test_expect_attr() {
        assert!(expect_attr("href", Some("/offer"), "/offer").is_ok());
        assert!(expect_attr("href", Some("/other"), "/offer").is_err());
        assert!(expect_attr("href", None, "/offer").unwrap_err().0.contains("absent"));
    }

    #[test]
    fn test_expect_url_and_title() {
        assert!(expect_url_contains("file:///tmp/run/document.html#done", "#done").is_ok());
        assert!(expect_url_contains("file:///tmp/run/document.html", "#done").is_err());
        assert!(expect_title("Spring Sale", "Spring Sale").is_ok());
        assert!(expect_title(" Spring  Sale ", "Spring Sale").is_err());
        assert!(expect_title("Spring Sale 2024", "Spring Sale").is_err());
    }
}

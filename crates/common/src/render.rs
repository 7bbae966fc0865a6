//! Template rendering

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use regex::Captures;

use crate::placeholder::PLACEHOLDER;

/// HTML produced for one (template, locale) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// Keys left in the output as literal `{{ key }}` markers
    pub unresolved: BTreeSet<String>,
}

impl Rendered {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Substitute `values` into `content`.
///
/// Markers whose key has no value are kept byte-for-byte. Values are inserted
/// verbatim, without HTML escaping, since copy is allowed to carry markup.
pub fn render(content: &str, values: &BTreeMap<String, String>) -> Rendered {
    let mut unresolved = BTreeSet::new();

    let html = PLACEHOLDER.replace_all(content, |caps: &Captures<'_>| {
        let key = &caps[1];
        match values.get(key) {
            Some(value) => Cow::Owned(value.clone()),
            None => {
                unresolved.insert(key.to_string());
                Cow::Owned(caps[0].to_string())
            }
        }
    });

    Rendered {
        html: html.into_owned(),
        unresolved,
    }
}

/// Wrap template markup in the standard preview document
pub fn preview_document(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ margin: 0; padding: 20px; font-family: Arial, sans-serif; }}
        img {{ max-width: 100%; height: auto; }}
    </style>
</head>
<body>
{}
</body>
</html>
"#,
        content
    )
}

//! Message templating.
//!
//! A template is free text with `{{header}}` placeholders. Rendering replaces
//! each placeholder naming a column of the row with that cell's text in a
//! single left-to-right pass: substituted text is never scanned again, so a
//! cell containing `{{other}}` is inserted verbatim. Placeholders that name no
//! column stay in the output as written.

use common::model::dataset::Row;
use regex::Regex;
use std::sync::LazyLock;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Renders `template` against `row`.
pub fn render(template: &str, row: &Row) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let inner = &rest[start + OPEN.len()..];

        let resolved = inner
            .find(CLOSE)
            .and_then(|end| row.get(&inner[..end]).map(|value| (end, value)));

        match resolved {
            Some((end, value)) => {
                out.push_str(&value.as_text());
                rest = &inner[end + CLOSE.len()..];
            }
            None => {
                // Not a known placeholder: keep one brace and rescan from the
                // next character, so `{{{name}}}` still resolves `{{name}}`.
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Placeholders of `template` that match none of `headers`.
pub fn unknown_placeholders(template: &str, headers: &[String]) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|name| !headers.iter().any(|h| h == name))
        .collect()
}

pub fn placeholder_for(header: &str) -> String {
    format!("{OPEN}{header}{CLOSE}")
}

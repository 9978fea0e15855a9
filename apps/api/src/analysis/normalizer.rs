//! Text normalizer — turns raw model text into the substring that should hold a JSON object.
//!
//! Models wrap JSON in markdown fences, prepend apologies, and swap in
//! typographic quotes. None of that is JSON, so it goes before repair runs.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Opening or closing fence, with or without a language tag (```json, ```JSON, ```).
static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```[A-Za-z0-9_+\-]*").expect("fence pattern is a valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("no JSON object found in model output")]
    NoJsonFound,
}

/// Strips fences and smart punctuation, then isolates the JSON object.
///
/// Text that already begins with `{` is kept whole so a truncated tail still
/// reaches the repairer. Otherwise the text is sliced from the first `{` to
/// the last `}`.
pub fn normalize(raw: &str) -> Result<String, NormalizationError> {
    let unfenced = FENCE.replace_all(raw, "");
    let straightened = straighten_quotes(&unfenced);
    let text = straightened.trim();

    if text.starts_with('{') {
        return Ok(text.to_string());
    }

    let start = text.find('{').ok_or(NormalizationError::NoJsonFound)?;
    let end = text.rfind('}').ok_or(NormalizationError::NoJsonFound)?;
    if end < start {
        return Err(NormalizationError::NoJsonFound);
    }

    debug!(
        "Sliced JSON object out of model text (dropped {} leading, {} trailing bytes)",
        start,
        text.len() - end - 1
    );
    Ok(text[start..=end].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Outside,
    /// Inside a string opened by a plain `"`.
    Plain,
    /// Inside a string opened by a typographic double quote.
    Typographic,
}

/// Maps typographic quotes to ASCII. A typographic double quote inside a
/// plain-quoted string is text, so it comes out escaped.
fn straighten_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Quoting::Outside;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if state != Quoting::Outside => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                state = match state {
                    Quoting::Outside => Quoting::Plain,
                    Quoting::Plain | Quoting::Typographic => Quoting::Outside,
                };
                out.push('"');
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => match state {
                Quoting::Plain => out.push_str("\\\""),
                Quoting::Outside => {
                    state = Quoting::Typographic;
                    out.push('"');
                }
                Quoting::Typographic => {
                    state = Quoting::Outside;
                    out.push('"');
                }
            },
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_json_tagged_fence() {
        let raw = "```json\n{\"keySkills\": []}\n```";
        assert_eq!(normalize(raw).unwrap(), "{\"keySkills\": []}");
    }

    #[test]
    fn test_strips_untagged_fence() {
        let raw = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(normalize(raw).unwrap(), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strips_uppercase_tag_and_surrounding_prose() {
        let raw = "Here is the analysis you asked for:\n```JSON\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(normalize(raw).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_replaces_smart_quotes() {
        let raw = "{\u{201C}skill\u{201D}: \u{201C}Python\u{2019}s ecosystem\u{201D}}";
        assert_eq!(normalize(raw).unwrap(), "{\"skill\": \"Python's ecosystem\"}");
    }

    #[test]
    fn test_smart_quotes_inside_plain_string_are_escaped() {
        let raw = "{\"explanation\": \"Targets \u{201C}cloud\u{201D}, devops folks\", \"searchString\": \"Go\"}";
        let normalized = normalize(raw).unwrap();
        assert_eq!(
            normalized,
            r#"{"explanation": "Targets \"cloud\", devops folks", "searchString": "Go"}"#
        );
        assert!(serde_json::from_str::<serde_json::Value>(&normalized).is_ok());
    }

    #[test]
    fn test_slices_between_first_and_last_brace() {
        let raw = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(normalize(raw).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_keeps_truncated_object_that_starts_with_brace() {
        let raw = "{\"keySkills\": [{\"name\": \"Rust\"";
        assert_eq!(normalize(raw).unwrap(), raw);
    }

    #[test]
    fn test_plain_refusal_is_no_json_found() {
        let err = normalize("Sorry, I cannot help with that.").unwrap_err();
        assert_eq!(err, NormalizationError::NoJsonFound);
    }

    #[test]
    fn test_opening_brace_without_closer_after_prose_is_no_json_found() {
        assert_eq!(
            normalize("Result: { not finished").unwrap_err(),
            NormalizationError::NoJsonFound
        );
        assert_eq!(
            normalize("closing } before opening {").unwrap_err(),
            NormalizationError::NoJsonFound
        );
    }

    #[test]
    fn test_normalizing_normalized_text_is_a_no_op() {
        let inputs = [
            "```json\n{\"keySkills\": [{\"name\": \"Go\"}]}\n```",
            "Prefix \u{201C}quoted\u{201D} {\"a\": \u{2018}b\u{2019}} suffix",
            "  {\"already\": \"clean\"}  ",
        ];
        for input in inputs {
            let once = normalize(input).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize was not idempotent for {input:?}");
        }
    }
}

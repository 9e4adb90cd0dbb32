//! Helpers for coaxing JSON out of model text.

use serde_json::Value;

/// Locate the first balanced JSON object in `text`.
///
/// Models frequently wrap JSON in prose or code fences; this scans for the
/// first `{` and tracks brace depth (string-aware) to find its close.
#[must_use]
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// If `text` is a JSON-quoted string, unwrap it to the inner string.
///
/// Step runners sometimes return their output double-encoded; anything that
/// is not a lone JSON string passes through unchanged.
#[must_use]
pub fn unquote_json_string(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(trimmed) {
            return inner;
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_object_inside_prose() {
        let text = "Sure! Here is the verdict:\n```json\n{\"verdict\": \"pass\"}\n```";
        assert_eq!(first_json_object(text), Some(r#"{"verdict": "pass"}"#));
    }

    #[test]
    fn handles_nested_and_string_braces() {
        let text = r#"{"a": {"b": "}"}, "c": 1} trailing"#;
        assert_eq!(first_json_object(text), Some(r#"{"a": {"b": "}"}, "c": 1}"#));
    }

    #[test]
    fn none_without_object() {
        assert_eq!(first_json_object("no json here"), None);
    }

    #[test]
    fn unquotes_json_strings() {
        assert_eq!(unquote_json_string(r#""hello""#), "hello");
        assert_eq!(unquote_json_string("hello"), "hello");
        assert_eq!(unquote_json_string(r#"{"not": "a string"}"#), r#"{"not": "a string"}"#);
    }
}

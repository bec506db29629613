//! Tolerant extraction of JSON values from free-form generator output.
//!
//! Given arbitrary text, return the largest syntactically valid bracketed
//! (array) or braced (object) span, or a canonical empty value. A fenced
//! ```` ```json ```` block of the right kind wins over any other span.

use serde_json::Value;

/// Largest valid JSON array in `text`, or `[]`.
pub fn extract_json_array(text: &str) -> Value {
    extract(text, '[', ']').unwrap_or_else(|| Value::Array(Vec::new()))
}

/// Largest valid JSON object in `text`, or `{}`.
pub fn extract_json_object(text: &str) -> Value {
    extract(text, '{', '}').unwrap_or_else(|| Value::Object(Default::default()))
}

fn extract(text: &str, open: char, close: char) -> Option<Value> {
    let text = text.trim();
    if let Some(fenced) = fenced_json(text) {
        if fenced.starts_with(open) && fenced.ends_with(close) {
            if let Ok(v) = serde_json::from_str::<Value>(fenced) {
                return Some(v);
            }
        }
    }
    largest_span(text, open)
}

fn fenced_json(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once("```json")?;
    let body = rest.split("```").next().unwrap_or(rest);
    Some(body.trim())
}

/// Each opening bracket is parsed once as the start of a single value, so
/// the work stays linear per start even on brace-heavy text. Starts nested
/// inside an already parsed value are skipped.
fn largest_span(text: &str, open: char) -> Option<Value> {
    let mut best: Option<(usize, Value)> = None;
    let mut covered = 0;
    for (start, _) in text.match_indices(open) {
        if start < covered {
            continue;
        }
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            let len = values.byte_offset();
            if best.as_ref().map_or(true, |(l, _)| len > *l) {
                best = Some((len, value));
            }
            covered = start + len;
        }
    }
    best.map(|(_, v)| v)
}

/// String items of a JSON array, trimmed, empty ones dropped, at most `max`.
pub fn string_items(value: &Value, max: usize) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(max)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Trimmed string field of a JSON object, empty when missing.
pub fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_array() {
        assert_eq!(extract_json_array(r#"["slices", "maps"]"#), json!(["slices", "maps"]));
    }

    #[test]
    fn array_surrounded_by_prose() {
        let text = r#"Sure! Here are the topics: ["asyncio", "typing"] Hope this helps [1]."#;
        assert_eq!(extract_json_array(text), json!(["asyncio", "typing"]));
    }

    #[test]
    fn fenced_block_wins() {
        let text = "```json\n[\"go\"]\n```\nalso [\"python\", \"rust\", \"java\"]";
        assert_eq!(extract_json_array(text), json!(["go"]));
    }

    #[test]
    fn fenced_block_of_wrong_kind_is_ignored() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_array(text), json!([]));
        assert_eq!(extract_json_object(text), json!({"a": 1}));
    }

    #[test]
    fn nested_object_with_braces_in_strings() {
        let text = r#"Analysis: {"flags": {"off_topic": false}, "note": "use {} sparingly"} done"#;
        let v = extract_json_object(text);
        assert_eq!(v["flags"]["off_topic"], json!(false));
        assert_eq!(v["note"], json!("use {} sparingly"));
    }

    #[test]
    fn largest_of_several_objects() {
        let text = r#"{"a": 1} and then {"question": "What is a slice?", "topic": "slices"}"#;
        let v = extract_json_object(text);
        assert_eq!(v["topic"], json!("slices"));
    }

    #[test]
    fn brace_heavy_text_is_scanned_once() {
        let mut text = "fn demo() { if x { y } else { z } } ".repeat(20_000);
        text.push_str(r#"{"topic": "closures"}"#);
        text.push_str(&" }".repeat(20_000));
        let v = extract_json_object(&text);
        assert_eq!(v["topic"], json!("closures"));
    }

    #[test]
    fn garbage_gives_canonical_empty() {
        assert_eq!(extract_json_array("no json here"), json!([]));
        assert_eq!(extract_json_object("{ broken"), json!({}));
        assert_eq!(extract_json_object(""), json!({}));
    }

    #[test]
    fn string_items_filters_and_caps() {
        let v = json!([" slices ", 3, "", "maps", "fmt", "extra"]);
        assert_eq!(string_items(&v, 3), vec!["slices", "maps", "fmt"]);
        assert!(string_items(&json!({"a": 1}), 3).is_empty());
    }

    #[test]
    fn str_field_trims() {
        let v = json!({"question": "  What is GOPATH? ", "n": 1});
        assert_eq!(str_field(&v, "question"), "What is GOPATH?");
        assert_eq!(str_field(&v, "n"), "");
        assert_eq!(str_field(&v, "missing"), "");
    }
}

//! Purpose: Decode a result payload whose JSON framing is not fixed by the server.
//! Exports: `Decoded`, `decode`.
//! Role: Leaf decoder used by the orchestrator after the result download.
//! Invariants: Strategies run in a fixed order: whole document, NDJSON, concatenated scan.
//! Invariants: A later strategy only runs when the earlier one did not match.
//! Invariants: Malformed single documents are never repaired; they surface as `Decode` errors.
use serde::{Serialize, Serializer};
use serde_json::{Deserializer, Value};

use crate::core::error::{Error, ErrorKind};

const SNIPPET_CHARS: usize = 500;

/// A decoded response body: one document, or several in server order.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Document(Value),
    Documents(Vec<Value>),
}

impl Decoded {
    fn from_values(mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            Decoded::Document(values.remove(0))
        } else {
            Decoded::Documents(values)
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            Decoded::Document(Value::Array(items)) => items.len(),
            Decoded::Document(_) => 1,
            Decoded::Documents(values) => values.len(),
        }
    }
}

impl Serialize for Decoded {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Decoded::Document(value) => value.serialize(serializer),
            Decoded::Documents(values) => values.serialize(serializer),
        }
    }
}

enum Attempt {
    Decoded(Decoded),
    NotMatched,
}

pub fn decode(text: &str) -> Result<Decoded, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::new(ErrorKind::Decode).with_message("empty response from server"));
    }

    let whole_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(Decoded::Document(value)),
        Err(err) => err,
    };

    for strategy in [decode_lines, decode_concatenated] {
        if let Attempt::Decoded(decoded) = strategy(text) {
            return Ok(decoded);
        }
    }

    tracing::warn!(snippet = %snippet(text), "response body is not valid json");
    Err(Error::new(ErrorKind::Decode)
        .with_message(format!("could not parse json: {whole_err}"))
        .with_hint("The body was neither one JSON document, NDJSON, nor concatenated JSON values."))
}

fn decode_lines(text: &str) -> Attempt {
    let mut values = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(_) => return Attempt::NotMatched,
        }
    }
    if values.is_empty() {
        return Attempt::NotMatched;
    }
    Attempt::Decoded(Decoded::from_values(values))
}

fn decode_concatenated(text: &str) -> Attempt {
    let mut values = Vec::new();
    let mut rest = text.trim_start();
    while let Some((value, used)) = next_value(rest) {
        values.push(value);
        rest = rest[used..].trim_start();
    }
    if values.is_empty() {
        return Attempt::NotMatched;
    }
    Attempt::Decoded(Decoded::from_values(values))
}

/// One value starting at the head of `text`, with the number of bytes it spans.
fn next_value(text: &str) -> Option<(Value, usize)> {
    let mut stream = Deserializer::from_str(text).into_iter::<Value>();
    if let Some(Ok(value)) = stream.next() {
        return Some((value, stream.byte_offset()));
    }
    leading_scalar(text)
}

// The stream deserializer rejects a number or literal that runs into other text (`7x`).
fn leading_scalar(text: &str) -> Option<(Value, usize)> {
    for (literal, value) in [
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("null", Value::Null),
    ] {
        if text.starts_with(literal) {
            return Some((value, literal.len()));
        }
    }
    let token_len = text
        .find(|ch: char| !matches!(ch, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'))
        .unwrap_or(text.len());
    (1..=token_len).rev().find_map(|end| {
        serde_json::from_str::<Value>(&text[..end])
            .ok()
            .map(|value| (value, end))
    })
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoded, decode, snippet};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn single_object_is_returned_as_is() {
        assert_eq!(
            decode(r#"{"a":1}"#).expect("decode"),
            Decoded::Document(json!({"a": 1}))
        );
    }

    #[test]
    fn top_level_array_stays_one_document() {
        let decoded = decode(r#"[{"a":1},{"a":2}]"#).expect("decode");
        assert_eq!(decoded, Decoded::Document(json!([{"a": 1}, {"a": 2}])));
        assert_eq!(decoded.record_count(), 2);
    }

    #[test]
    fn ndjson_lines_become_ordered_sequence() {
        let decoded = decode("{\"a\":1}\n{\"a\":2}").expect("decode");
        assert_eq!(
            decoded,
            Decoded::Documents(vec![json!({"a": 1}), json!({"a": 2})])
        );
    }

    #[test]
    fn ndjson_tolerates_crlf_and_blank_lines() {
        let decoded = decode("{\"a\":1}\r\n\r\n  {\"a\":2}  \r\n").expect("decode");
        assert_eq!(serde_json::to_value(&decoded).expect("json"), json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn single_ndjson_line_is_not_wrapped() {
        let decoded = decode("\n\n{\"a\":1}\n\n").expect("decode");
        assert_eq!(decoded, Decoded::Document(json!({"a": 1})));
    }

    #[test]
    fn concatenated_documents_are_split() {
        let decoded = decode(r#"{"a":1}{"a":2}"#).expect("decode");
        assert_eq!(
            decoded,
            Decoded::Documents(vec![json!({"a": 1}), json!({"a": 2})])
        );
    }

    #[test]
    fn concatenated_documents_spanning_lines() {
        let body = "{\n  \"a\": 1\n}\n{\n  \"a\": 2\n}";
        let decoded = decode(body).expect("decode");
        assert_eq!(serde_json::to_value(&decoded).expect("json"), json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn concatenated_scan_stops_at_first_invalid_position() {
        let decoded = decode(r#"{"a":1}{"a":2} trailing"#).expect("decode");
        assert_eq!(serde_json::to_value(&decoded).expect("json"), json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn scalar_running_into_text_is_kept() {
        assert_eq!(decode("1x").expect("decode"), Decoded::Document(json!(1)));
        assert_eq!(
            decode(r#"{"a":1}7x"#).expect("decode"),
            Decoded::Documents(vec![json!({"a": 1}), json!(7)])
        );
        assert_eq!(
            decode("truex null").expect("decode"),
            Decoded::Document(json!(true))
        );
    }

    #[test]
    fn concatenated_scalars_between_documents() {
        let decoded = decode(r#"{"a":1} 2 "three"[4]"#).expect("decode");
        assert_eq!(
            decoded,
            Decoded::Documents(vec![json!({"a": 1}), json!(2), json!("three"), json!([4])])
        );
    }

    #[test]
    fn empty_and_whitespace_input_fail() {
        for body in ["", "   \n\t  "] {
            let err = decode(body).expect_err("err");
            assert_eq!(err.kind(), ErrorKind::Decode);
            assert_eq!(err.message(), Some("empty response from server"));
        }
    }

    #[test]
    fn garbage_input_fails_without_partial_results() {
        let err = decode("not json").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.message().unwrap_or_default().starts_with("could not parse json"));
    }

    #[test]
    fn truncated_document_fails() {
        let err = decode(r#"{"a": [1, 2"#).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(600);
        assert_eq!(snippet(&text).chars().count(), 500);
        assert_eq!(snippet("short"), "short");
    }
}

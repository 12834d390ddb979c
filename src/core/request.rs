//! Purpose: Validate the inbound request payload.
//! Exports: `parse_text_body`.
//! Role: Pure body validation for the single POST surface.
//! Invariants: Unparseable JSON and a missing/mistyped `text` field are
//! Invariants: distinct usage errors with stable, field-naming messages.

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

/// Parse the raw request body as `{"text": string}` and return the text.
///
/// An empty string is accepted; `text` must be a string, not non-empty.
pub fn parse_text_body(raw: &str) -> Result<String, Error> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Invalid JSON")
            .with_source(err)
    })?;
    match value.get("text") {
        Some(Value::String(text)) => Ok(text.clone()),
        _ => Err(Error::new(ErrorKind::Usage).with_message("Missing or invalid 'text' field")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_text_body;
    use crate::core::error::ErrorKind;

    #[test]
    fn accepts_a_text_string() {
        assert_eq!(parse_text_body(r#"{"text":"hello"}"#).expect("text"), "hello");
    }

    #[test]
    fn accepts_an_empty_text_string() {
        assert_eq!(parse_text_body(r#"{"text":""}"#).expect("text"), "");
    }

    #[test]
    fn rejects_unparseable_json() {
        let err = parse_text_body("{not json").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("Invalid JSON"));
    }

    #[test]
    fn rejects_a_missing_text_field() {
        let err = parse_text_body(r#"{"body":"hello"}"#).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("Missing or invalid 'text' field"));
    }

    #[test]
    fn rejects_a_non_string_text_field() {
        let err = parse_text_body(r#"{"text":42}"#).expect_err("err");
        assert_eq!(err.message(), Some("Missing or invalid 'text' field"));
    }

    #[test]
    fn rejects_a_non_object_body() {
        let err = parse_text_body(r#""just a string""#).expect_err("err");
        assert_eq!(err.message(), Some("Missing or invalid 'text' field"));
    }
}

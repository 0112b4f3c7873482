//! Tests for captured payload decoding

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::{json, Value};

    use crate::capture::decode_payload;

    #[test]
    fn test_base64_json_decodes_to_value() {
        let values = [
            json!({"generated_text": "Paris", "details": {"tokens": 3}}),
            json!([{"generated_text": "a"}, {"generated_text": "b"}]),
            json!("quoted string"),
            json!(42),
            json!(null),
        ];

        for value in values {
            let encoded = STANDARD.encode(value.to_string());
            assert_eq!(decode_payload(&encoded, Some("BASE64")), value);
        }
    }

    #[test]
    fn test_plain_text_is_returned_unchanged() {
        for text in ["upstream request timeout", "<html>502 Bad Gateway</html>", "{not json"] {
            assert_eq!(decode_payload(text, Some("JSON")), Value::String(text.to_string()));
            assert_eq!(decode_payload(text, None), Value::String(text.to_string()));
        }
    }

    #[test]
    fn test_base64_plain_text_is_returned_as_text() {
        let encoded = STANDARD.encode("Received server error (500) from primary");
        assert_eq!(
            decode_payload(&encoded, Some("BASE64")),
            json!("Received server error (500) from primary")
        );
    }

    #[test]
    fn test_encoding_tag_is_case_insensitive() {
        let encoded = STANDARD.encode(r#"{"code": 400}"#);
        assert_eq!(decode_payload(&encoded, Some("base64")), json!({"code": 400}));
    }
}

//! Captured payload decoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::error;
use serde_json::{Map, Value};

/// Encoding tag for base64-encoded payloads
pub const BASE64_ENCODING: &str = "BASE64";

/// Decode one captured field into a structured value.
///
/// Base64 payloads are decoded to UTF-8 text first. Text that parses as JSON
/// becomes that JSON value, anything else is returned as a string. An empty
/// plain payload yields an empty object. Decoding failures are returned as an
/// `"Error decoding: ..."` string rather than an error.
pub fn decode_payload(data: &str, encoding: Option<&str>) -> Value {
    if is_base64(encoding) {
        return decode_base64(data);
    }

    if data.is_empty() {
        return Value::Object(Map::new());
    }

    parse_text(data)
}

fn is_base64(encoding: Option<&str>) -> bool {
    encoding.map_or(false, |e| e.eq_ignore_ascii_case(BASE64_ENCODING))
}

fn decode_base64(data: &str) -> Value {
    let bytes = match STANDARD.decode(data.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Error decoding base64 data: {}", e);
            return Value::String(format!("Error decoding: {}", e));
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => parse_text(&text),
        Err(e) => {
            error!("Error decoding base64 data: {}", e);
            Value::String(format!("Error decoding: {}", e))
        }
    }
}

fn parse_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

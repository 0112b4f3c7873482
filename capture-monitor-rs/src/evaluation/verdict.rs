//! Judge verdict parsing
//!
//! Judges answer with `{"result": ..., "rationale": ...}`. The `}` stop
//! sequence usually cuts the closing brace off, so it is restored before
//! decoding.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ServiceError};
use crate::util::truncate_string;

/// A parsed judge answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// One of the allowed values, in its canonical spelling
    pub result: String,
    pub rationale: Option<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    result: Value,
    #[serde(default)]
    rationale: Option<String>,
}

/// Parse a judge completion, accepting only `allowed` results (any result when empty)
pub fn parse_verdict(text: &str, allowed: &[&str]) -> Result<Verdict> {
    let raw = decode(text)?;

    let result = match raw.result {
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => (if b { "yes" } else { "no" }).to_string(),
        Value::Null => return Err(ServiceError::parsing("Judge verdict has no result")),
        other => other.to_string(),
    };

    let result = if allowed.is_empty() {
        result
    } else {
        allowed
            .iter()
            .find(|value| value.eq_ignore_ascii_case(&result))
            .map(|value| value.to_string())
            .ok_or_else(|| {
                ServiceError::parsing(format!(
                    "Judge result '{}' is not one of: {}",
                    result,
                    allowed.join(", ")
                ))
            })?
    };

    Ok(Verdict {
        result,
        rationale: raw.rationale.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
    })
}

fn decode(text: &str) -> Result<RawVerdict> {
    let body = strip_code_fence(text.trim());
    let start = body.find('{').ok_or_else(|| {
        ServiceError::parsing(format!("Judge answer is not a JSON object: {}", truncate_string(body, 80)))
    })?;
    let body = &body[start..];

    if let Ok(verdict) = serde_json::from_str::<RawVerdict>(body) {
        return Ok(verdict);
    }

    let restored = format!("{}}}", body.trim_end());
    serde_json::from_str::<RawVerdict>(&restored).map_err(|e| {
        ServiceError::parsing(format!(
            "Could not parse judge answer ({}): {}",
            e,
            truncate_string(body, 80)
        ))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches("json").trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// crates/acvp-net/src/envelope.rs
// ============================================================================
// Module: Response envelopes
// Description: Parsing for the ACVP server's versioned envelope, retry
//              ("please wait") responses, and verdict ("disposition")
//              responses.
// ============================================================================

//! ## Overview
//! The server sometimes wraps its payload in a two-element JSON array
//! `[{"acvVersion": "..."}, { ...actual content... }]`; [`strip_version_wrapper`]
//! normalizes both the wrapped and bare-object forms to the inner value.

use acvp_core::interfaces::NetError;
use serde::Deserialize;

/// Strips a versioned array envelope down to its content object, if present.
///
/// # Errors
/// Returns [`NetError::MalformedBody`] if the bytes are not valid JSON.
pub fn strip_version_wrapper(bytes: &[u8]) -> Result<serde_json::Value, NetError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|err| NetError::MalformedBody(err.to_string()))?;
    match value {
        serde_json::Value::Array(mut items) => {
            items.pop().ok_or_else(|| NetError::MalformedBody("empty envelope array".to_string()))
        }
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
struct RetryEnvelope {
    retry: u64,
}

/// Parses a "please wait N seconds" retry envelope out of `value`, if
/// present.
#[must_use]
pub fn parse_retry(value: &serde_json::Value) -> Option<u64> {
    serde_json::from_value::<RetryEnvelope>(value.clone())
        .ok()
        .map(|envelope| envelope.retry)
}

#[derive(Debug, Deserialize)]
struct VerdictEnvelope {
    disposition: String,
}

/// Parses the `disposition` field out of a verdict payload, if present.
#[must_use]
pub fn parse_disposition(value: &serde_json::Value) -> Option<String> {
    serde_json::from_value::<VerdictEnvelope>(value.clone())
        .ok()
        .map(|envelope| envelope.disposition)
}

//! Response normalization.
//!
//! # Design
//! A response goes through three gates before its payload is returned:
//! HTTP status, the outer `{error_code, error_message, data}` envelope, and
//! for encrypted calls the decrypted inner envelope, which repeats the same
//! `error_code` convention. A failure at any gate becomes one `ApiError`.
//! Reshaping the payload is left to the endpoint that asked for it.

use serde_json::Value;
use tracing::warn;

use crate::cipher::{self, ParseMode, SymmetricKey};
use crate::error::{ApiError, TransportError};
use crate::http::HttpResponse;

/// Turn a transport outcome into the payload or a typed error.
pub fn normalize(
    outcome: Result<HttpResponse, TransportError>,
    mode: ParseMode,
    key: &SymmetricKey,
) -> Result<Value, ApiError> {
    let response = outcome.map_err(ApiError::from)?;
    handle_response(&response, mode, key)
}

/// Normalize a response that did arrive.
pub fn handle_response(response: &HttpResponse, mode: ParseMode, key: &SymmetricKey) -> Result<Value, ApiError> {
    if !response.is_success() {
        let message = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| status_message(response));
        warn!(status = response.status, "request failed with HTTP status");
        return Err(ApiError::Api {
            code: i64::from(response.status),
            message,
        });
    }

    if let Some(reason) = &response.body_error {
        return Err(ApiError::DecryptFailure(format!("unreadable response body: {reason}")));
    }

    let envelope = cipher::parse_unencrypted(&response.body)?;
    check_envelope(&envelope)?;

    match mode {
        ParseMode::Unencrypted => Ok(payload(envelope)),
        ParseMode::Encrypted => match envelope.get("data") {
            None | Some(Value::Null) => Ok(Value::Null),
            Some(Value::String(ciphertext)) => {
                let inner = cipher::parse_encrypted(key, ciphertext)?;
                check_envelope(&inner)?;
                Ok(payload(inner))
            }
            Some(_) => Err(ApiError::DecryptFailure(
                "expected ciphertext in `data`, found plaintext JSON".to_string(),
            )),
        },
    }
}

/// Fail on a non-zero `error_code`. Bodies without one pass.
fn check_envelope(value: &Value) -> Result<(), ApiError> {
    let Some(code) = value.get("error_code").and_then(error_code) else {
        return Ok(());
    };
    if code == 0 {
        return Ok(());
    }
    let message = error_message(value).unwrap_or_else(|| format!("error code {code}"));
    warn!(code, "remote API returned an error envelope");
    Err(ApiError::Api { code, message })
}

/// Unwrap `data` from an envelope; other values are returned unchanged.
fn payload(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("error_code") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

fn error_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["error_message", "message"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn status_message(response: &HttpResponse) -> String {
    let body = response.body.trim();
    if body.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        body.chars().take(200).collect()
    }
}

/// Read a JSON sub-field that the API ships as an embedded JSON string.
///
/// Returns `empty` when the field is missing, is not valid JSON, or parses to
/// a different kind of value than `empty`. Only for endpoint fields known to
/// be sloppy; the envelope itself is never read this way.
pub fn lenient_json_field(raw: Option<&Value>, empty: Value) -> Value {
    let parsed = match raw {
        Some(Value::String(text)) => serde_json::from_str::<Value>(text).ok(),
        Some(value) => Some(value.clone()),
        None => None,
    };
    match parsed {
        Some(value) if same_kind(&value, &empty) => value,
        _ => empty,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_))
    )
}

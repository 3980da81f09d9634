//! Error types for the request envelope.
//!
//! # Design
//! Each pipeline stage has its own small error type so unit tests can assert
//! on exactly what went wrong. All of them fold into `ApiError`, the single
//! taxonomy callers see. `ApiError` exposes the category, a numeric code, a
//! human message and whether the failure is worth retrying; only transport
//! failures are retryable.

use std::fmt;

/// The five failure categories a call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InvalidInput,
    ServiceNotFound,
    Network,
    Api,
    DecryptFailure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::ServiceNotFound => "service_not_found",
            ErrorCategory::Network => "network",
            ErrorCategory::Api => "api",
            ErrorCategory::DecryptFailure => "decrypt_failure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by `ZpwClient` and the pipeline stages it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// A caller-supplied argument failed a precondition, or the parameters
    /// could not be serialized.
    InvalidInput(String),

    /// The session's service directory has no entry for this service.
    ServiceNotFound { service: String },

    /// The transport failed before a response was received.
    Network { kind: TransportErrorKind, message: String },

    /// The remote API answered with a non-2xx status or an error envelope.
    Api { code: i64, message: String },

    /// The response could not be decrypted or was not valid JSON.
    DecryptFailure(String),
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::InvalidInput(_) => ErrorCategory::InvalidInput,
            ApiError::ServiceNotFound { .. } => ErrorCategory::ServiceNotFound,
            ApiError::Network { .. } => ErrorCategory::Network,
            ApiError::Api { .. } => ErrorCategory::Api,
            ApiError::DecryptFailure(_) => ErrorCategory::DecryptFailure,
        }
    }

    /// Application code or HTTP status for `Api` errors, `None` otherwise.
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidInput(msg) => msg.clone(),
            ApiError::ServiceNotFound { service } => format!("service not found: {service}"),
            ApiError::Network { message, .. } => message.clone(),
            ApiError::Api { message, .. } => message.clone(),
            ApiError::DecryptFailure(msg) => msg.clone(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ApiError::ServiceNotFound { service } => write!(f, "service not found: {service}"),
            ApiError::Network { kind, message } => write!(f, "network error ({kind}): {message}"),
            ApiError::Api { code, message } => write!(f, "API error {code}: {message}"),
            ApiError::DecryptFailure(msg) => write!(f, "decrypt failure: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// The session key could not be decoded into AES key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    Base64(String),
    /// Decoded length is not 16, 24 or 32 bytes.
    Length(usize),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Base64(msg) => write!(f, "symmetric key is not valid base64: {msg}"),
            KeyError::Length(len) => {
                write!(f, "symmetric key must decode to 16, 24 or 32 bytes, got {len}")
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Parameters could not be serialized before encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptError(pub String);

impl fmt::Display for EncryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encrypt: {}", self.0)
    }
}

impl std::error::Error for EncryptError {}

/// Ciphertext could not be turned back into JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// Input looks like plaintext JSON; the caller picked the wrong parse mode.
    Plaintext,
    Encoding(String),
    /// Raw ciphertext length is not a multiple of the AES block size.
    Length(usize),
    Padding,
    Utf8,
    Json(String),
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptError::Plaintext => write!(f, "decrypt: input is plaintext JSON, not ciphertext"),
            DecryptError::Encoding(msg) => write!(f, "decrypt: bad encoding: {msg}"),
            DecryptError::Length(len) => {
                write!(f, "decrypt: ciphertext length {len} is not a multiple of 16")
            }
            DecryptError::Padding => write!(f, "decrypt: invalid PKCS#7 padding"),
            DecryptError::Utf8 => write!(f, "decrypt: plaintext is not UTF-8"),
            DecryptError::Json(msg) => write!(f, "decrypt: plaintext is not JSON: {msg}"),
        }
    }
}

impl std::error::Error for DecryptError {}

/// The service directory has no usable entry for `service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    pub service: String,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service not found: {}", self.service)
    }
}

impl std::error::Error for NotFoundError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    ConnectionRefused,
    Timeout,
    Dns,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// The transport failed to produce any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// A session snapshot could not be restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Key(KeyError),
    /// A field is missing or malformed.
    Field { field: &'static str, message: String },
    Json(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Key(e) => write!(f, "session: {e}"),
            SessionError::Field { field, message } => write!(f, "session: {field}: {message}"),
            SessionError::Json(msg) => write!(f, "session: invalid JSON: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<KeyError> for SessionError {
    fn from(e: KeyError) -> Self {
        SessionError::Key(e)
    }
}

// ---------------------------------------------------------------------------
// Folding into the taxonomy
// ---------------------------------------------------------------------------

impl From<EncryptError> for ApiError {
    fn from(e: EncryptError) -> Self {
        ApiError::InvalidInput(e.to_string())
    }
}

impl From<DecryptError> for ApiError {
    fn from(e: DecryptError) -> Self {
        ApiError::DecryptFailure(e.to_string())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(e: NotFoundError) -> Self {
        ApiError::ServiceNotFound { service: e.service }
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Network {
            kind: e.kind,
            message: e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        let network: ApiError = TransportError::new(TransportErrorKind::Timeout, "timed out").into();
        assert!(network.is_retryable());
        assert_eq!(network.category(), ErrorCategory::Network);

        let others = [
            ApiError::InvalidInput("x".into()),
            ApiError::ServiceNotFound { service: "alias".into() },
            ApiError::Api { code: 500, message: "boom".into() },
            ApiError::DecryptFailure("bad".into()),
        ];
        for err in others {
            assert!(!err.is_retryable(), "{err} should not be retryable");
        }
    }

    #[test]
    fn not_found_folds_into_service_not_found() {
        let err: ApiError = NotFoundError { service: "alias".into() }.into();
        assert_eq!(err.category(), ErrorCategory::ServiceNotFound);
        assert_eq!(err.to_string(), "service not found: alias");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn decrypt_error_folds_into_decrypt_failure() {
        let err: ApiError = DecryptError::Length(17).into();
        assert_eq!(err.category(), ErrorCategory::DecryptFailure);
        assert!(err.message().contains("17"));
    }

    #[test]
    fn api_error_exposes_code_and_message() {
        let err = ApiError::Api { code: -1, message: "Invalid message".into() };
        assert_eq!(err.code(), Some(-1));
        assert_eq!(err.message(), "Invalid message");
        assert_eq!(err.category().as_str(), "api");
    }
}

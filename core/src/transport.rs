//! The network boundary.
//!
//! # Design
//! `Transport` is the only place a request leaves the process. The client
//! takes it as a generic parameter, so tests hand in a fake and production
//! code hands in [`UreqTransport`] (default `ureq` feature). Implementations
//! return any HTTP status as data; only failures that produce no response at
//! all are `TransportError`s. Timeouts, cookies and connection reuse belong
//! here, not in the pipeline.

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::HttpResponse;

/// Blocking HTTP capability used by the dispatcher.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError>;

    fn post(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }

    fn post(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).post(url, body, headers)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }

    fn post(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).post(url, body, headers)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }

    fn post(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        (**self).post(url, body, headers)
    }
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::{TransportConfig, UreqTransport};

#[cfg(feature = "ureq")]
mod ureq_transport {
    use std::fmt;
    use std::io::ErrorKind;
    use std::time::Duration;

    use super::Transport;
    use crate::error::{TransportError, TransportErrorKind};
    use crate::http::HttpResponse;
    use crate::session::Credentials;

    /// Settings for [`UreqTransport`].
    #[derive(Debug, Clone)]
    pub struct TransportConfig {
        /// Whole-request deadline. `None` waits forever.
        pub timeout: Option<Duration>,
        /// Sent as the `cookie` header on every request.
        pub cookie_header: Option<String>,
    }

    impl Default for TransportConfig {
        fn default() -> Self {
            Self {
                timeout: Some(Duration::from_secs(30)),
                cookie_header: None,
            }
        }
    }

    impl TransportConfig {
        pub fn from_credentials(credentials: &Credentials) -> Self {
            Self {
                cookie_header: credentials.cookie_jar.header_value(),
                ..Self::default()
            }
        }
    }

    /// Blocking transport backed by a `ureq` agent.
    ///
    /// Non-2xx statuses are returned as responses, never as errors, so the
    /// normalizer sees the status and body.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
        cookie_header: Option<String>,
    }

    impl fmt::Debug for UreqTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("UreqTransport")
                .field("cookies", &self.cookie_header.is_some())
                .finish_non_exhaustive()
        }
    }

    impl UreqTransport {
        pub fn new(config: TransportConfig) -> Self {
            let agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(config.timeout)
                .build()
                .new_agent();
            Self {
                agent,
                cookie_header: config.cookie_header,
            }
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new(TransportConfig::default())
        }
    }

    impl Transport for UreqTransport {
        fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            let mut request = self.agent.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(cookie) = &self.cookie_header {
                request = request.header("cookie", cookie.as_str());
            }
            let response = request.call().map_err(map_error)?;
            read_response(response)
        }

        fn post(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            let mut request = self.agent.post(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(cookie) = &self.cookie_header {
                request = request.header("cookie", cookie.as_str());
            }
            let response = request.send(body.as_bytes()).map_err(map_error)?;
            read_response(response)
        }
    }

    fn read_response(mut response: ureq::http::Response<ureq::Body>) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // Once the status is in, only failures to receive the body are
        // transport errors; an over-limit or non-UTF-8 body is the server's.
        let bytes = match response.body_mut().read_to_vec() {
            Ok(bytes) => bytes,
            Err(ureq::Error::BodyExceedsLimit(limit)) => {
                return Ok(HttpResponse::unreadable(status, headers, format!("body exceeds {limit} bytes")));
            }
            Err(err) => return Err(map_error(err)),
        };
        match String::from_utf8(bytes) {
            Ok(body) => Ok(HttpResponse {
                status,
                headers,
                body,
                body_error: None,
            }),
            Err(_) => Ok(HttpResponse::unreadable(status, headers, "body is not valid UTF-8")),
        }
    }

    fn map_error(err: ureq::Error) -> TransportError {
        let kind = match &err {
            ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
            ureq::Error::HostNotFound => TransportErrorKind::Dns,
            ureq::Error::ConnectionFailed => TransportErrorKind::ConnectionRefused,
            ureq::Error::Io(io) => match io.kind() {
                ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
                ErrorKind::TimedOut => TransportErrorKind::Timeout,
                _ => TransportErrorKind::Other,
            },
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string())
    }
}

//! Sends assembled requests through the injected transport.
//!
//! No parsing, no retries, no timeouts: a transport failure is returned as
//! is and becomes a retryable `network` error further up.

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::Credentials;
use crate::transport::Transport;

pub const HEADER_USER_AGENT: &str = "user-agent";
pub const HEADER_DEVICE_ID: &str = "x-zpw-device-id";
pub const HEADER_ACCEPT_LANGUAGE: &str = "accept-language";
pub const HEADER_ORIGIN: &str = "origin";
pub const HEADER_REFERER: &str = "referer";
pub const HEADER_CONTENT_TYPE: &str = "content-type";

pub const WEB_ORIGIN: &str = "https://chat.zalo.me";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Headers every call carries, in a fixed order.
pub fn identity_headers(credentials: &Credentials) -> Vec<(String, String)> {
    vec![
        (HEADER_USER_AGENT.to_string(), credentials.user_agent.clone()),
        (HEADER_DEVICE_ID.to_string(), credentials.device_id.clone()),
        (HEADER_ACCEPT_LANGUAGE.to_string(), credentials.language.clone()),
        (HEADER_ORIGIN.to_string(), WEB_ORIGIN.to_string()),
        (HEADER_REFERER.to_string(), format!("{WEB_ORIGIN}/")),
    ]
}

#[derive(Debug, Clone)]
pub struct RequestDispatcher<T> {
    transport: T,
}

impl<T: Transport> RequestDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform exactly one round trip.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let target = without_query(&request.url);
        debug!(method = request.method.as_str(), url = target, "dispatching request");

        let result = match request.method {
            HttpMethod::Get => self.transport.get(&request.url, &request.headers),
            HttpMethod::Post => {
                let body = request.body.as_deref().unwrap_or_default();
                self.transport.post(&request.url, body, &request.headers)
            }
        };

        match &result {
            Ok(response) => debug!(url = target, status = response.status, "response received"),
            Err(err) => warn!(url = target, kind = %err.kind, "transport failed: {}", err.message),
        }
        result
    }
}

/// The query string carries ciphertext; keep it out of logs.
fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl Transport for Recorder {
        fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(("GET".into(), url.into(), None));
            Ok(HttpResponse::new(200, "{}"))
        }

        fn post(&self, url: &str, body: &str, _headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(("POST".into(), url.into(), Some(body.into())));
            Ok(HttpResponse::new(200, "{}"))
        }
    }

    struct Refusing;

    impl Transport for Refusing {
        fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new(TransportErrorKind::ConnectionRefused, "refused"))
        }

        fn post(&self, _url: &str, _body: &str, _headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new(TransportErrorKind::ConnectionRefused, "refused"))
        }
    }

    fn request(method: HttpMethod, body: Option<&str>) -> HttpRequest {
        HttpRequest {
            method,
            url: "https://h/api/x?zpw_ver=645&zpw_type=30".into(),
            headers: Vec::new(),
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn identity_headers_carry_device_and_agent() {
        let headers = identity_headers(&Credentials::new("device-1", "agent/1.0"));
        assert!(headers.contains(&(HEADER_USER_AGENT.into(), "agent/1.0".into())));
        assert!(headers.contains(&(HEADER_DEVICE_ID.into(), "device-1".into())));
        assert!(headers.contains(&(HEADER_ACCEPT_LANGUAGE.into(), "vi".into())));
    }

    #[test]
    fn routes_by_method() {
        let dispatcher = RequestDispatcher::new(Recorder::default());
        dispatcher.send(&request(HttpMethod::Get, None)).unwrap();
        dispatcher.send(&request(HttpMethod::Post, Some("params=abc"))).unwrap();

        let calls = dispatcher.transport().calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "GET");
        assert_eq!(calls[1].0, "POST");
        assert_eq!(calls[1].2.as_deref(), Some("params=abc"));
    }

    #[test]
    fn transport_failure_is_passed_through() {
        let err = RequestDispatcher::new(Refusing)
            .send(&request(HttpMethod::Get, None))
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ConnectionRefused);
    }

    #[test]
    fn log_target_drops_query() {
        assert_eq!(without_query("https://h/a?params=secret"), "https://h/a");
        assert_eq!(without_query("https://h/a"), "https://h/a");
    }
}

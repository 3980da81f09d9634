//! HTTP request and response values exchanged with a transport.
//!
//! # Design
//! Requests and responses are plain data. The client builds an `HttpRequest`
//! without touching the network and parses an `HttpResponse` without knowing
//! where it came from, so every step between the two can be tested with
//! literal values. Owned `String`/`Vec` fields keep them easy to move across
//! threads.

/// The remote API only uses GET and POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully assembled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Form-encoded body, POST only.
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Set when the response arrived but its body could not be read as
    /// text. `body` is empty in that case.
    pub body_error: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            body_error: None,
        }
    }

    /// A response whose status arrived but whose body is unusable.
    pub fn unreadable(status: u16, headers: Vec<(String, String)>, reason: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: String::new(),
            body_error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

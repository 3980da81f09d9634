//! The request envelope pipeline behind one client value.
//!
//! # Design
//! `ZpwClient` holds the session, the caller's credentials and a transport,
//! and carries no mutable state between calls. Each call is split the same
//! way as the wire: a `build_*` method that encrypts parameters, resolves
//! the host and assembles an `HttpRequest`, and `parse` which normalizes an
//! `HttpResponse`. `get`/`post` chain the two through the transport for the
//! common case; the split stays public so requests can be inspected or sent
//! by other means.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::cipher::{self, ParseMode};
use crate::dispatch::{identity_headers, RequestDispatcher, FORM_CONTENT_TYPE, HEADER_CONTENT_TYPE};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize;
use crate::session::{Credentials, SessionContext};
use crate::transport::Transport;
use crate::url_builder;

/// Client for the encrypted API of one logged-in session.
///
/// Cheap to share: wrap it in an `Arc` and call it from any number of
/// threads.
#[derive(Debug, Clone)]
pub struct ZpwClient<T> {
    session: Arc<SessionContext>,
    credentials: Credentials,
    dispatcher: RequestDispatcher<T>,
}

impl<T: Transport> ZpwClient<T> {
    pub fn new(session: impl Into<Arc<SessionContext>>, credentials: Credentials, transport: T) -> Self {
        Self {
            session: session.into(),
            credentials,
            dispatcher: RequestDispatcher::new(transport),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    /// Base host for `service`.
    pub fn resolve(&self, service: impl AsRef<str>) -> Result<&str, ApiError> {
        Ok(self.session.directory().resolve(service)?)
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    /// GET with the encrypted `params` in the query string.
    pub fn build_get<P: Serialize + ?Sized>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        let ciphertext = cipher::encrypt(self.session.key(), params)?;
        let base = self.resolve(service)?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url_builder::build_with_params(base, path, &ciphertext, extra_query, &self.session),
            headers: identity_headers(&self.credentials),
            body: None,
        })
    }

    /// GET carrying only protocol markers and `extra_query` (heartbeat-style
    /// calls).
    pub fn build_plain_get(
        &self,
        service: impl AsRef<str>,
        path: &str,
        extra_query: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        let base = self.resolve(service)?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url_builder::build(base, path, extra_query, &self.session),
            headers: identity_headers(&self.credentials),
            body: None,
        })
    }

    /// POST with the encrypted `params` as the only form field.
    ///
    /// Pass [`url_builder::NRETRY`] in `extra_query` for endpoints that
    /// expect the retry marker.
    pub fn build_post<P: Serialize + ?Sized>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        let ciphertext = cipher::encrypt(self.session.key(), params)?;
        let base = self.resolve(service)?;
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("params", &ciphertext)
            .finish();

        let mut headers = identity_headers(&self.credentials);
        headers.push((HEADER_CONTENT_TYPE.to_string(), FORM_CONTENT_TYPE.to_string()));

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: url_builder::build(base, path, extra_query, &self.session),
            headers,
            body: Some(body),
        })
    }

    // -----------------------------------------------------------------------
    // Response parsing
    // -----------------------------------------------------------------------

    pub fn parse(&self, response: HttpResponse, mode: ParseMode) -> Result<Value, ApiError> {
        normalize::handle_response(&response, mode, self.session.key())
    }

    /// Parse and deserialize the payload into `R`.
    pub fn parse_as<R: DeserializeOwned>(&self, response: HttpResponse, mode: ParseMode) -> Result<R, ApiError> {
        deserialize(self.parse(response, mode)?)
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    /// Build, send and parse an encrypted GET.
    pub fn get<P: Serialize + ?Sized>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
        mode: ParseMode,
    ) -> Result<Value, ApiError> {
        let request = self.build_get(service, path, params, extra_query)?;
        self.execute(&request, mode)
    }

    /// Build, send and parse an encrypted POST.
    pub fn post<P: Serialize + ?Sized>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
        mode: ParseMode,
    ) -> Result<Value, ApiError> {
        let request = self.build_post(service, path, params, extra_query)?;
        self.execute(&request, mode)
    }

    pub fn get_as<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
        mode: ParseMode,
    ) -> Result<R, ApiError> {
        deserialize(self.get(service, path, params, extra_query, mode)?)
    }

    pub fn post_as<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        service: impl AsRef<str>,
        path: &str,
        params: &P,
        extra_query: &[(&str, &str)],
        mode: ParseMode,
    ) -> Result<R, ApiError> {
        deserialize(self.post(service, path, params, extra_query, mode)?)
    }

    /// Send an already built request and normalize whatever comes back.
    pub fn execute(&self, request: &HttpRequest, mode: ParseMode) -> Result<Value, ApiError> {
        let outcome = self.dispatcher.send(request);
        normalize::normalize(outcome, mode, self.session.key())
    }
}

fn deserialize<R: DeserializeOwned>(value: Value) -> Result<R, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::DecryptFailure(format!("unexpected payload shape: {e}")))
}

//! Secure request envelope for the encrypted chat web API.
//!
//! # Overview
//! Every endpoint of the remote API goes through the same pipeline:
//! encrypt the parameter object under the session key, resolve the backend
//! host for the service, append the protocol markers, send through a
//! transport, then decrypt and normalize the response into a payload or one
//! `ApiError`. This crate is that pipeline; endpoint-specific parameter
//! shaping lives with the callers.
//!
//! # Design
//! - `SessionContext` is immutable and shared read-only; calls never mutate
//!   it, so one session can serve any number of concurrent calls.
//! - The transport is a generic parameter (`Transport`), never global
//!   state. Tests pass a fake; `UreqTransport` is the default real one.
//! - `ZpwClient` keeps the build/parse split explicit (`build_*` produce an
//!   `HttpRequest`, `parse` consumes an `HttpResponse`) so the wire format
//!   can be checked without a network.
//! - Nothing here retries. A transport failure is reported as a retryable
//!   `network` error and the caller decides.

pub mod cipher;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod normalize;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod url_builder;

pub use cipher::{decrypt, encrypt, ParseMode, SymmetricKey};
pub use client::ZpwClient;
pub use dispatch::RequestDispatcher;
pub use error::{
    ApiError, DecryptError, EncryptError, ErrorCategory, KeyError, NotFoundError, SessionError, TransportError,
    TransportErrorKind,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::lenient_json_field;
pub use resolver::{Service, ServiceDirectory, ServiceEntry, DEFAULT_PROFILE_HOST};
pub use session::{CookieJar, Credentials, FeatureSettings, SessionContext, ShareFileSettings};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::{TransportConfig, UreqTransport};

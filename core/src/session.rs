//! Per-login session state and per-client identity.
//!
//! # Design
//! `SessionContext` is built once at login or session restore and never
//! mutated afterwards; a re-login produces a new value. Share it behind an
//! `Arc` across threads. The symmetric key is decoded at construction so a
//! bad key fails the restore instead of the first request.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cipher::SymmetricKey;
use crate::error::SessionError;
use crate::resolver::ServiceDirectory;

pub const DEFAULT_PROTOCOL_VERSION: u32 = 645;
pub const DEFAULT_PROTOCOL_TYPE: u32 = 30;
pub const DEFAULT_LANGUAGE: &str = "vi";

// ---------------------------------------------------------------------------
// Feature settings
// ---------------------------------------------------------------------------

/// Typed view of the feature configuration shipped with the login payload.
///
/// Unknown keys are ignored; missing keys take the defaults below. A zero
/// chunk size is rejected during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub sharefile: ShareFileSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareFileSettings {
    /// Upload chunk size in bytes.
    pub chunk_size_file: NonZeroU64,
    /// Maximum number of files per send.
    pub max_file: u32,
    /// Maximum shareable file size in megabytes.
    pub max_size_share_file_v3: u64,
    pub restricted_ext_file: Vec<String>,
    pub big_file_domain_list: Vec<String>,
}

const DEFAULT_CHUNK_SIZE: NonZeroU64 = match NonZeroU64::new(3 * 1024 * 1024) {
    Some(size) => size,
    None => unreachable!(),
};

impl Default for ShareFileSettings {
    fn default() -> Self {
        Self {
            chunk_size_file: DEFAULT_CHUNK_SIZE,
            max_file: 10,
            max_size_share_file_v3: 1024,
            restricted_ext_file: Vec::new(),
            big_file_domain_list: Vec::new(),
        }
    }
}

impl ShareFileSettings {
    pub fn is_restricted(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.');
        self.restricted_ext_file.iter().any(|r| r.eq_ignore_ascii_case(ext))
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Immutable snapshot of one login.
#[derive(Clone)]
pub struct SessionContext {
    owner_id: String,
    key: SymmetricKey,
    directory: ServiceDirectory,
    protocol_type: u32,
    protocol_version: u32,
    extra_versions: HashMap<String, i64>,
    settings: FeatureSettings,
}

impl SessionContext {
    pub fn builder(owner_id: impl Into<String>, symmetric_key: impl Into<String>) -> SessionBuilder {
        SessionBuilder {
            owner_id: owner_id.into(),
            symmetric_key: symmetric_key.into(),
            directory: ServiceDirectory::new(),
            protocol_type: DEFAULT_PROTOCOL_TYPE,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            extra_versions: HashMap::new(),
            settings: FeatureSettings::default(),
        }
    }

    /// Restore a session from the login payload returned by the remote API.
    ///
    /// Reads `uid`, `zpw_enk`, `zpw_service_map_v3`, and optionally
    /// `zpw_ver`, `zpw_type`, `extra_ver` and `settings.features`.
    pub fn from_login_json(json: &str) -> Result<Self, SessionError> {
        let payload: LoginPayload = serde_json::from_str(json).map_err(|e| SessionError::Json(e.to_string()))?;

        if payload.uid.is_empty() {
            return Err(SessionError::Field {
                field: "uid",
                message: "must not be empty".to_string(),
            });
        }
        if payload.zpw_service_map_v3.is_empty() {
            return Err(SessionError::Field {
                field: "zpw_service_map_v3",
                message: "service directory is empty".to_string(),
            });
        }

        let extra_versions = payload
            .extra_ver
            .into_iter()
            .filter_map(|(name, value)| integer_version(&value).map(|v| (name, v)))
            .collect();

        SessionContext::builder(payload.uid, payload.zpw_enk)
            .directory(payload.zpw_service_map_v3)
            .protocol(payload.zpw_type, payload.zpw_ver)
            .extra_versions(extra_versions)
            .settings(payload.settings.features)
            .build()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    pub fn protocol_type(&self) -> u32 {
        self.protocol_type
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn extra_version(&self, feature: &str) -> Option<i64> {
        self.extra_versions.get(feature).copied()
    }

    pub fn settings(&self) -> &FeatureSettings {
        &self.settings
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("owner_id", &self.owner_id)
            .field("key", &self.key)
            .field("services", &self.directory.len())
            .field("protocol_type", &self.protocol_type)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

pub struct SessionBuilder {
    owner_id: String,
    symmetric_key: String,
    directory: ServiceDirectory,
    protocol_type: u32,
    protocol_version: u32,
    extra_versions: HashMap<String, i64>,
    settings: FeatureSettings,
}

impl SessionBuilder {
    pub fn directory(mut self, directory: ServiceDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn protocol(mut self, protocol_type: u32, protocol_version: u32) -> Self {
        self.protocol_type = protocol_type;
        self.protocol_version = protocol_version;
        self
    }

    pub fn extra_versions(mut self, versions: HashMap<String, i64>) -> Self {
        self.extra_versions = versions;
        self
    }

    pub fn settings(mut self, settings: FeatureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<SessionContext, SessionError> {
        let key = SymmetricKey::from_base64(&self.symmetric_key)?;
        Ok(SessionContext {
            owner_id: self.owner_id,
            key,
            directory: self.directory,
            protocol_type: self.protocol_type,
            protocol_version: self.protocol_version,
            extra_versions: self.extra_versions,
            settings: self.settings,
        })
    }
}

#[derive(Deserialize)]
struct LoginPayload {
    uid: String,
    zpw_enk: String,
    zpw_service_map_v3: ServiceDirectory,
    #[serde(default = "default_version")]
    zpw_ver: u32,
    #[serde(default = "default_type")]
    zpw_type: u32,
    #[serde(default)]
    extra_ver: HashMap<String, Value>,
    #[serde(default)]
    settings: LoginSettings,
}

#[derive(Default, Deserialize)]
struct LoginSettings {
    #[serde(default)]
    features: FeatureSettings,
}

fn default_version() -> u32 {
    DEFAULT_PROTOCOL_VERSION
}

fn default_type() -> u32 {
    DEFAULT_PROTOCOL_TYPE
}

/// `extra_ver` mixes integers, numeric strings and opaque blobs; only the
/// first two are versions.
fn integer_version(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// One cookie carried by the transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a cookie by name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value,
            None => self.cookies.push(Cookie { name, value }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie` header value, `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self.cookies.iter().map(|c| format!("{}={}", c.name, c.value)).collect();
        Some(pairs.join("; "))
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.cookies.iter().map(|c| c.name.as_str()).collect();
        f.debug_struct("CookieJar").field("names", &names).finish()
    }
}

/// Client identity attached to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub device_id: String,
    pub user_agent: String,
    #[serde(default)]
    pub cookie_jar: CookieJar,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Credentials {
    pub fn new(device_id: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            user_agent: user_agent.into(),
            cookie_jar: CookieJar::new(),
            language: default_language(),
        }
    }

    /// Fresh credentials with a random device identifier.
    pub fn with_random_device_id(user_agent: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), user_agent)
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn cookies(mut self, cookie_jar: CookieJar) -> Self {
        self.cookie_jar = cookie_jar;
        self
    }
}

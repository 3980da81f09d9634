//! Stand-in for the remote encrypted API, for integration tests.
//!
//! Implements the envelope independently of the client crate: its own
//! AES-CBC code, its own query handling. If the two drift apart the
//! integration tests fail.

use std::{collections::HashMap, sync::Arc};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const DEFAULT_SECRET_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZg==";
pub const DEVICE_ID_HEADER: &str = "x-zpw-device-id";

const IV: [u8; 16] = [0u8; 16];

#[derive(Clone)]
pub struct Secret {
    key: Arc<Vec<u8>>,
}

impl Secret {
    /// Decode a base64 key of 16, 24 or 32 bytes.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let key = STANDARD.decode(encoded.trim()).ok()?;
        matches!(key.len(), 16 | 24 | 32).then(|| Self { key: Arc::new(key) })
    }

    pub fn encrypt(&self, plaintext: &str) -> Option<String> {
        let data = plaintext.as_bytes();
        let sealed = match self.key.len() {
            16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(&self.key, &IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(&self.key, &IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            _ => cbc::Encryptor::<aes::Aes256>::new_from_slices(&self.key, &IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
        };
        Some(STANDARD.encode(sealed.ok()?))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let raw = STANDARD.decode(ciphertext).ok()?;
        let opened = match self.key.len() {
            16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(&self.key, &IV)
                .ok()?
                .decrypt_padded_vec_mut::<Pkcs7>(&raw),
            24 => cbc::Decryptor::<aes::Aes192>::new_from_slices(&self.key, &IV)
                .ok()?
                .decrypt_padded_vec_mut::<Pkcs7>(&raw),
            _ => cbc::Decryptor::<aes::Aes256>::new_from_slices(&self.key, &IV)
                .ok()?
                .decrypt_padded_vec_mut::<Pkcs7>(&raw),
        };
        String::from_utf8(opened.ok()?).ok()
    }
}

pub fn app(secret: Secret) -> Router {
    Router::new()
        .route("/api/echo", get(echo_get).post(echo_post))
        .route("/api/reject", get(reject).post(reject))
        .route("/api/crash", get(crash).post(crash))
        .route("/api/garbled", get(garbled))
        .route("/keepalive", get(keepalive))
        .with_state(secret)
}

pub async fn run(listener: TcpListener, secret: Secret) -> Result<(), std::io::Error> {
    axum::serve(listener, app(secret)).await
}

/// Outer envelope around an encrypted inner envelope.
fn encrypted_ok(secret: &Secret, data: Value) -> Json<Value> {
    let inner = json!({"error_code": 0, "error_message": "", "data": data});
    let Some(sealed) = secret.encrypt(&inner.to_string()) else {
        return failure(-3, "encryption failed");
    };
    Json(json!({
        "error_code": 0,
        "error_message": "",
        "data": sealed,
    }))
}

fn failure(code: i64, message: &str) -> Json<Value> {
    Json(json!({"error_code": code, "error_message": message}))
}

/// Returns the protocol markers, or the error envelope the real API uses
/// when they are missing.
fn markers(query: &HashMap<String, String>) -> Result<(i64, i64), Json<Value>> {
    let version = query.get("zpw_ver").and_then(|v| v.parse().ok());
    let kind = query.get("zpw_type").and_then(|v| v.parse().ok());
    match (version, kind) {
        (Some(version), Some(kind)) => Ok((version, kind)),
        _ => Err(failure(114, "missing protocol markers")),
    }
}

fn echo(
    secret: &Secret,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    ciphertext: Option<&String>,
) -> Json<Value> {
    let (version, kind) = match markers(query) {
        Ok(m) => m,
        Err(reply) => return reply,
    };
    let params = ciphertext
        .and_then(|ct| secret.decrypt(ct))
        .and_then(|text| serde_json::from_str::<Value>(&text).ok());
    let Some(params) = params else {
        return failure(-2, "invalid params");
    };
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();

    encrypted_ok(
        secret,
        json!({
            "params": params,
            "zpw_ver": version,
            "zpw_type": kind,
            "params_in_query": query.contains_key("params"),
            "nretry": query.get("nretry"),
            "user_agent": header("user-agent"),
            "device_id": header(DEVICE_ID_HEADER),
        }),
    )
}

async fn echo_get(
    State(secret): State<Secret>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    echo(&secret, &headers, &query, query.get("params"))
}

async fn echo_post(
    State(secret): State<Secret>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    echo(&secret, &headers, &query, form.get("params"))
}

async fn reject() -> Json<Value> {
    failure(-1, "Invalid message")
}

async fn crash() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn garbled() -> Json<Value> {
    Json(json!({"error_code": 0, "error_message": "", "data": "bm90IGEgYmxvY2s="}))
}

async fn keepalive(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    match markers(&query) {
        Ok(_) => Json(json!({"error_code": 0, "error_message": "", "data": {"alive": true}})),
        Err(reply) => reply,
    }
}

//! Parameter encryption and response decryption.
//!
//! # Design
//! The remote API encrypts every parameter object with AES-CBC under the
//! session key, PKCS#7 padded, with an all-zero IV, and ships the result as
//! standard base64. The IV is never transmitted, so it cannot be randomised
//! without breaking compatibility: two identical parameter objects encrypt to
//! identical ciphertexts under the same key. That leaks equality of payloads
//! to an observer and is a known limitation of the wire format.
//!
//! The key is the base64-decoded session key taken as-is; its length selects
//! AES-128, AES-192 or AES-256.

use std::borrow::Cow;
use std::fmt;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};
use serde::Serialize;
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{DecryptError, EncryptError, KeyError};

const BLOCK_SIZE: usize = 16;
const IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Accepts ciphertext with or without trailing `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded session key. Zeroed on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

impl SymmetricKey {
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = LENIENT_BASE64
            .decode(encoded.trim())
            .map_err(|e| KeyError::Base64(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyError> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self { bytes }),
            len => Err(KeyError::Length(len)),
        }
    }

    /// Key size in bits.
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        match self.bytes.len() {
            16 => seal_with::<cbc::Encryptor<aes::Aes128>>(&self.bytes, plaintext),
            24 => seal_with::<cbc::Encryptor<aes::Aes192>>(&self.bytes, plaintext),
            _ => seal_with::<cbc::Encryptor<aes::Aes256>>(&self.bytes, plaintext),
        }
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        match self.bytes.len() {
            16 => open_with::<cbc::Decryptor<aes::Aes128>>(&self.bytes, ciphertext),
            24 => open_with::<cbc::Decryptor<aes::Aes192>>(&self.bytes, ciphertext),
            _ => open_with::<cbc::Decryptor<aes::Aes256>>(&self.bytes, ciphertext),
        }
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey(AES-{}, <redacted>)", self.bits())
    }
}

fn seal_with<E: KeyIvInit + BlockEncryptMut>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
    let encryptor = E::new_from_slices(key, &IV).map_err(|e| EncryptError(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn open_with<D: KeyIvInit + BlockDecryptMut>(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let decryptor = D::new_from_slices(key, &IV).map_err(|e| DecryptError::Encoding(e.to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptError::Padding)
}

/// How a response body must be read. Chosen per endpoint, never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// The envelope's `data` field is ciphertext.
    #[default]
    Encrypted,
    /// The body is plain JSON (heartbeat and a few other calls).
    Unencrypted,
}

/// Serialize `params` to compact JSON and encrypt it under `key`.
///
/// Maps keep insertion order, so a `serde_json::Map` built field by field
/// produces the same text the remote API's own clients send.
pub fn encrypt<P: Serialize + ?Sized>(key: &SymmetricKey, params: &P) -> Result<String, EncryptError> {
    let json = serde_json::to_vec(params).map_err(|e| EncryptError(e.to_string()))?;
    let sealed = key.seal(&json)?;
    Ok(STANDARD.encode(sealed))
}

/// Decrypt a ciphertext string and parse the plaintext as JSON.
///
/// Accepts padded or unpadded base64, optionally percent-encoded. Refuses
/// input that is already JSON text.
pub fn decrypt(key: &SymmetricKey, ciphertext: &str) -> Result<Value, DecryptError> {
    let trimmed = ciphertext.trim();
    if looks_like_json(trimmed) {
        return Err(DecryptError::Plaintext);
    }

    let unescaped: Cow<'_, str> = if trimmed.contains('%') {
        urlencoding::decode(trimmed).map_err(|e| DecryptError::Encoding(e.to_string()))?
    } else {
        Cow::Borrowed(trimmed)
    };

    let raw = LENIENT_BASE64
        .decode(unescaped.as_bytes())
        .map_err(|e| DecryptError::Encoding(e.to_string()))?;
    if raw.is_empty() || raw.len() % BLOCK_SIZE != 0 {
        return Err(DecryptError::Length(raw.len()));
    }

    let plaintext = key.open(&raw)?;
    let text = String::from_utf8(plaintext).map_err(|_| DecryptError::Utf8)?;
    serde_json::from_str(&text).map_err(|e| DecryptError::Json(e.to_string()))
}

/// Encrypted-mode entry point; same as [`decrypt`].
pub fn parse_encrypted(key: &SymmetricKey, ciphertext: &str) -> Result<Value, DecryptError> {
    decrypt(key, ciphertext)
}

/// Unencrypted-mode entry point: the body is parsed as JSON directly.
pub fn parse_unencrypted(body: &str) -> Result<Value, DecryptError> {
    serde_json::from_str(body).map_err(|e| DecryptError::Json(e.to_string()))
}

fn looks_like_json(s: &str) -> bool {
    s.starts_with('{') || s.starts_with('[')
}

//! URL-safe base64 wire encoding for binary challenge fields.
//!
//! Challenge nonces and credential/user identifiers cross the wire as
//! URL-safe base64 without padding. They are decoded to raw bytes before
//! reaching the passkey capability and re-encoded on the way back out.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AcidError, Result};

/// Encode raw bytes as URL-safe base64 without padding.
pub fn encode(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

/// Decode a URL-safe base64 string (padding tolerated) to raw bytes.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(text.trim_end_matches('='))
        .map_err(|e| AcidError::Encoding(format!("Invalid base64url field: {e}")))
}

/// Binary wire field carried as URL-safe base64 text.
///
/// Deserializing decodes the text to raw bytes; serializing re-encodes.
/// Fields of this type hold decoded bytes in memory, so capability providers
/// receive binary data and the transport always sees text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Base64UrlData(pub Vec<u8>);

impl Base64UrlData {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64UrlData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Base64UrlData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Base64UrlData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64UrlData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map(Base64UrlData).map_err(serde::de::Error::custom)
    }
}

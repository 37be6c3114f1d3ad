//! Content fingerprints for payloads that may or may not arrive base64 encoded.
//!
//! A payload is hashed in its decoded form whenever it decodes as standard
//! base64, so the raw text and its encoding share one fingerprint. Line breaks
//! are skipped while decoding, so wrapped output of `base64(1)` counts as
//! encoded. Malformed base64 is not an error: it simply means "not encoded".

use std::fmt;

use base64::{
    alphabet,
    engine::general_purpose::{GeneralPurpose, PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Standard alphabet with padding; non-zero trailing bits are accepted.
const STANDARD: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, PAD.with_decode_allow_trailing_bits(true));

/// Hex encoded SHA-1 digest of a payload's decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ContentFingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

pub fn fingerprint(payload: &str) -> ContentFingerprint {
    let digest = match decode(payload) {
        Some(bytes) => Sha1::digest(&bytes),
        None => Sha1::digest(payload.as_bytes()),
    };
    ContentFingerprint(hex::encode(digest))
}

/// Base64 encode `payload` unless it already decodes as base64.
pub fn ensure_encoded(payload: &str) -> String {
    if is_encoded(payload) {
        payload.to_string()
    } else {
        STANDARD.encode(payload.as_bytes())
    }
}

pub fn is_encoded(payload: &str) -> bool {
    decode(payload).is_some()
}

fn decode(payload: &str) -> Option<Vec<u8>> {
    let unwrapped: Vec<u8> = payload
        .bytes()
        .filter(|b| !matches!(b, b'\r' | b'\n'))
        .collect();
    STANDARD.decode(unwrapped).ok()
}

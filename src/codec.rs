//! The vault record codec: canonical JSON for verification/sync digests,
//! and base64 framing for binary fields on disk and over the wire.
//!
//! Canonical serialization pins the exact byte sequence fed to SHA-256 for
//! the verification token and the sync integrity envelope: JSON with keys
//! sorted and no whitespace, produced by round-tripping through
//! `serde_json::Value` (whose object map is a `BTreeMap` in this crate,
//! since the `preserve_order` feature is never enabled).

use crate::error::Result;
use crate::models::Entry;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Encodes the entry list the way the verification token and sync digest
/// pin it: JSON with sorted keys, no whitespace, in the engine's own
/// insertion order (callers must not sort or reorder `entries` themselves).
pub fn canonical_entries_json(entries: &[Entry]) -> Result<Vec<u8>> {
  let value = serde_json::to_value(entries)?;
  Ok(serde_json::to_vec(&value)?)
}

/// `base64(bytes) -> String` using the standard alphabet, no line wraps.
pub fn encode(bytes: &[u8]) -> String {
  BASE64.encode(bytes)
}

/// Decodes a standard-alphabet base64 string.
pub fn decode(s: &str) -> Result<Vec<u8>> {
  BASE64.decode(s).map_err(|e| {
    crate::error::OrganizerError::InvalidRequest(format!("invalid base64: {e}"))
  })
}

/// `serde(with = "crate::codec::base64_vec")` for `Vec<u8>` fields.
pub mod base64_vec {
  use super::BASE64;
  use base64::Engine;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(d)?;
    BASE64.decode(raw.as_bytes()).map_err(serde::de::Error::custom)
  }
}

/// `serde(with = "crate::codec::base64_iv")` for 12-byte nonce fields.
pub mod base64_iv {
  use super::BASE64;
  use base64::Engine;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &[u8; 12], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 12], D::Error> {
    let raw = String::deserialize(d)?;
    let bytes = BASE64.decode(raw.as_bytes()).map_err(serde::de::Error::custom)?;
    bytes.try_into().map_err(|_| serde::de::Error::custom("expected 12 bytes"))
  }
}

/// `serde(with = "crate::codec::base64_tag")` for 16-byte AEAD tag fields.
pub mod base64_tag {
  use super::BASE64;
  use base64::Engine;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &[u8; 16], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 16], D::Error> {
    let raw = String::deserialize(d)?;
    let bytes = BASE64.decode(raw.as_bytes()).map_err(serde::de::Error::custom)?;
    bytes.try_into().map_err(|_| serde::de::Error::custom("expected 16 bytes"))
  }
}

/// `serde(with = "crate::codec::base64_salt")` for the 32-byte vault salt.
pub mod base64_salt {
  use super::BASE64;
  use base64::Engine;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
    let raw = String::deserialize(d)?;
    let bytes = BASE64.decode(raw.as_bytes()).map_err(serde::de::Error::custom)?;
    bytes.try_into().map_err(|_| serde::de::Error::custom("expected 32 bytes"))
  }
}

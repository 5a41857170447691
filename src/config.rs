//! Crate configuration: recognized options, defaults, and an
//! unknown-key-rejecting constructor for loading config from a map (e.g.
//! parsed from a TOML/JSON file or CLI flags upstream of this crate).

use crate::crypto::pbkdf2::{DEFAULT_ITERATIONS, MIN_ITERATIONS};
use crate::error::{OrganizerError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Recognized configuration keys. Unknown keys passed to
/// [`Config::from_map`] are rejected rather than silently ignored.
const RECOGNIZED_KEYS: &[&str] =
  &["pbkdf2_iterations", "srp_group", "sync_base_url", "sync_timeout_ms", "key_store_backend"];

/// Runtime configuration for the vault engine and sync reconciler.
#[derive(Clone, Debug)]
pub struct Config {
  pub pbkdf2_iterations: u32,
  /// Fixed to the 2048-bit MODP group; not presently variable, but named
  /// here so a future group change has a single place to land.
  pub srp_group: &'static str,
  pub sync_base_url: String,
  pub sync_timeout: Duration,
  pub key_store_backend: KeyStoreBackend,
}

/// Which [`crate::keystore::KeyStore`] implementation to construct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStoreBackend {
  Memory,
  File(String),
}

impl Default for Config {
  fn default() -> Self {
    Self {
      pbkdf2_iterations: DEFAULT_ITERATIONS,
      srp_group: "rfc5054-2048",
      sync_base_url: "http://localhost:3000".to_string(),
      sync_timeout: Duration::from_millis(10_000),
      key_store_backend: KeyStoreBackend::Memory,
    }
  }
}

impl Config {
  /// Builds a `Config` from a string-keyed map, as would be parsed from a
  /// config file. Rejects unknown keys and out-of-range values.
  pub fn from_map(raw: &HashMap<String, String>) -> Result<Self> {
    for key in raw.keys() {
      if !RECOGNIZED_KEYS.contains(&key.as_str()) {
        return Err(OrganizerError::InvalidRequest(format!("unknown config option: {key}")));
      }
    }

    let mut config = Config::default();

    if let Some(v) = raw.get("pbkdf2_iterations") {
      let iterations: u32 = v
        .parse()
        .map_err(|_| OrganizerError::InvalidRequest(format!("invalid pbkdf2_iterations: {v}")))?;
      if iterations < MIN_ITERATIONS {
        return Err(OrganizerError::InvalidRequest(format!(
          "pbkdf2_iterations {iterations} is below the minimum of {MIN_ITERATIONS}"
        )));
      }
      config.pbkdf2_iterations = iterations;
    }

    if let Some(v) = raw.get("srp_group") {
      if v != "rfc5054-2048" {
        return Err(OrganizerError::InvalidRequest(format!(
          "unsupported srp_group: {v} (only rfc5054-2048 is implemented)"
        )));
      }
    }

    if let Some(v) = raw.get("sync_base_url") {
      config.sync_base_url = v.clone();
    }

    if let Some(v) = raw.get("sync_timeout_ms") {
      let ms: u64 = v
        .parse()
        .map_err(|_| OrganizerError::InvalidRequest(format!("invalid sync_timeout_ms: {v}")))?;
      config.sync_timeout = Duration::from_millis(ms);
    }

    if let Some(v) = raw.get("key_store_backend") {
      config.key_store_backend = match v.as_str() {
        "memory" => KeyStoreBackend::Memory,
        other => KeyStoreBackend::File(other.to_string()),
      };
    }

    Ok(config)
  }
}

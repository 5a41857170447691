//! Core data structures for the vault: entries, the vault document itself,
//! the device secret, and the server-side SRP records.
//!
//! # Security
//!
//! - Decrypted secrets ([`DecryptedEntry`], [`DeviceSecret`]) implement
//!   [`Zeroize`] and clear themselves on drop.
//! - At-rest [`Entry`] fields hold ciphertext, not cleartext; they are still
//!   zeroized on drop as defense in depth against a use-after-free or a
//!   stale heap page leaking AEAD tags and nonces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use zeroize::{Zeroize, Zeroizing};

/// Filename for the encrypted vault document.
pub const VAULT_FILENAME: &str = "vault.json";

/// Current vault document format version.
pub const VAULT_FORMAT_VERSION: u32 = 1;

/// Length of the vault salt (32 bytes).
pub const SALT_LEN: usize = 32;

/// Length of the device secret (32 bytes).
pub const DEVICE_SECRET_LEN: usize = 32;

/// Length of an AES-256-GCM nonce (96 bits).
pub const IV_LEN: usize = 12;

/// Length of an AES-256-GCM tag (128 bits).
pub const TAG_LEN: usize = 16;

/// How often the inactivity monitor checks for timeout.
pub const INACTIVITY_POLL_SECS: u64 = 10;

/// Auto-lock timeout duration (5 minutes of inactivity).
pub const INACTIVITY_TIMEOUT_SECS: u64 = 300;

/// Maximum failed unlock attempts before lockout.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Duration of lockout after exceeding failed attempts (30 seconds).
pub const LOCKOUT_DURATION_SECS: u64 = 30;

/// A single AEAD envelope: ciphertext, nonce, and tag, all required to
/// decrypt. Used for both the username and the password of an [`Entry`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
  #[serde(with = "crate::codec::base64_vec")]
  pub ciphertext: Vec<u8>,
  #[serde(with = "crate::codec::base64_iv")]
  pub iv: [u8; IV_LEN],
  #[serde(with = "crate::codec::base64_tag")]
  pub tag: [u8; TAG_LEN],
}

impl Zeroize for Envelope {
  fn zeroize(&mut self) {
    self.ciphertext.zeroize();
    self.iv.zeroize();
    self.tag.zeroize();
  }
}

/// A password entry as persisted on disk: cleartext metadata plus two
/// independently-nonced AEAD envelopes for username and password.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
  /// Monotone identifier, assigned as `(max existing id) + 1`, or 0 when
  /// the vault is empty. Not reused by subsequent adds unless a
  /// higher-numbered entry holding it is removed first.
  pub id: u64,
  pub site: String,
  pub category: String,
  pub note: String,
  pub favorite: bool,
  pub created: DateTime<Utc>,
  pub updated: DateTime<Utc>,
  pub username: Envelope,
  pub password: Envelope,
}

impl Zeroize for Entry {
  fn zeroize(&mut self) {
    self.site.zeroize();
    self.category.zeroize();
    self.note.zeroize();
    self.username.zeroize();
    self.password.zeroize();
  }
}

impl Drop for Entry {
  fn drop(&mut self) {
    self.zeroize();
  }
}

/// An entry with its secrets decrypted, as returned by `list()`. Never
/// persisted; exists only for the duration the caller holds it.
#[derive(Clone, Debug)]
pub struct DecryptedEntry {
  pub id: u64,
  pub site: String,
  pub category: String,
  pub note: String,
  pub favorite: bool,
  pub created: DateTime<Utc>,
  pub updated: DateTime<Utc>,
  pub username: String,
  pub password: String,
}

impl Zeroize for DecryptedEntry {
  fn zeroize(&mut self) {
    self.site.zeroize();
    self.category.zeroize();
    self.note.zeroize();
    self.username.zeroize();
    self.password.zeroize();
  }
}

impl Drop for DecryptedEntry {
  fn drop(&mut self) {
    self.zeroize();
  }
}

/// The vault document as persisted on disk and exchanged with the sync
/// transport. `verification_token` is an AEAD envelope whose plaintext is
/// `sha256(canonical(entries))`, used at `open()` to detect a wrong master
/// password without decrypting any entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
  pub user: String,
  pub version: u32,
  #[serde(with = "crate::codec::base64_salt")]
  pub salt: [u8; SALT_LEN],
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub verification_token: Envelope,
  pub entries: Vec<Entry>,
}

impl Vault {
  /// The id to assign to the next entry added to this vault.
  pub fn next_id(&self) -> u64 {
    self.entries.iter().map(|e| e.id).max().map(|m| m + 1).unwrap_or(0)
  }
}

/// A 32-byte high-entropy value generated once per user at vault creation
/// and persisted in a [`crate::keystore::KeyStore`]. Mixed with the master
/// password during key derivation; never transmitted to the sync peer.
pub struct DeviceSecret(pub Zeroizing<[u8; DEVICE_SECRET_LEN]>);

impl DeviceSecret {
  pub fn new(bytes: [u8; DEVICE_SECRET_LEN]) -> Self {
    DeviceSecret(Zeroizing::new(bytes))
  }

  pub fn generate() -> Self {
    use rand::RngCore;
    let mut bytes = [0u8; DEVICE_SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    DeviceSecret::new(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; DEVICE_SECRET_LEN] {
    &self.0
  }
}

impl Clone for DeviceSecret {
  fn clone(&self) -> Self {
    DeviceSecret::new(*self.0)
  }
}

/// Server-side record of a registered user's SRP credentials. The server
/// never stores the master password, only the verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SrpRecord {
  pub user: String,
  pub salt_hex: String,
  pub verifier_hex: String,
}

/// Server-side transient state for one authentication attempt. Created at
/// `/login/init`, deleted on `/login/verify` success or failure — never
/// reused across attempts.
pub struct SrpSession {
  pub user: String,
  pub server_ephemeral: crate::srp::ServerEphemeral,
  pub salt_hex: String,
  pub verifier_hex: String,
}

/// An active vault session holding the derived vault key `K`. The master
/// password is never stored; only the derived key lives in memory, wrapped
/// for zeroization on drop.
#[derive(Clone)]
pub struct VaultSession {
  pub salt: [u8; SALT_LEN],
  pub key: Zeroizing<[u8; 32]>,
}

impl VaultSession {
  pub fn new(salt: [u8; SALT_LEN], key_bytes: [u8; 32]) -> Self {
    Self { salt, key: Zeroizing::new(key_bytes) }
  }

  pub fn key_bytes(&self) -> &[u8; 32] {
    &self.key
  }
}

/// Tracks failed unlock attempts for rate limiting. After
/// [`MAX_FAILED_ATTEMPTS`], enforces a cooldown period.
#[derive(Clone, Debug, Default)]
pub struct FailedAttemptTracker {
  pub count: u32,
  pub locked_until: Option<Instant>,
}

impl FailedAttemptTracker {
  /// Records a failed unlock attempt. Returns the lockout duration in
  /// seconds if the threshold was just exceeded.
  pub fn record_failure(&mut self) -> Option<u64> {
    self.count += 1;
    if self.count >= MAX_FAILED_ATTEMPTS {
      self.locked_until = Some(Instant::now() + std::time::Duration::from_secs(LOCKOUT_DURATION_SECS));
      Some(LOCKOUT_DURATION_SECS)
    } else {
      None
    }
  }

  /// Returns remaining lockout seconds if currently locked out; resets the
  /// tracker once the lockout has expired.
  pub fn check_lockout(&mut self) -> Option<u64> {
    if let Some(until) = self.locked_until {
      let now = Instant::now();
      if now < until {
        return Some(until.duration_since(now).as_secs());
      }
      self.count = 0;
      self.locked_until = None;
    }
    None
  }

  pub fn reset(&mut self) {
    self.count = 0;
    self.locked_until = None;
  }
}

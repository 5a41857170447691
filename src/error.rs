//! The error taxonomy for the vault engine, cryptographic primitives, and
//! sync reconciler.
//!
//! Every fallible operation in this crate returns [`OrganizerError`]. The
//! variants mirror the taxonomy the engine is required to preserve:
//! authentication failures must never be merged with generic ones, so a
//! caller can tell silent corruption (`IntegrityFail`) apart from
//! adversarial tampering or a wrong password (`AuthFail`/`WrongPassword`).
//!
//! `WrongPassword` and `AuthFail` carry no detail about which cryptographic
//! step failed; only the vault engine's surface ever produces
//! `WrongPassword`, translating an opaque `AuthFail` from the crypto layer.

use thiserror::Error;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Errors surfaced by the vault engine, crypto primitives, SRP exchange,
/// and sync reconciler.
#[derive(Debug, Error)]
pub enum OrganizerError {
  /// AEAD tag verification failed, or an SRP proof did not match.
  ///
  /// Carries no further detail: revealing *why* an authenticated payload
  /// failed to authenticate would leak an oracle to an attacker.
  #[error("authentication failed")]
  AuthFail,

  /// Master password verification failed at vault open or password change.
  #[error("wrong master password")]
  WrongPassword,

  /// A decoded payload did not match its separately stored digest (sync
  /// envelope tamper detection).
  #[error("integrity check failed: {0}")]
  IntegrityFail(String),

  /// No vault on the server, or no SRP record for a user.
  #[error("not found: {0}")]
  NotFound(String),

  /// Malformed input: bad base64, wrong field size, a hex-parse error, an
  /// out-of-range SRP public value.
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The operation requires an unlocked vault or a held session token and
  /// none is present.
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// A network or server error that does not imply corruption.
  #[error("sync failed: {0}")]
  SyncFailed(String),

  /// An assertion violation. Forces the caller to re-open the vault.
  #[error("internal error: {0}")]
  Internal(String),
}

impl OrganizerError {
  /// True for the two error kinds that must never mutate on-disk state.
  pub fn is_read_only_failure(&self) -> bool {
    matches!(
      self,
      OrganizerError::AuthFail
        | OrganizerError::WrongPassword
        | OrganizerError::IntegrityFail(_)
        | OrganizerError::SyncFailed(_)
    )
  }
}

impl From<std::io::Error> for OrganizerError {
  fn from(e: std::io::Error) -> Self {
    OrganizerError::Internal(format!("io: {e}"))
  }
}

impl From<serde_json::Error> for OrganizerError {
  fn from(e: serde_json::Error) -> Self {
    OrganizerError::InvalidRequest(format!("json: {e}"))
  }
}

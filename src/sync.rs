//! The sync reconciler: wraps the vault's entries in a transport-specific
//! envelope, exchanges it with a remote peer through a [`SyncTransport`],
//! and reconciles by strict last-writer-wins on `updated_at`.
//!
//! The wire document differs from the on-disk [`crate::models::Vault`]:
//! entries are serialized once and sealed into a single AEAD envelope
//! (`vault_envelope`), and a second envelope (`verification_envelope`)
//! carries the SHA-256 digest of that first envelope, so a downloader can
//! detect tampering before ever deserializing the entries it decrypts.
//! `salt` travels with the document (a new device needs it to derive `K`
//! from the master password and device secret); the device secret itself
//! never does — see the "device secret portability" discussion in
//! DESIGN.md.

use crate::codec;
use crate::crypto::sha256::sha256;
use crate::error::{OrganizerError, Result};
use crate::models::{Entry, Envelope, SALT_LEN};
use crate::vault::VaultEngine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// The sync-wire vault document: `GET`/`POST /vault` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncDocument {
  pub user: String,
  pub version: u32,
  #[serde(with = "crate::codec::base64_salt")]
  pub salt: [u8; SALT_LEN],
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub vault_envelope: Envelope,
  pub verification_envelope: Envelope,
}

/// What a sync attempt actually did, surfaced to the caller for logging —
/// sync success is observable separately from local mutation success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
  /// No bearer token held; the reconciler no-oped.
  NoToken,
  /// No remote vault existed yet; the local vault was pushed.
  PushedInitial,
  /// Remote was newer; local state was replaced from the download.
  Downloaded,
  /// Local was newer; local state was pushed to the remote.
  Uploaded,
  /// Both sides agree on `updated_at`; nothing to do.
  UpToDate,
}

/// Digest bound into the verification envelope: `SHA-256(iv ‖ ciphertext ‖
/// tag)` of the vault envelope. Client and server only need to agree on
/// *some* digest of the inner envelope; this crate pins this byte order
/// as that discipline (see DESIGN.md).
fn envelope_digest(envelope: &Envelope) -> [u8; 32] {
  let mut buf = Vec::with_capacity(envelope.iv.len() + envelope.ciphertext.len() + envelope.tag.len());
  buf.extend_from_slice(&envelope.iv);
  buf.extend_from_slice(&envelope.ciphertext);
  buf.extend_from_slice(&envelope.tag);
  sha256(&buf)
}

/// The outbound half of the sync REST surface: fetching and
/// storing the encrypted document at `/vault`. Implementors need not know
/// about SRP or the `/register`/`/login/*` endpoints — those are modeled
/// separately by [`crate::server::AuthTransport`] — only the bearer token
/// this crate was handed after a successful login.
pub trait SyncTransport: Send + Sync {
  /// `GET /vault`. `Ok(None)` models the server's `404` (no vault yet).
  fn get_vault(&self, user: &str, token: &str) -> Result<Option<SyncDocument>>;

  /// `POST /vault`. Returns the server-echoed timestamp, which the client
  /// does not rely on for correctness.
  fn put_vault(&self, user: &str, token: &str, doc: &SyncDocument) -> Result<DateTime<Utc>>;
}

/// An in-process [`SyncTransport`] backed by a shared map, for tests and
/// for single-process deployments with no real remote peer. Used by this
/// crate's own test suite in place of the `http-sync` feature's
/// `reqwest`-based client.
#[derive(Default)]
pub struct InMemoryTransport {
  documents: std::sync::Mutex<std::collections::HashMap<String, SyncDocument>>,
}

impl InMemoryTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Test/ops hook: flips one byte inside a stored `vault_ciphertext`, to
  /// exercise the tamper-rejection path without a real network intercept.
  pub fn corrupt_stored_ciphertext(&self, user: &str) {
    if let Ok(mut docs) = self.documents.lock() {
      if let Some(doc) = docs.get_mut(user) {
        if let Some(byte) = doc.vault_envelope.ciphertext.first_mut() {
          *byte ^= 0x01;
        }
      }
    }
  }
}

impl SyncTransport for InMemoryTransport {
  fn get_vault(&self, user: &str, _token: &str) -> Result<Option<SyncDocument>> {
    let docs = self
      .documents
      .lock()
      .map_err(|_| OrganizerError::Internal("sync transport mutex poisoned".into()))?;
    Ok(docs.get(user).cloned())
  }

  fn put_vault(&self, user: &str, _token: &str, doc: &SyncDocument) -> Result<DateTime<Utc>> {
    let mut docs = self
      .documents
      .lock()
      .map_err(|_| OrganizerError::Internal("sync transport mutex poisoned".into()))?;
    docs.insert(user.to_string(), doc.clone());
    Ok(doc.updated_at)
  }
}

fn build_document(engine: &VaultEngine) -> Result<SyncDocument> {
  let key = engine.key();
  let entries_json = codec::canonical_entries_json(engine.entries())?;
  let vault_envelope = crate::vault::seal(&key, &entries_json)?;
  let verification_envelope = crate::vault::seal(&key, &envelope_digest(&vault_envelope))?;

  Ok(SyncDocument {
    user: engine.vault().user.clone(),
    version: engine.vault().version,
    salt: engine.vault().salt,
    created_at: engine.vault().created_at,
    updated_at: engine.vault().updated_at,
    vault_envelope,
    verification_envelope,
  })
}

/// Decrypts and integrity-checks a downloaded [`SyncDocument`], returning
/// its entries. Aborts with `IntegrityFail` on a digest mismatch and with
/// whatever AEAD error the envelope decrypt produced otherwise — neither
/// case may leak partial entries to the caller or mutate local state.
fn open_document(engine: &VaultEngine, doc: &SyncDocument) -> Result<Vec<Entry>> {
  let key = engine.key();

  let verification_plaintext = crate::vault::open_envelope(&key, &doc.verification_envelope)?;
  let expected = envelope_digest(&doc.vault_envelope);
  if verification_plaintext.ct_eq(&expected).unwrap_u8() != 1 {
    tracing::warn!("sync integrity check failed: verification envelope does not match vault envelope digest");
    return Err(OrganizerError::IntegrityFail(
      "sync verification envelope does not match vault envelope digest".into(),
    ));
  }

  let entries_json = crate::vault::open_envelope(&key, &doc.vault_envelope)?;
  serde_json::from_slice(&entries_json)
    .map_err(|e| OrganizerError::IntegrityFail(format!("sync entries did not decode: {e}")))
}

/// Runs one reconciliation pass: no-ops with no token,
/// pushes to an empty remote, and otherwise downloads or uploads by
/// comparing `updated_at`. Local persistence of a mutation always happens
/// before this is called — sync success is a separate, later event.
#[tracing::instrument(skip(engine, transport, token), fields(user))]
pub fn sync(
  engine: &mut VaultEngine,
  transport: &dyn SyncTransport,
  token: Option<&str>,
) -> Result<SyncOutcome> {
  let token = match token {
    Some(t) => t,
    None => {
      tracing::debug!("sync skipped: no bearer token held");
      return Ok(SyncOutcome::NoToken);
    }
  };

  let user = engine.vault().user.clone();
  tracing::Span::current().record("user", &tracing::field::display(&user));

  let remote = transport.get_vault(&user, token).map_err(|e| match e {
    OrganizerError::IntegrityFail(_) => e,
    other => OrganizerError::SyncFailed(other.to_string()),
  })?;

  let remote = match remote {
    None => {
      let doc = build_document(engine)?;
      transport
        .put_vault(&user, token, &doc)
        .map_err(|e| OrganizerError::SyncFailed(e.to_string()))?;
      tracing::debug!("sync: pushed initial vault");
      return Ok(SyncOutcome::PushedInitial);
    }
    Some(doc) => doc,
  };

  let local_updated_at = engine.vault().updated_at;

  if remote.updated_at > local_updated_at {
    let entries = open_document(engine, &remote)?;
    engine.adopt_remote_state(entries, remote.salt, remote.created_at, remote.updated_at)?;
    tracing::debug!("sync: downloaded newer remote state");
    Ok(SyncOutcome::Downloaded)
  } else if remote.updated_at < local_updated_at {
    let doc = build_document(engine)?;
    transport
      .put_vault(&user, token, &doc)
      .map_err(|e| OrganizerError::SyncFailed(e.to_string()))?;
    tracing::debug!("sync: uploaded newer local state");
    Ok(SyncOutcome::Uploaded)
  } else {
    tracing::debug!("sync: already up to date");
    Ok(SyncOutcome::UpToDate)
  }
}

/// A `reqwest`-backed [`SyncTransport`] against a real server implementing
/// the `/vault` REST surface. Gated behind the `http-sync`
/// feature; the default test suite exercises [`InMemoryTransport`]
/// instead (see the optional-feature pattern in Cargo.toml).
#[cfg(feature = "http-sync")]
pub mod http {
  use super::*;

  pub struct HttpSyncTransport {
    client: reqwest::blocking::Client,
    base_url: String,
  }

  impl HttpSyncTransport {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
      let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OrganizerError::SyncFailed(format!("building http client: {e}")))?;
      Ok(Self { client, base_url: base_url.into() })
    }
  }

  impl SyncTransport for HttpSyncTransport {
    fn get_vault(&self, _user: &str, token: &str) -> Result<Option<SyncDocument>> {
      let resp = self
        .client
        .get(format!("{}/vault", self.base_url))
        .bearer_auth(token)
        .send()
        .map_err(|e| OrganizerError::SyncFailed(format!("GET /vault: {e}")))?;

      if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
      }
      if !resp.status().is_success() {
        return Err(OrganizerError::SyncFailed(format!("GET /vault: HTTP {}", resp.status())));
      }

      let doc = resp
        .json::<SyncDocument>()
        .map_err(|e| OrganizerError::SyncFailed(format!("GET /vault: bad body: {e}")))?;
      Ok(Some(doc))
    }

    fn put_vault(&self, _user: &str, token: &str, doc: &SyncDocument) -> Result<DateTime<Utc>> {
      #[derive(Deserialize)]
      struct PutVaultResponse {
        #[allow(dead_code)]
        success: bool,
        timestamp: DateTime<Utc>,
      }

      let resp = self
        .client
        .post(format!("{}/vault", self.base_url))
        .bearer_auth(token)
        .json(doc)
        .send()
        .map_err(|e| OrganizerError::SyncFailed(format!("POST /vault: {e}")))?;

      if !resp.status().is_success() {
        return Err(OrganizerError::SyncFailed(format!("POST /vault: HTTP {}", resp.status())));
      }

      let body = resp
        .json::<PutVaultResponse>()
        .map_err(|e| OrganizerError::SyncFailed(format!("POST /vault: bad body: {e}")))?;
      Ok(body.timestamp)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::keystore::{KeyStore, MemoryKeyStore};
  use crate::vault::OpenVaultRegistry;
  use std::fs;
  use std::path::PathBuf;
  use std::sync::Arc;

  fn temp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("organizer-core-sync-test-{name}-{}.json", std::process::id()));
    let _ = fs::remove_file(&p);
    p
  }

  #[test]
  fn first_sync_with_no_remote_pushes_local() {
    let path = temp_path("push-initial");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let mut engine =
      VaultEngine::create(&path, &registry, keystore, Config::default(), "alice", b"hunter2").unwrap();
    engine.add("github.com", "me", "p@ss", "", "dev", false).unwrap();

    let transport = InMemoryTransport::new();
    let outcome = sync(&mut engine, &transport, Some("tok")).unwrap();
    assert_eq!(outcome, SyncOutcome::PushedInitial);

    let stored = transport.get_vault("alice", "tok").unwrap().unwrap();
    assert_eq!(stored.user, "alice");

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn no_token_is_a_noop() {
    let path = temp_path("no-token");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let mut engine =
      VaultEngine::create(&path, &registry, keystore, Config::default(), "bob", b"hunter2").unwrap();

    let transport = InMemoryTransport::new();
    let outcome = sync(&mut engine, &transport, None).unwrap();
    assert_eq!(outcome, SyncOutcome::NoToken);

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn newer_remote_replaces_local_entries() {
    let path_a = temp_path("device-a");
    let path_b = temp_path("device-b");
    let registry_a = OpenVaultRegistry::new();
    let registry_b = OpenVaultRegistry::new();
    // Both "devices" share a keystore, standing in for the device secret
    // having been obtained out-of-band.
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let transport = InMemoryTransport::new();

    let mut device_a = VaultEngine::create(
      &path_a,
      &registry_a,
      keystore.clone(),
      Config::default(),
      "carol",
      b"hunter2",
    )
    .unwrap();
    // Push the empty vault first so device B can open a copy of the same
    // document before device A's later mutation.
    sync(&mut device_a, &transport, Some("tok")).unwrap();
    fs::copy(&path_a, &path_b).unwrap();
    let mut device_b = VaultEngine::open(
      &path_b,
      &registry_b,
      keystore,
      Config::default(),
      "carol",
      b"hunter2",
    )
    .unwrap();

    device_a.add("github.com", "carol", "p@ss-1", "", "dev", false).unwrap();
    let outcome_a = sync(&mut device_a, &transport, Some("tok")).unwrap();
    assert_eq!(outcome_a, SyncOutcome::Uploaded);

    let outcome_b = sync(&mut device_b, &transport, Some("tok")).unwrap();
    assert_eq!(outcome_b, SyncOutcome::Downloaded);
    assert_eq!(device_b.list().unwrap().len(), 1);
    assert_eq!(device_b.list().unwrap()[0].password, "p@ss-1");

    let _ = fs::remove_file(&path_a);
    let _ = fs::remove_file(&path_b);
  }

  #[test]
  fn tampered_remote_ciphertext_is_rejected_and_local_state_is_kept() {
    let path = temp_path("tamper");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let mut engine =
      VaultEngine::create(&path, &registry, keystore, Config::default(), "dave", b"hunter2").unwrap();
    engine.add("bank.com", "dave", "$ecret", "", "finance", true).unwrap();

    let transport = InMemoryTransport::new();
    sync(&mut engine, &transport, Some("tok")).unwrap();

    // A second, later local mutation makes the remote "older" so the next
    // sync would normally push; instead we force a download path by
    // tampering with the stored ciphertext and rewinding local state is
    // unnecessary — we only need remote.updated_at > local.updated_at with
    // a corrupted payload to hit the integrity-check path.
    transport.corrupt_stored_ciphertext("dave");

    // Make the remote look newer than local so the reconciler takes the
    // download path and hits the tampered bytes.
    {
      let mut docs = transport.documents.lock().unwrap();
      let doc = docs.get_mut("dave").unwrap();
      doc.updated_at = doc.updated_at + chrono::Duration::seconds(10);
    }

    let before = engine.list().unwrap();
    let result = sync(&mut engine, &transport, Some("tok"));
    assert!(matches!(result, Err(OrganizerError::IntegrityFail(_))));

    let after = engine.list().unwrap();
    assert_eq!(before.len(), after.len());
    assert_eq!(before[0].password, after[0].password);

    let _ = fs::remove_file(&path);
  }
}

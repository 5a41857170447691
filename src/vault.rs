//! The vault engine: `create`, `open`, `list`, `add`, `edit`, `remove`, and
//! `change_master_password`, plus the atomic on-disk persistence and the
//! concurrent-open rejection registry the concurrency model requires.
//!
//! # Security
//!
//! - The vault key `K` is derived by PBKDF2-HMAC-SHA256 from
//!   `master_password ‖ device_secret` and never persisted.
//! - Every mutation re-seals the verification token and persists via a
//!   temp-file-then-rename so a crash mid-write cannot corrupt the
//!   previous, still-valid vault.
//! - Only one open vault engine may exist per user at a time, enforced by
//!   [`OpenVaultRegistry`].

use crate::codec;
use crate::config::Config;
use crate::crypto::gcm;
use crate::crypto::pbkdf2;
use crate::crypto::sha256::sha256;
use crate::error::{OrganizerError, Result};
use crate::keystore::KeyStore;
use crate::models::{
  DecryptedEntry, DeviceSecret, Entry, Envelope, FailedAttemptTracker, Vault, VaultSession,
  INACTIVITY_TIMEOUT_SECS, IV_LEN, SALT_LEN, VAULT_FORMAT_VERSION,
};
use chrono::Utc;
use rand::RngCore;
use std::cell::Cell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use subtle::ConstantTimeEq;

/// Tracks which users currently have an open vault engine (the
/// single-mutator-per-user rule from the concurrency model) and, per
/// user, a count of consecutive failed unlock attempts. The latter has to
/// live here rather than on [`VaultEngine`] — a failed `open()` never
/// produces an engine instance to hold it on.
#[derive(Default)]
pub struct OpenVaultRegistry {
  open: Mutex<HashSet<String>>,
  failed_attempts: Mutex<std::collections::HashMap<String, FailedAttemptTracker>>,
}

impl OpenVaultRegistry {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  fn acquire(self: &Arc<Self>, user: &str) -> Result<OpenGuard> {
    let mut open = self.open.lock().map_err(|_| {
      OrganizerError::Internal("open-vault registry mutex poisoned".into())
    })?;
    if !open.insert(user.to_string()) {
      return Err(OrganizerError::InvalidState(format!(
        "vault for user '{user}' is already open"
      )));
    }
    Ok(OpenGuard { registry: self.clone(), user: user.to_string() })
  }

  /// `Some(remaining_seconds)` if `user` is presently locked out after too
  /// many failed unlock attempts.
  fn check_lockout(&self, user: &str) -> Result<Option<u64>> {
    let mut attempts = self
      .failed_attempts
      .lock()
      .map_err(|_| OrganizerError::Internal("failed-attempt registry mutex poisoned".into()))?;
    Ok(attempts.entry(user.to_string()).or_default().check_lockout())
  }

  fn record_failure(&self, user: &str) -> Result<()> {
    let mut attempts = self
      .failed_attempts
      .lock()
      .map_err(|_| OrganizerError::Internal("failed-attempt registry mutex poisoned".into()))?;
    attempts.entry(user.to_string()).or_default().record_failure();
    Ok(())
  }

  fn reset_failures(&self, user: &str) -> Result<()> {
    let mut attempts = self
      .failed_attempts
      .lock()
      .map_err(|_| OrganizerError::Internal("failed-attempt registry mutex poisoned".into()))?;
    attempts.entry(user.to_string()).or_default().reset();
    Ok(())
  }
}

/// Releases a user's open-vault claim when the owning [`VaultEngine`] is
/// dropped, whether by normal scope exit or by an early return on error.
struct OpenGuard {
  registry: Arc<OpenVaultRegistry>,
  user: String,
}

impl Drop for OpenGuard {
  fn drop(&mut self) {
    if let Ok(mut open) = self.registry.open.lock() {
      open.remove(&self.user);
    }
  }
}

/// Derives the vault key `K = PBKDF2-HMAC-SHA256(master_password ‖ device_secret, salt, iterations, 32)`.
fn derive_vault_key(
  master_password: &[u8],
  device_secret: &[u8],
  salt: &[u8],
  iterations: u32,
) -> Result<[u8; 32]> {
  let mut input = Vec::with_capacity(master_password.len() + device_secret.len());
  input.extend_from_slice(master_password);
  input.extend_from_slice(device_secret);
  let dk = pbkdf2::pbkdf2(&input, salt, iterations, 32)?;
  let mut key = [0u8; 32];
  key.copy_from_slice(&dk);
  Ok(key)
}

fn random_iv() -> [u8; IV_LEN] {
  let mut iv = [0u8; IV_LEN];
  rand::thread_rng().fill_bytes(&mut iv);
  iv
}

/// Seals `plaintext` under `key` with a fresh random nonce. Shared with
/// [`crate::sync`], which wraps the entire entries list in one such
/// envelope rather than one per field.
pub(crate) fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Envelope> {
  let iv = random_iv();
  let sealed = gcm::encrypt(key, &iv, plaintext, &[])?;
  Ok(Envelope { ciphertext: sealed.ciphertext, iv, tag: sealed.tag })
}

pub(crate) fn open_envelope(key: &[u8; 32], envelope: &Envelope) -> Result<Vec<u8>> {
  gcm::decrypt(key, &envelope.iv, &envelope.ciphertext, &envelope.tag, &[])
}

pub(crate) fn verification_plaintext(entries: &[Entry]) -> Result<[u8; 32]> {
  Ok(sha256(&codec::canonical_entries_json(entries)?))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
  fs::write(&tmp_path, bytes)?;
  fs::rename(&tmp_path, path)?;
  Ok(())
}

fn load_document(path: &Path) -> Result<Vault> {
  let bytes = fs::read(path)?;
  Ok(serde_json::from_slice(&bytes)?)
}

fn save_document(path: &Path, vault: &Vault) -> Result<()> {
  let bytes = serde_json::to_vec(vault)?;
  write_atomic(path, &bytes)
}

/// An opened, unlocked vault. Owns the derived key, the decoded document,
/// and a lease on [`OpenVaultRegistry`] that's released on drop.
pub struct VaultEngine {
  path: PathBuf,
  vault: Vault,
  session: VaultSession,
  device_secret: DeviceSecret,
  keystore: Arc<dyn KeyStore>,
  config: Config,
  last_interaction: Cell<Instant>,
  _open_guard: OpenGuard,
}

impl VaultEngine {
  /// `create(user, master_password) -> Vault`: allocates a fresh salt and
  /// device secret, derives K, and persists an empty vault.
  #[tracing::instrument(skip(path, registry, keystore, config, master_password))]
  pub fn create(
    path: impl Into<PathBuf>,
    registry: &Arc<OpenVaultRegistry>,
    keystore: Arc<dyn KeyStore>,
    config: Config,
    user: &str,
    master_password: &[u8],
  ) -> Result<Self> {
    let path = path.into();
    if path.exists() {
      return Err(OrganizerError::InvalidRequest(format!(
        "vault already exists at {}",
        path.display()
      )));
    }

    let guard = registry.acquire(user)?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let device_secret = DeviceSecret::generate();
    keystore.put(user, device_secret.as_bytes())?;

    let key_bytes =
      derive_vault_key(master_password, device_secret.as_bytes(), &salt, config.pbkdf2_iterations)?;

    let now = Utc::now();
    let entries: Vec<Entry> = Vec::new();
    let verification_token = seal(&key_bytes, &verification_plaintext(&entries)?)?;

    let vault = Vault {
      user: user.to_string(),
      version: VAULT_FORMAT_VERSION,
      salt,
      created_at: now,
      updated_at: now,
      verification_token,
      entries,
    };

    save_document(&path, &vault)?;
    tracing::debug!("vault created");

    Ok(VaultEngine {
      path,
      vault,
      session: VaultSession::new(salt, key_bytes),
      device_secret,
      keystore,
      config,
      last_interaction: Cell::new(Instant::now()),
      _open_guard: guard,
    })
  }

  /// `open(user, master_password) -> Vault | WrongPassword`: loads the
  /// document and device secret, derives K, and verifies it against the
  /// verification token before exposing any entry.
  ///
  /// Consults `registry`'s per-user [`FailedAttemptTracker`] before even
  /// touching disk, and records the outcome after: repeated wrong-password
  /// attempts lock the user out for [`crate::models::LOCKOUT_DURATION_SECS`]
  /// after [`crate::models::MAX_FAILED_ATTEMPTS`], regardless of which step
  /// of verification failed — unlock failure carries no detail about which
  /// step rejected it.
  #[tracing::instrument(skip(path, registry, keystore, config, master_password))]
  pub fn open(
    path: impl Into<PathBuf>,
    registry: &Arc<OpenVaultRegistry>,
    keystore: Arc<dyn KeyStore>,
    config: Config,
    user: &str,
    master_password: &[u8],
  ) -> Result<Self> {
    if let Some(remaining) = registry.check_lockout(user)? {
      return Err(OrganizerError::InvalidState(format!(
        "too many failed unlock attempts; try again in {remaining}s"
      )));
    }

    let path = path.into();
    let guard = registry.acquire(user)?;

    let attempt = (move || -> Result<Self> {
      let vault = load_document(&path)?;

      let device_secret_bytes = keystore.get(user)?.ok_or_else(|| {
        OrganizerError::NotFound(format!("no device secret available for user '{user}'"))
      })?;
      let device_secret: DeviceSecret = {
        let mut bytes = [0u8; crate::models::DEVICE_SECRET_LEN];
        if device_secret_bytes.len() != bytes.len() {
          return Err(OrganizerError::InvalidState("device secret has unexpected length".into()));
        }
        bytes.copy_from_slice(&device_secret_bytes);
        DeviceSecret::new(bytes)
      };

      let key_bytes = derive_vault_key(
        master_password,
        device_secret.as_bytes(),
        &vault.salt,
        config.pbkdf2_iterations,
      )?;

      let expected = verification_plaintext(&vault.entries)?;
      let decrypted = match open_envelope(&key_bytes, &vault.verification_token) {
        Ok(plaintext) => plaintext,
        Err(_) => return Err(OrganizerError::WrongPassword),
      };
      if decrypted.ct_eq(&expected).unwrap_u8() != 1 {
        return Err(OrganizerError::WrongPassword);
      }

      let salt = vault.salt;
      Ok(VaultEngine {
        path: path.clone(),
        vault,
        session: VaultSession::new(salt, key_bytes),
        device_secret,
        keystore,
        config,
        last_interaction: Cell::new(Instant::now()),
        _open_guard: guard,
      })
    })();

    match attempt {
      Ok(engine) => {
        registry.reset_failures(user)?;
        tracing::debug!("vault opened");
        Ok(engine)
      }
      Err(OrganizerError::WrongPassword) => {
        registry.record_failure(user)?;
        tracing::warn!("unlock rejected: wrong master password");
        Err(OrganizerError::WrongPassword)
      }
      Err(other) => Err(other),
    }
  }

  fn touch(&self) {
    self.last_interaction.set(Instant::now());
  }

  /// Timestamp of the most recent vault operation, for a caller's own
  /// inactivity polling.
  pub fn last_interaction(&self) -> Instant {
    self.last_interaction.get()
  }

  /// Whether more than [`INACTIVITY_TIMEOUT_SECS`] have elapsed since the
  /// last operation. This crate never locks a vault on its own; a host
  /// (CLI, GUI, service) polls this and calls [`VaultEngine::lock`].
  pub fn should_auto_lock(&self) -> bool {
    self.last_interaction.get().elapsed().as_secs() >= INACTIVITY_TIMEOUT_SECS
  }

  /// Ends the session: drops the engine, zeroizing the derived key and
  /// releasing this user's [`OpenVaultRegistry`] claim.
  pub fn lock(self) {}

  /// `list() -> [Entry decrypted]`: decrypts every entry on demand.
  pub fn list(&self) -> Result<Vec<DecryptedEntry>> {
    self.touch();
    let key = self.session.key_bytes();
    self
      .vault
      .entries
      .iter()
      .map(|e| {
        let username = open_envelope(key, &e.username)?;
        let password = open_envelope(key, &e.password)?;
        Ok(DecryptedEntry {
          id: e.id,
          site: e.site.clone(),
          category: e.category.clone(),
          note: e.note.clone(),
          favorite: e.favorite,
          created: e.created,
          updated: e.updated,
          username: String::from_utf8(username)
            .map_err(|e| OrganizerError::Internal(format!("non-utf8 username: {e}")))?,
          password: String::from_utf8(password)
            .map_err(|e| OrganizerError::Internal(format!("non-utf8 password: {e}")))?,
        })
      })
      .collect()
  }

  fn reseal_and_persist(&mut self) -> Result<()> {
    self.touch();
    self.vault.version += 1;
    self.vault.updated_at = Utc::now();
    let plaintext = verification_plaintext(&self.vault.entries)?;
    self.vault.verification_token = seal(self.session.key_bytes(), &plaintext)?;
    save_document(&self.path, &self.vault)
  }

  /// `add(site, username, password, note, category, favorite)`: assigns the
  /// next monotone id and appends a freshly-sealed entry.
  #[allow(clippy::too_many_arguments)]
  #[tracing::instrument(skip(self, username, password, note))]
  pub fn add(
    &mut self,
    site: &str,
    username: &str,
    password: &str,
    note: &str,
    category: &str,
    favorite: bool,
  ) -> Result<u64> {
    let key = *self.session.key_bytes();
    let id = self.vault.next_id();
    let now = Utc::now();

    let entry = Entry {
      id,
      site: site.to_string(),
      category: category.to_string(),
      note: note.to_string(),
      favorite,
      created: now,
      updated: now,
      username: seal(&key, username.as_bytes())?,
      password: seal(&key, password.as_bytes())?,
    };

    self.vault.entries.push(entry);
    self.reseal_and_persist()?;
    tracing::debug!(entry_id = id, "entry added");
    Ok(id)
  }

  /// `edit(id, ...)`: replaces only the fields provided; password/username
  /// changes get fresh nonces.
  #[allow(clippy::too_many_arguments)]
  #[tracing::instrument(skip(self, username, password, note, site, category))]
  pub fn edit(
    &mut self,
    id: u64,
    username: Option<&str>,
    password: Option<&str>,
    site: Option<&str>,
    note: Option<&str>,
    category: Option<&str>,
    favorite: Option<bool>,
  ) -> Result<()> {
    let key = *self.session.key_bytes();
    let entry = self
      .vault
      .entries
      .iter_mut()
      .find(|e| e.id == id)
      .ok_or_else(|| OrganizerError::NotFound(format!("no entry with id {id}")))?;

    if let Some(u) = username {
      entry.username = seal(&key, u.as_bytes())?;
    }
    if let Some(p) = password {
      entry.password = seal(&key, p.as_bytes())?;
    }
    if let Some(s) = site {
      entry.site = s.to_string();
    }
    if let Some(n) = note {
      entry.note = n.to_string();
    }
    if let Some(c) = category {
      entry.category = c.to_string();
    }
    if let Some(f) = favorite {
      entry.favorite = f;
    }
    entry.updated = Utc::now();

    self.reseal_and_persist()?;
    tracing::debug!(entry_id = id, "entry edited");
    Ok(())
  }

  /// `remove(id)`: deletes the entry matching `id` by equality, never by
  /// list position.
  #[tracing::instrument(skip(self))]
  pub fn remove(&mut self, id: u64) -> Result<()> {
    let before = self.vault.entries.len();
    self.vault.entries.retain(|e| e.id != id);
    if self.vault.entries.len() == before {
      return Err(OrganizerError::NotFound(format!("no entry with id {id}")));
    }
    self.reseal_and_persist()?;
    tracing::debug!(entry_id = id, "entry removed");
    Ok(())
  }

  /// `change_master_password(current, new)`: verifies `current` by trial
  /// decryption, then re-encrypts every entry and the verification token
  /// under a freshly-derived key with a new salt. Leaves disk state
  /// untouched on any failure.
  #[tracing::instrument(skip(self, current, new))]
  pub fn change_master_password(&mut self, current: &[u8], new: &[u8]) -> Result<()> {
    self.touch();
    let current_key = derive_vault_key(
      current,
      self.device_secret.as_bytes(),
      &self.vault.salt,
      self.config.pbkdf2_iterations,
    )?;
    let expected = verification_plaintext(&self.vault.entries)?;
    let decrypted = open_envelope(&current_key, &self.vault.verification_token)
      .map_err(|_| OrganizerError::WrongPassword)?;
    if decrypted.ct_eq(&expected).unwrap_u8() != 1 {
      tracing::warn!("master password change rejected: wrong current password");
      return Err(OrganizerError::WrongPassword);
    }

    let mut new_salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut new_salt);
    let new_key = derive_vault_key(
      new,
      self.device_secret.as_bytes(),
      &new_salt,
      self.config.pbkdf2_iterations,
    )?;

    let mut re_encrypted = Vec::with_capacity(self.vault.entries.len());
    for entry in &self.vault.entries {
      let username = open_envelope(&current_key, &entry.username)?;
      let password = open_envelope(&current_key, &entry.password)?;
      re_encrypted.push(Entry {
        id: entry.id,
        site: entry.site.clone(),
        category: entry.category.clone(),
        note: entry.note.clone(),
        favorite: entry.favorite,
        created: entry.created,
        updated: Utc::now(),
        username: seal(&new_key, &username)?,
        password: seal(&new_key, &password)?,
      });
    }

    let new_verification = seal(&new_key, &verification_plaintext(&re_encrypted)?)?;

    // Build the candidate document and persist before mutating in-memory
    // state, so a failure here leaves both disk and session untouched.
    let candidate = Vault {
      user: self.vault.user.clone(),
      version: self.vault.version,
      salt: new_salt,
      created_at: self.vault.created_at,
      updated_at: Utc::now(),
      verification_token: new_verification,
      entries: re_encrypted,
    };
    save_document(&self.path, &candidate)?;

    self.vault = candidate;
    self.session = VaultSession::new(new_salt, new_key);
    tracing::debug!("master password changed");
    Ok(())
  }

  /// Generates a fresh SRP `(salt, verifier)` pair for `new_password`, for
  /// the caller to push to the sync peer after `change_master_password`
  /// has already committed locally (see the password-change atomicity
  /// resolution: server update happens after, never before, the local
  /// save).
  pub fn srp_registration_for(new_password: &[u8]) -> ([u8; 16], String) {
    crate::srp::generate_registration(new_password)
  }

  pub fn vault(&self) -> &Vault {
    &self.vault
  }

  /// The vault key `K`, for [`crate::sync`] to seal/open the sync envelope
  /// under the same key the entries themselves are encrypted with.
  pub(crate) fn key(&self) -> [u8; 32] {
    *self.session.key_bytes()
  }

  pub(crate) fn entries(&self) -> &[Entry] {
    &self.vault.entries
  }

  /// Overwrites local entries, salt, and timestamps from a verified remote
  /// download. Does not bump `version`: replacing
  /// state from a sync pull is not a local mutation.
  pub(crate) fn adopt_remote_state(
    &mut self,
    entries: Vec<Entry>,
    salt: [u8; SALT_LEN],
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
  ) -> Result<()> {
    self.touch();
    self.vault.entries = entries;
    self.vault.salt = salt;
    self.vault.created_at = created_at;
    self.vault.updated_at = updated_at;

    let key = self.key();
    let plaintext = verification_plaintext(&self.vault.entries)?;
    self.vault.verification_token = seal(&key, &plaintext)?;
    save_document(&self.path, &self.vault)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::keystore::MemoryKeyStore;

  fn temp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("organizer-core-test-{name}-{}.json", std::process::id()));
    let _ = fs::remove_file(&p);
    p
  }

  #[test]
  fn create_then_open_round_trips() {
    let path = temp_path("create-open");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    {
      let _engine = VaultEngine::create(
        &path,
        &registry,
        keystore.clone(),
        Config::default(),
        "alice",
        b"correct horse",
      )
      .unwrap();
    }

    let engine = VaultEngine::open(
      &path,
      &registry,
      keystore,
      Config::default(),
      "alice",
      b"correct horse",
    )
    .unwrap();
    assert_eq!(engine.list().unwrap().len(), 0);

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn wrong_password_is_rejected_without_mutation() {
    let path = temp_path("wrong-pw");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    {
      let _engine = VaultEngine::create(
        &path,
        &registry,
        keystore.clone(),
        Config::default(),
        "bob",
        b"correct horse",
      )
      .unwrap();
    }

    let before = fs::read(&path).unwrap();
    let result =
      VaultEngine::open(&path, &registry, keystore, Config::default(), "bob", b"hunter2");
    assert!(matches!(result, Err(OrganizerError::WrongPassword)));
    let after = fs::read(&path).unwrap();
    assert_eq!(before, after);

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn add_list_edit_remove_round_trip() {
    let path = temp_path("entries");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    let mut engine = VaultEngine::create(
      &path,
      &registry,
      keystore,
      Config::default(),
      "carol",
      b"correct horse",
    )
    .unwrap();

    let id0 = engine.add("github.com", "me@x", "p@ss-1", "", "dev", false).unwrap();
    let id1 = engine.add("bank", "acct", "$ecret", "", "finance", true).unwrap();
    assert_eq!(id0, 0);
    assert_eq!(id1, 1);

    let entries = engine.list().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].password, "p@ss-1");
    assert_eq!(entries[1].username, "acct");

    engine.edit(id0, None, Some("new-pass"), None, None, None, None).unwrap();
    let entries = engine.list().unwrap();
    assert_eq!(entries[0].password, "new-pass");
    assert_eq!(entries[0].username, "me@x");

    engine.remove(id0).unwrap();
    let entries = engine.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 1);

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn version_strictly_increases_on_each_local_mutation() {
    let path = temp_path("version-bump");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    let mut engine = VaultEngine::create(
      &path,
      &registry,
      keystore,
      Config::default(),
      "heidi",
      b"correct horse",
    )
    .unwrap();
    assert_eq!(engine.vault().version, VAULT_FORMAT_VERSION);

    let id = engine.add("github.com", "me@x", "p@ss-1", "", "dev", false).unwrap();
    assert_eq!(engine.vault().version, VAULT_FORMAT_VERSION + 1);

    engine.edit(id, None, Some("new-pass"), None, None, None, None).unwrap();
    assert_eq!(engine.vault().version, VAULT_FORMAT_VERSION + 2);

    engine.remove(id).unwrap();
    assert_eq!(engine.vault().version, VAULT_FORMAT_VERSION + 3);

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn remove_missing_id_is_not_found() {
    let path = temp_path("remove-missing");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let mut engine = VaultEngine::create(
      &path,
      &registry,
      keystore,
      Config::default(),
      "dana",
      b"correct horse",
    )
    .unwrap();

    let err = engine.remove(999);
    assert!(matches!(err, Err(OrganizerError::NotFound(_))));

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn concurrent_open_for_same_user_is_rejected() {
    let path = temp_path("concurrent");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    let _first = VaultEngine::create(
      &path,
      &registry,
      keystore.clone(),
      Config::default(),
      "erin",
      b"correct horse",
    )
    .unwrap();

    let second =
      VaultEngine::open(&path, &registry, keystore, Config::default(), "erin", b"correct horse");
    assert!(matches!(second, Err(OrganizerError::InvalidState(_))));

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn change_master_password_then_reopen() {
    let path = temp_path("change-pw");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    {
      let mut engine = VaultEngine::create(
        &path,
        &registry,
        keystore.clone(),
        Config::default(),
        "frank",
        b"old password",
      )
      .unwrap();
      engine.add("site.com", "frank", "hunter2", "", "", false).unwrap();
      engine.change_master_password(b"old password", b"new password").unwrap();
    }

    let old_attempt =
      VaultEngine::open(&path, &registry, keystore.clone(), Config::default(), "frank", b"old password");
    assert!(matches!(old_attempt, Err(OrganizerError::WrongPassword)));

    let engine = VaultEngine::open(
      &path,
      &registry,
      keystore,
      Config::default(),
      "frank",
      b"new password",
    )
    .unwrap();
    let entries = engine.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].password, "hunter2");

    let _ = fs::remove_file(&path);
  }

  #[test]
  fn fresh_engine_does_not_auto_lock() {
    let path = temp_path("auto-lock");
    let registry = OpenVaultRegistry::new();
    let keystore: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());

    let engine = VaultEngine::create(
      &path,
      &registry,
      keystore,
      Config::default(),
      "gina",
      b"correct horse",
    )
    .unwrap();

    assert!(!engine.should_auto_lock());
    engine.lock();

    let _ = fs::remove_file(&path);
  }
}

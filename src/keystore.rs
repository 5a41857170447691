//! The `KeyStore` capability: a small in-process trait for storing the
//! per-user device secret outside the vault document itself. Implementations
//! may delegate to an OS-backed encrypted store; this crate ships an
//! in-memory store (for tests and ephemeral sessions) and a file-backed
//! store (for the CLI, where no OS keychain integration is wired up).

use crate::error::{OrganizerError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// `put`/`get` for a user's device secret, keyed by username.
pub trait KeyStore: Send + Sync {
  fn put(&self, user: &str, bytes: &[u8]) -> Result<()>;
  fn get(&self, user: &str) -> Result<Option<Vec<u8>>>;
}

/// An in-memory `KeyStore`, suitable for tests and for a session that
/// never outlives the process.
#[derive(Default)]
pub struct MemoryKeyStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyStore for MemoryKeyStore {
  fn put(&self, user: &str, bytes: &[u8]) -> Result<()> {
    let mut entries = self.entries.lock().map_err(|_| {
      OrganizerError::Internal("keystore mutex poisoned".into())
    })?;
    entries.insert(user.to_string(), bytes.to_vec());
    Ok(())
  }

  fn get(&self, user: &str) -> Result<Option<Vec<u8>>> {
    let entries = self.entries.lock().map_err(|_| {
      OrganizerError::Internal("keystore mutex poisoned".into())
    })?;
    Ok(entries.get(user).cloned())
  }
}

/// A file-backed `KeyStore`: one file per user under `base_dir`, holding the
/// raw device secret bytes. Not OS-keychain-encrypted; callers that need
/// platform-backed secrecy should provide their own `KeyStore` impl.
pub struct FileKeyStore {
  base_dir: PathBuf,
}

impl FileKeyStore {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self { base_dir: base_dir.into() }
  }

  fn path_for(&self, user: &str) -> PathBuf {
    self.base_dir.join(format!("{user}.key"))
  }
}

impl KeyStore for FileKeyStore {
  fn put(&self, user: &str, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(&self.base_dir)?;
    fs::write(self.path_for(user), bytes)?;
    Ok(())
  }

  fn get(&self, user: &str) -> Result<Option<Vec<u8>>> {
    let path = self.path_for(user);
    if !Path::new(&path).exists() {
      return Ok(None);
    }
    Ok(Some(fs::read(path)?))
  }
}

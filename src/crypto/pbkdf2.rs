//! PBKDF2-HMAC-SHA256 (RFC 8018), used to derive the vault key from the
//! master password and device secret.

use crate::crypto::sha256::hmac_sha256;
use crate::error::{OrganizerError, Result};

/// Minimum iteration count this crate will accept; lower requests are
/// rejected rather than silently clamped.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Default iteration count for new vaults.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Derives `dk_len` bytes from `password` and `salt` using PBKDF2-HMAC-SHA256.
///
/// Rejects `iterations < MIN_ITERATIONS`.
pub fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32, dk_len: usize) -> Result<Vec<u8>> {
  if iterations < MIN_ITERATIONS {
    return Err(OrganizerError::InvalidRequest(format!(
      "pbkdf2 iteration count {iterations} is below the minimum of {MIN_ITERATIONS}"
    )));
  }

  const H_LEN: usize = 32;
  let num_blocks = dk_len.div_ceil(H_LEN);
  let mut derived = Vec::with_capacity(num_blocks * H_LEN);

  for block_index in 1..=num_blocks as u32 {
    let mut salt_block = salt.to_vec();
    salt_block.extend_from_slice(&block_index.to_be_bytes());

    let mut u = hmac_sha256(password, &salt_block);
    let mut t = u;
    for _ in 1..iterations {
      u = hmac_sha256(password, &u);
      for i in 0..H_LEN {
        t[i] ^= u[i];
      }
    }
    derived.extend_from_slice(&t);
  }

  derived.truncate(dk_len);
  Ok(derived)
}

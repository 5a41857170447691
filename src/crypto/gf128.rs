//! GHASH: the universal hash GCM authenticates with, over GF(2^128).
//!
//! Multiplication uses the reducing polynomial `x^128 + x^7 + x^2 + x + 1`
//! in its bit-reversed ("0xe1...") form, matching NIST SP 800-38D §6.3. The
//! implementation is the shift-and-xor method processed one bit at a time
//! with a branchless mask, which keeps the multiply's timing independent of
//! the operand bits.

use crate::error::{OrganizerError, Result};

/// GF(2^128) element as 16 bytes, most-significant byte first (NIST
/// convention: bit 0 of byte 0 is the polynomial's leading coefficient).
pub type Block = [u8; 16];

fn xor_block(a: &Block, b: &Block) -> Block {
  let mut out = [0u8; 16];
  for i in 0..16 {
    out[i] = a[i] ^ b[i];
  }
  out
}

/// Multiplies two GF(2^128) elements under the GCM reduction polynomial.
pub fn gf_mul(x: &Block, y: &Block) -> Block {
  let mut z = [0u8; 16];
  let mut v = *y;

  for i in 0..128 {
    let byte = i / 8;
    let bit = 7 - (i % 8);
    let xi = (x[byte] >> bit) & 1;
    let mask = (xi as i8).wrapping_neg() as u8; // 0xFF if xi==1 else 0x00
    for k in 0..16 {
      z[k] ^= v[k] & mask;
    }

    // v = v >> 1 in the GCM bit ordering; if the dropped LSB was 1, reduce.
    let lsb = v[15] & 1;
    let mut carry = 0u8;
    for k in 0..16 {
      let new_carry = v[k] & 1;
      v[k] = (v[k] >> 1) | (carry << 7);
      carry = new_carry;
    }
    if lsb == 1 {
      v[0] ^= 0xe1;
    }
  }

  z
}

/// Right-zero-pads `b` to the next multiple of 16 bytes.
pub fn pad_to_16(b: &[u8]) -> Vec<u8> {
  let rem = b.len() % 16;
  if rem == 0 {
    return b.to_vec();
  }
  let mut out = b.to_vec();
  out.resize(b.len() + (16 - rem), 0);
  out
}

/// Encodes `(aad_len, ciphertext_len)` as two big-endian 64-bit bit-lengths.
pub fn length_block(aad_len: u64, ct_len: u64) -> Block {
  let mut out = [0u8; 16];
  out[0..8].copy_from_slice(&(aad_len * 8).to_be_bytes());
  out[8..16].copy_from_slice(&(ct_len * 8).to_be_bytes());
  out
}

/// Computes GHASH(H, data) for `data` whose length must be a multiple of 16.
///
/// `Y0 = 0; Yi = (Yi-1 xor Xi) * H`; returns the final `Yi`.
pub fn ghash(h: &[u8], data: &[u8]) -> Result<Block> {
  if h.len() != 16 {
    return Err(OrganizerError::InvalidRequest(format!(
      "GHASH subkey must be 16 bytes, got {}",
      h.len()
    )));
  }
  if data.len() % 16 != 0 {
    return Err(OrganizerError::InvalidRequest(format!(
      "GHASH input must be unpadded-free (multiple of 16 bytes), got {}",
      data.len()
    )));
  }

  let mut h_block = [0u8; 16];
  h_block.copy_from_slice(h);

  let mut y = [0u8; 16];
  for chunk in data.chunks(16) {
    let mut x = [0u8; 16];
    x.copy_from_slice(chunk);
    y = gf_mul(&xor_block(&y, &x), &h_block);
  }
  Ok(y)
}

//! Arbitrary-precision nonnegative integer arithmetic and modular
//! exponentiation for SRP-6a.
//!
//! This is a grade-school (schoolbook) bignum: little-endian `u64` limbs,
//! add/sub/mul/rem built directly on top of `u128` carry arithmetic, and a
//! square-and-multiply `mod_pow` that performs a multiply on every exponent
//! bit and conditionally *selects* the result with a branchless mask rather
//! than skipping work — constant-time with respect to the exponent, at the
//! cost of the real constant-time-vs-timing-attack guarantees a bit-sliced
//! Montgomery ladder would give. Sizes here
//! top out at a few thousand bits (the 2048-bit SRP group), so the
//! quadratic multiply and long division are not a performance concern.

use crate::error::{OrganizerError, Result};

/// An arbitrary-precision nonnegative integer, little-endian `u64` limbs.
/// The empty vector represents zero; otherwise the most significant limb
/// is always nonzero (no redundant leading zero limbs).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BigUint(Vec<u64>);

impl BigUint {
  pub fn zero() -> Self {
    BigUint(Vec::new())
  }

  pub fn from_u64(v: u64) -> Self {
    if v == 0 {
      BigUint::zero()
    } else {
      BigUint(vec![v])
    }
  }

  /// Parses a big-endian byte string into a `BigUint`.
  pub fn from_bytes_be(bytes: &[u8]) -> Self {
    let mut limbs = vec![0u64; bytes.len().div_ceil(8)];
    for (i, &b) in bytes.iter().rev().enumerate() {
      limbs[i / 8] |= (b as u64) << (8 * (i % 8));
    }
    let mut v = BigUint(limbs);
    v.trim();
    v
  }

  /// Encodes as big-endian bytes, left-zero-padded to exactly `len` bytes.
  /// Returns an error if the value doesn't fit in `len` bytes.
  pub fn to_bytes_be_padded(&self, len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    for (i, limb) in self.0.iter().enumerate() {
      for byte_in_limb in 0..8 {
        let pos = i * 8 + byte_in_limb;
        if pos >= len {
          if (*limb >> (8 * byte_in_limb)) as u8 != 0 || *limb >> (8 * byte_in_limb) != 0 {
            return Err(OrganizerError::InvalidRequest(format!(
              "BigUint does not fit in {len} bytes"
            )));
          }
          continue;
        }
        out[len - 1 - pos] = (limb >> (8 * byte_in_limb)) as u8;
      }
    }
    Ok(out)
  }

  fn trim(&mut self) {
    while self.0.last() == Some(&0) {
      self.0.pop();
    }
  }

  pub fn is_zero(&self) -> bool {
    self.0.is_empty()
  }

  fn bit_len(&self) -> usize {
    match self.0.last() {
      None => 0,
      Some(&top) => (self.0.len() - 1) * 64 + (64 - top.leading_zeros() as usize),
    }
  }

  fn get_bit(&self, i: usize) -> u64 {
    let limb = i / 64;
    if limb >= self.0.len() {
      return 0;
    }
    (self.0[limb] >> (i % 64)) & 1
  }

  pub fn cmp(&self, other: &BigUint) -> std::cmp::Ordering {
    if self.0.len() != other.0.len() {
      return self.0.len().cmp(&other.0.len());
    }
    for i in (0..self.0.len()).rev() {
      if self.0[i] != other.0[i] {
        return self.0[i].cmp(&other.0[i]);
      }
    }
    std::cmp::Ordering::Equal
  }

  pub fn is_ge(&self, other: &BigUint) -> bool {
    self.cmp(other) != std::cmp::Ordering::Less
  }

  pub fn add(&self, other: &BigUint) -> BigUint {
    let n = self.0.len().max(other.0.len());
    let mut out = Vec::with_capacity(n + 1);
    let mut carry = 0u128;
    for i in 0..n {
      let a = *self.0.get(i).unwrap_or(&0) as u128;
      let b = *other.0.get(i).unwrap_or(&0) as u128;
      let sum = a + b + carry;
      out.push(sum as u64);
      carry = sum >> 64;
    }
    if carry != 0 {
      out.push(carry as u64);
    }
    let mut result = BigUint(out);
    result.trim();
    result
  }

  /// Subtracts `other` from `self`. Panics if `other > self` (callers must
  /// only subtract smaller-or-equal values; modular code always does).
  pub fn sub(&self, other: &BigUint) -> BigUint {
    assert!(self.is_ge(other), "BigUint subtraction underflow");
    let mut out = vec![0u64; self.0.len()];
    let mut borrow = 0i128;
    for i in 0..self.0.len() {
      let a = self.0[i] as i128;
      let b = *other.0.get(i).unwrap_or(&0) as i128;
      let mut diff = a - b - borrow;
      if diff < 0 {
        diff += 1i128 << 64;
        borrow = 1;
      } else {
        borrow = 0;
      }
      out[i] = diff as u64;
    }
    let mut result = BigUint(out);
    result.trim();
    result
  }

  pub fn mul(&self, other: &BigUint) -> BigUint {
    if self.is_zero() || other.is_zero() {
      return BigUint::zero();
    }
    let mut out = vec![0u64; self.0.len() + other.0.len()];
    for (i, &a) in self.0.iter().enumerate() {
      let mut carry = 0u128;
      for (j, &b) in other.0.iter().enumerate() {
        let idx = i + j;
        let prod = (a as u128) * (b as u128) + out[idx] as u128 + carry;
        out[idx] = prod as u64;
        carry = prod >> 64;
      }
      let mut idx = i + other.0.len();
      while carry != 0 {
        let sum = out[idx] as u128 + carry;
        out[idx] = sum as u64;
        carry = sum >> 64;
        idx += 1;
      }
    }
    let mut result = BigUint(out);
    result.trim();
    result
  }

  fn shl1(&self) -> BigUint {
    let mut out = vec![0u64; self.0.len() + 1];
    let mut carry = 0u64;
    for (i, &limb) in self.0.iter().enumerate() {
      out[i] = (limb << 1) | carry;
      carry = limb >> 63;
    }
    out[self.0.len()] = carry;
    let mut result = BigUint(out);
    result.trim();
    result
  }

  /// `self mod modulus` via binary long division (shift-and-subtract).
  pub fn rem(&self, modulus: &BigUint) -> BigUint {
    assert!(!modulus.is_zero(), "division by zero modulus");
    if self.cmp(modulus) == std::cmp::Ordering::Less {
      return self.clone();
    }

    let bits = self.bit_len();
    let mut remainder = BigUint::zero();
    for i in (0..bits).rev() {
      remainder = remainder.shl1();
      if self.get_bit(i) == 1 {
        remainder = remainder.add(&BigUint::from_u64(1));
      }
      if remainder.is_ge(modulus) {
        remainder = remainder.sub(modulus);
      }
    }
    remainder
  }

  pub fn mul_mod(&self, other: &BigUint, modulus: &BigUint) -> BigUint {
    self.mul(other).rem(modulus)
  }

  pub fn add_mod(&self, other: &BigUint, modulus: &BigUint) -> BigUint {
    let sum = self.add(other);
    if sum.is_ge(modulus) {
      sum.sub(modulus)
    } else {
      sum
    }
  }

  /// Constant-time-with-respect-to-the-exponent conditional select: returns
  /// `a` if `choose_b == 0`, `b` if `choose_b == 1`, without branching on
  /// the limb values themselves.
  fn select(choose_b: u64, a: &BigUint, b: &BigUint) -> BigUint {
    let mask = 0u64.wrapping_sub(choose_b); // all-ones if choose_b==1, else 0
    let n = a.0.len().max(b.0.len());
    let mut out = vec![0u64; n];
    for i in 0..n {
      let av = *a.0.get(i).unwrap_or(&0);
      let bv = *b.0.get(i).unwrap_or(&0);
      out[i] = (av & !mask) | (bv & mask);
    }
    let mut result = BigUint(out);
    result.trim();
    result
  }

  /// `base^exp mod modulus` via square-and-multiply. Every exponent bit
  /// performs a multiply; the accumulator update is a branchless select
  /// rather than a conditional skip.
  pub fn mod_pow(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.cmp(&BigUint::from_u64(1)) == std::cmp::Ordering::Equal {
      return BigUint::zero();
    }
    let mut result = BigUint::from_u64(1);
    let base = base.rem(modulus);
    let bits = exp.bit_len();

    for i in (0..bits).rev() {
      let squared = result.mul_mod(&result, modulus);
      let multiplied = squared.mul_mod(&base, modulus);
      let bit = exp.get_bit(i);
      result = BigUint::select(bit, &squared, &multiplied);
    }

    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn big(hex: &str) -> BigUint {
    BigUint::from_bytes_be(&hex::decode(hex).unwrap())
  }

  #[test]
  fn roundtrip_bytes() {
    let v = BigUint::from_bytes_be(&[0x01, 0x02, 0x03]);
    let bytes = v.to_bytes_be_padded(8).unwrap();
    assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0x01, 0x02, 0x03]);
  }

  #[test]
  fn add_sub_roundtrip() {
    let a = big("ffffffffffffffff");
    let b = BigUint::from_u64(1);
    let sum = a.add(&b);
    assert_eq!(sum.to_bytes_be_padded(9).unwrap(), hex::decode("010000000000000000").unwrap());
    let back = sum.sub(&b);
    assert_eq!(back, a);
  }

  #[test]
  fn mul_small() {
    let a = BigUint::from_u64(123456789);
    let b = BigUint::from_u64(987654321);
    let product = a.mul(&b);
    // 123456789 * 987654321 = 121932631112635269
    let expected = BigUint::from_bytes_be(&121932631112635269u64.to_be_bytes());
    assert_eq!(product, expected);
  }

  #[test]
  fn rem_small() {
    let a = BigUint::from_u64(17);
    let m = BigUint::from_u64(5);
    assert_eq!(a.rem(&m), BigUint::from_u64(2));
  }

  #[test]
  fn mod_pow_small_matches_naive() {
    // 3^13 mod 497 = 445 (classic textbook example)
    let base = BigUint::from_u64(3);
    let exp = BigUint::from_u64(13);
    let modulus = BigUint::from_u64(497);
    let result = BigUint::mod_pow(&base, &exp, &modulus);
    assert_eq!(result, BigUint::from_u64(445));
  }

  #[test]
  fn mod_pow_with_zero_exponent_is_one() {
    let base = BigUint::from_u64(999);
    let exp = BigUint::zero();
    let modulus = BigUint::from_u64(1000);
    assert_eq!(BigUint::mod_pow(&base, &exp, &modulus), BigUint::from_u64(1));
  }

  #[test]
  fn mod_pow_2048_bit_group_self_consistent() {
    let n = big(crate::srp::N_2048_HEX);
    let g = BigUint::from_u64(2);
    let x = BigUint::from_u64(12345);
    let gx = BigUint::mod_pow(&g, &x, &n);
    assert!(gx.cmp(&n) == std::cmp::Ordering::Less);
    assert!(!gx.is_zero());
  }
}

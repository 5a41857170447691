//! AES-256-GCM authenticated encryption (NIST SP 800-38D), built from the
//! hand-rolled AES-256 block cipher (`crypto::aes`) and GHASH (`crypto::gf128`).

use crate::crypto::aes;
use crate::crypto::gf128::{self, Block};
use crate::error::{OrganizerError, Result};
use subtle::ConstantTimeEq;

/// Authenticated ciphertext and its 16-byte tag.
pub struct Sealed {
  pub ciphertext: Vec<u8>,
  pub tag: [u8; 16],
}

fn inc32(block: &mut Block) {
  // Increment only the last 32 bits, per SP 800-38D's `inc_32`.
  let mut counter = u32::from_be_bytes([block[12], block[13], block[14], block[15]]);
  counter = counter.wrapping_add(1);
  block[12..16].copy_from_slice(&counter.to_be_bytes());
}

/// GCTR: AES-CTR keystream starting at `icb`, applied to `data` via XOR.
fn gctr(round_keys: &aes::RoundKeys, icb: &Block, data: &[u8]) -> Result<Vec<u8>> {
  if data.is_empty() {
    return Ok(Vec::new());
  }

  let mut out = Vec::with_capacity(data.len());
  let mut counter = *icb;

  for chunk in data.chunks(16) {
    let keystream = aes::encrypt_block(&counter, round_keys)?;
    for (i, b) in chunk.iter().enumerate() {
      out.push(b ^ keystream[i]);
    }
    inc32(&mut counter);
  }

  Ok(out)
}

/// Computes `J0`, the pre-counter block, for a given IV per SP 800-38D §7.1.
fn compute_j0(h: &Block, iv: &[u8]) -> Result<Block> {
  if iv.len() == 12 {
    let mut j0 = [0u8; 16];
    j0[..12].copy_from_slice(iv);
    j0[15] = 1;
    Ok(j0)
  } else {
    let padded = gf128::pad_to_16(iv);
    let lb = gf128::length_block(0, iv.len() as u64);
    let mut buf = padded;
    buf.extend_from_slice(&lb);
    gf128::ghash(h, &buf)
  }
}

fn tag_input(aad: &[u8], ciphertext: &[u8]) -> Vec<u8> {
  let mut buf = gf128::pad_to_16(aad);
  buf.extend(gf128::pad_to_16(ciphertext));
  buf.extend_from_slice(&gf128::length_block(aad.len() as u64, ciphertext.len() as u64));
  buf
}

/// Encrypts `plaintext` under `key` with nonce `iv` and associated data `aad`.
///
/// `iv` may be any length (the 96-bit fast path and the GHASH-derived path
/// for other lengths are both implemented); the vault engine always passes
/// a 12-byte IV.
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
  if key.len() != 32 {
    return Err(OrganizerError::InvalidRequest(format!(
      "AES-256-GCM key must be 32 bytes, got {}",
      key.len()
    )));
  }
  let round_keys = aes::key_schedule(key)?;
  let h = aes::encrypt_block(&[0u8; 16], &round_keys)?;
  let j0 = compute_j0(&h, iv)?;

  let mut j0_plus_1 = j0;
  inc32(&mut j0_plus_1);
  let ciphertext = gctr(&round_keys, &j0_plus_1, plaintext)?;

  let s = gf128::ghash(&h, &tag_input(aad, &ciphertext))?;
  let tag_bytes = gctr(&round_keys, &j0, &s)?;
  let mut tag = [0u8; 16];
  tag.copy_from_slice(&tag_bytes);

  Ok(Sealed { ciphertext, tag })
}

/// Decrypts `ciphertext` and verifies `tag` in constant time. Releases no
/// plaintext if authentication fails.
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
  if key.len() != 32 {
    return Err(OrganizerError::InvalidRequest(format!(
      "AES-256-GCM key must be 32 bytes, got {}",
      key.len()
    )));
  }
  if tag.len() != 16 {
    return Err(OrganizerError::InvalidRequest(format!(
      "GCM tag must be 16 bytes, got {}",
      tag.len()
    )));
  }

  let round_keys = aes::key_schedule(key)?;
  let h = aes::encrypt_block(&[0u8; 16], &round_keys)?;
  let j0 = compute_j0(&h, iv)?;

  let s = gf128::ghash(&h, &tag_input(aad, ciphertext))?;
  let expected_tag = gctr(&round_keys, &j0, &s)?;

  if expected_tag.ct_eq(tag).unwrap_u8() != 1 {
    return Err(OrganizerError::AuthFail);
  }

  let mut j0_plus_1 = j0;
  inc32(&mut j0_plus_1);
  gctr(&round_keys, &j0_plus_1, ciphertext)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hex(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).unwrap()
  }

  // S1 — NIST SP 800-38D GCM Test Case 16 (AES-256-GCM, 96-bit IV, AAD).
  #[test]
  fn nist_tc16_kat() {
    let key = hex("feffe9928665731c6d6a8f9467308308feffe9928665731c6d6a8f9467308308");
    let iv = hex("cafebabefacedbaddecaf888");
    let aad = hex("feedfacedeadbeeffeedfacedeadbeefabaddad2");
    let pt = hex(
      "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a721c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b39",
    );

    let expected_ct = hex(
      "522dc1f099567d07f47f37a32a84427d643a8cdcbfe5c0c97598a2bd2555d1aa8cb08e48590dbb3da7b08b1056828838c5f61e6393ba7a0abcc9f662",
    );
    let expected_tag = hex("76fc6ece0f4e1768cddf8853bb2d551b");

    let sealed = encrypt(&key, &iv, &pt, &aad).unwrap();
    assert_eq!(sealed.ciphertext, expected_ct);
    assert_eq!(sealed.tag.to_vec(), expected_tag);

    let round_trip = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, &aad).unwrap();
    assert_eq!(round_trip, pt);
  }

  // S2 — AEAD empty: zero key/iv/plaintext/aad.
  #[test]
  fn empty_vector_matches_known_tag() {
    let key = [0u8; 32];
    let iv = [0u8; 12];
    let sealed = encrypt(&key, &iv, &[], &[]).unwrap();
    assert!(sealed.ciphertext.is_empty());
    assert_eq!(hex::encode(sealed.tag), "530f8afbc74536b9a963b4f1c4cb738b");
  }

  #[test]
  fn decrypt_round_trips_for_all_plaintexts() {
    let key = [9u8; 32];
    let iv = [3u8; 12];
    for len in [0usize, 1, 15, 16, 17, 63, 64, 200] {
      let pt = vec![0x42u8; len];
      let aad = b"associated";
      let sealed = encrypt(&key, &iv, &pt, aad).unwrap();
      let out = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, aad).unwrap();
      assert_eq!(out, pt);
    }
  }

  #[test]
  fn bit_flip_in_ciphertext_fails_auth() {
    let key = [1u8; 32];
    let iv = [2u8; 12];
    let pt = b"some plaintext message";
    let aad = b"aad";
    let mut sealed = encrypt(&key, &iv, pt, aad).unwrap();
    sealed.ciphertext[0] ^= 0x01;
    let err = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, aad);
    assert!(matches!(err, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn bit_flip_in_tag_fails_auth() {
    let key = [1u8; 32];
    let iv = [2u8; 12];
    let pt = b"some plaintext message";
    let aad = b"aad";
    let mut sealed = encrypt(&key, &iv, pt, aad).unwrap();
    sealed.tag[0] ^= 0x01;
    let err = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, aad);
    assert!(matches!(err, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn bit_flip_in_aad_fails_auth() {
    let key = [1u8; 32];
    let iv = [2u8; 12];
    let pt = b"some plaintext message";
    let aad = b"aad";
    let sealed = encrypt(&key, &iv, pt, aad).unwrap();
    let err = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, b"aae");
    assert!(matches!(err, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn bit_flip_in_iv_fails_auth() {
    let key = [1u8; 32];
    let iv = [2u8; 12];
    let pt = b"some plaintext message";
    let aad = b"aad";
    let sealed = encrypt(&key, &iv, pt, aad).unwrap();
    let mut bad_iv = iv;
    bad_iv[0] ^= 0x01;
    let err = decrypt(&key, &bad_iv, &sealed.ciphertext, &sealed.tag, aad);
    assert!(matches!(err, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn different_ivs_produce_different_ciphertext() {
    let key = [5u8; 32];
    let pt = b"identical plaintext";
    let ct1 = encrypt(&key, &[1u8; 12], pt, &[]).unwrap();
    let ct2 = encrypt(&key, &[2u8; 12], pt, &[]).unwrap();
    assert_ne!(ct1.ciphertext, ct2.ciphertext);
  }

  #[test]
  fn non_96_bit_iv_round_trips() {
    // IVs other than 96 bits are supported via the GHASH-derived J0 path.
    let key = [11u8; 32];
    let iv = vec![7u8; 20]; // 160-bit IV takes the GHASH-derived J0 path.
    let pt = b"non-standard iv length";
    let sealed = encrypt(&key, &iv, pt, &[]).unwrap();
    let out = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, &[]).unwrap();
    assert_eq!(out, pt);
  }

  #[test]
  fn rejects_wrong_tag_size() {
    let key = [1u8; 32];
    let iv = [2u8; 12];
    let err = decrypt(&key, &iv, &[0u8; 4], &[0u8; 8], &[]);
    assert!(matches!(err, Err(OrganizerError::InvalidRequest(_))));
  }

  proptest::proptest! {
    // decrypt(encrypt(P)) == P for arbitrary key/iv/plaintext/aad.
    #[test]
    fn roundtrips_for_arbitrary_inputs(
      key in proptest::collection::vec(proptest::prelude::any::<u8>(), 32),
      iv in proptest::collection::vec(proptest::prelude::any::<u8>(), 12),
      pt in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256),
      aad in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64),
    ) {
      let sealed = encrypt(&key, &iv, &pt, &aad).unwrap();
      let out = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, &aad).unwrap();
      proptest::prop_assert_eq!(out, pt);
    }

    // Any single-bit flip in the ciphertext must cause AuthFail.
    #[test]
    fn any_ciphertext_bit_flip_fails_auth(
      key in proptest::collection::vec(proptest::prelude::any::<u8>(), 32),
      iv in proptest::collection::vec(proptest::prelude::any::<u8>(), 12),
      pt in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..256),
      flip_index in proptest::prelude::any::<usize>(),
    ) {
      let mut sealed = encrypt(&key, &iv, &pt, &[]).unwrap();
      let idx = flip_index % sealed.ciphertext.len();
      sealed.ciphertext[idx] ^= 0x01;
      let result = decrypt(&key, &iv, &sealed.ciphertext, &sealed.tag, &[]);
      proptest::prop_assert!(matches!(result, Err(OrganizerError::AuthFail)));
    }

    // Distinct IVs produce distinct ciphertext for the same plaintext.
    #[test]
    fn distinct_ivs_give_distinct_ciphertext(
      key in proptest::collection::vec(proptest::prelude::any::<u8>(), 32),
      iv_a in proptest::collection::vec(proptest::prelude::any::<u8>(), 12),
      iv_b in proptest::collection::vec(proptest::prelude::any::<u8>(), 12),
      pt in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..256),
    ) {
      proptest::prop_assume!(iv_a != iv_b);
      let ct_a = encrypt(&key, &iv_a, &pt, &[]).unwrap();
      let ct_b = encrypt(&key, &iv_b, &pt, &[]).unwrap();
      proptest::prop_assert_ne!(ct_a.ciphertext, ct_b.ciphertext);
    }
  }
}

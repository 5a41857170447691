//! Hand-rolled cryptographic primitives: AES-256, GHASH, AES-256-GCM,
//! SHA-256/HMAC-SHA256, PBKDF2-HMAC-SHA256, and the big-integer modular
//! exponentiation SRP-6a is built on.
//!
//! Nothing in this module reaches for a crate that implements the
//! primitive itself; the surrounding engine (vault, sync, config) uses
//! ordinary ecosystem crates for encoding, serialization, and errors.

pub mod aes;
pub mod bigint;
pub mod gcm;
pub mod gf128;
pub mod pbkdf2;
pub mod sha256;

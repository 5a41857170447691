//! organizer-core: the cryptographic and data-integrity engine of a
//! zero-knowledge password manager.
//!
//! This crate implements the four hard pieces a local-first, optionally
//! synced password manager needs, and nothing else — the GUI, the HTTP
//! transport's framing, OS secret storage, and telemetry are external
//! collaborators this crate only defines the interface contracts for:
//!
//! - [`crypto`] — AES-256-GCM (built from a hand-rolled block cipher and
//!   GHASH), SHA-256/HMAC-SHA256, PBKDF2-HMAC-SHA256, and the big-integer
//!   modular exponentiation SRP is built on.
//! - [`srp`] — SRP-6a over the RFC 5054 2048-bit MODP group: client and
//!   server roles for registration, ephemeral exchange, and mutual proof.
//! - [`models`] / [`codec`] — the vault document's types and its
//!   canonical on-disk/wire serialization.
//! - [`vault`] — the vault engine: `create`, `open`, `list`, `add`,
//!   `edit`, `remove`, `change_master_password`, with atomic persistence.
//! - [`sync`] — the client-side sync reconciler (last-writer-wins,
//!   integrity envelope) and its `SyncTransport` contract.
//! - [`server`] — the server-side SRP/auth state machine and an
//!   in-process reference implementation, for testing the full
//!   client/server exchange without a real HTTP transport.
//! - [`keystore`] — the `KeyStore` capability contract for the per-user
//!   device secret, plus in-memory and file-backed implementations.
//! - [`config`] — recognized runtime options and their defaults.
//! - [`error`] — the crate-wide error taxonomy.
//!
//! # Security
//!
//! - The vault key `K` is derived by PBKDF2-HMAC-SHA256 from
//!   `master_password ‖ device_secret` and is never persisted; only
//!   ciphertext is resident in the engine's on-disk state.
//! - `WrongPassword` and `AuthFail` are indistinguishable in timing and
//!   message at the cryptographic layer; only the vault engine's surface
//!   translates one into the other.
//! - Secret material (master password, derived keys, SRP ephemerals) is
//!   wrapped in types that zeroize on drop.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod models;
pub mod server;
pub mod srp;
pub mod sync;
pub mod vault;

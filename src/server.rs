//! The server side of the sync protocol: `/register`,
//! `/login/init`, `/login/verify`, and `/password`. This module defines
//! the message payload shapes and an in-process reference implementation
//! of the server's state machine — the HTTP transport and framing
//! themselves are out of scope and live, if at all, in a binary
//! that wires this module's [`AuthTransport`] impl to an HTTP framework.
//!
//! The reference server ([`InMemoryAuthServer`]) exists to let this
//! crate's test suite exercise a full client/server SRP exchange
//! end-to-end and to give the `/vault` sync
//! surface something real to authenticate against. It stores
//! [`crate::models::SrpRecord`]s and single-use [`crate::models::SrpSession`]s:
//! a session lives from `/login/init` to the
//! next `/login/init` or a successful/failed `/login/verify`, whichever
//! comes first.

use crate::error::{OrganizerError, Result};
use crate::models::{SrpRecord, SrpSession};
use crate::srp;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;

/// `POST /register` body.
pub struct RegisterRequest {
  pub username: String,
  pub salt_hex: String,
  pub verifier_hex: String,
}

/// `POST /login/init` body and response.
pub struct LoginInitRequest {
  pub username: String,
  pub client_public_a_hex: String,
}

pub struct LoginInitResponse {
  pub salt_hex: String,
  pub server_public_b_hex: String,
}

/// `POST /login/verify` body and response.
pub struct LoginVerifyRequest {
  pub username: String,
  pub client_public_a_hex: String,
  pub client_m1_hex: String,
}

pub struct LoginVerifyResponse {
  pub server_m2_hex: String,
  pub token: String,
}

/// `POST /password` body: updates a user's SRP credentials after a
/// successful `change_master_password`. Pushed only after the local
/// rekey has already committed (see DESIGN.md's password-change
/// atomicity discussion).
pub struct UpdatePasswordRequest {
  pub username: String,
  pub salt_hex: String,
  pub verifier_hex: String,
}

/// The authentication half of the sync REST surface: registration and the
/// SRP login handshake. Kept separate from [`crate::sync::SyncTransport`],
/// which only concerns itself with the already-authenticated `/vault`
/// endpoint.
pub trait AuthTransport: Send + Sync {
  fn register(&self, req: RegisterRequest) -> Result<()>;
  fn login_init(&self, req: LoginInitRequest) -> Result<LoginInitResponse>;
  fn login_verify(&self, req: LoginVerifyRequest) -> Result<LoginVerifyResponse>;
  fn update_password(&self, req: UpdatePasswordRequest) -> Result<()>;
}

fn random_token() -> String {
  let mut bytes = [0u8; 32];
  rand::thread_rng().fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// An in-process reference server: a map of registered [`SrpRecord`]s, at
/// most one transient [`SrpSession`] per user, and a set of bearer tokens
/// issued on successful login.
#[derive(Default)]
pub struct InMemoryAuthServer {
  records: Mutex<HashMap<String, SrpRecord>>,
  sessions: Mutex<HashMap<String, SrpSession>>,
  tokens: Mutex<HashMap<String, String>>,
}

impl InMemoryAuthServer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Resolves a bearer token to the username it was issued for, for a
  /// [`crate::sync::SyncTransport`] implementation built on this server to
  /// authorize `/vault` requests.
  pub fn user_for_token(&self, token: &str) -> Option<String> {
    self.tokens.lock().ok()?.get(token).cloned()
  }

  fn lock_err(what: &str) -> OrganizerError {
    OrganizerError::Internal(format!("{what} mutex poisoned"))
  }
}

impl AuthTransport for InMemoryAuthServer {
  #[tracing::instrument(skip(self, req), fields(user = %req.username))]
  fn register(&self, req: RegisterRequest) -> Result<()> {
    let mut records = self.records.lock().map_err(|_| Self::lock_err("records"))?;
    records.insert(
      req.username.clone(),
      SrpRecord { user: req.username, salt_hex: req.salt_hex, verifier_hex: req.verifier_hex },
    );
    tracing::debug!("SRP record registered");
    Ok(())
  }

  #[tracing::instrument(skip(self, req), fields(user = %req.username))]
  fn login_init(&self, req: LoginInitRequest) -> Result<LoginInitResponse> {
    let record = {
      let records = self.records.lock().map_err(|_| Self::lock_err("records"))?;
      records
        .get(&req.username)
        .cloned()
        .ok_or_else(|| OrganizerError::NotFound(format!("no SRP record for user '{}'", req.username)))?
    };

    let server_ephemeral = srp::server_generate_ephemeral(&record.verifier_hex)?;
    let server_public_b_hex = hex::encode(server_ephemeral.public.to_bytes_be_padded(srp::N_LEN)?);

    let session = SrpSession {
      user: req.username.clone(),
      server_ephemeral,
      salt_hex: record.salt_hex.clone(),
      verifier_hex: record.verifier_hex.clone(),
    };

    // Only the most recent /login/init for a user is honored:
    // inserting unconditionally invalidates any prior session.
    let mut sessions = self.sessions.lock().map_err(|_| Self::lock_err("sessions"))?;
    sessions.insert(req.username, session);

    tracing::debug!("login session opened, invalidating any prior session");
    Ok(LoginInitResponse { salt_hex: record.salt_hex, server_public_b_hex })
  }

  #[tracing::instrument(skip(self, req), fields(user = %req.username))]
  fn login_verify(&self, req: LoginVerifyRequest) -> Result<LoginVerifyResponse> {
    // The session is consumed here whether verification succeeds or
    // fails — sessions are single-use.
    let session = {
      let mut sessions = self.sessions.lock().map_err(|_| Self::lock_err("sessions"))?;
      sessions
        .remove(&req.username)
        .ok_or_else(|| OrganizerError::NotFound(format!("no login session for user '{}'", req.username)))?
    };

    let client_public_a = crate::crypto::bigint::BigUint::from_bytes_be(
      &hex::decode(&req.client_public_a_hex)
        .map_err(|e| OrganizerError::InvalidRequest(format!("bad A hex: {e}")))?,
    );
    let client_m1 = hex::decode(&req.client_m1_hex)
      .map_err(|e| OrganizerError::InvalidRequest(format!("bad M1 hex: {e}")))?;

    let result = match srp::server_verify_session(
      &session.verifier_hex,
      &client_public_a,
      &session.server_ephemeral,
      &client_m1,
    ) {
      Ok(r) => r,
      Err(e) => {
        tracing::warn!("login verification failed: client M1 did not match");
        return Err(e);
      }
    };

    let token = random_token();
    let mut tokens = self.tokens.lock().map_err(|_| Self::lock_err("tokens"))?;
    tokens.insert(token.clone(), req.username);

    tracing::debug!("login verified, bearer token issued");
    Ok(LoginVerifyResponse { server_m2_hex: hex::encode(result.m2), token })
  }

  fn update_password(&self, req: UpdatePasswordRequest) -> Result<()> {
    let mut records = self.records.lock().map_err(|_| Self::lock_err("records"))?;
    let record = records
      .get_mut(&req.username)
      .ok_or_else(|| OrganizerError::NotFound(format!("no SRP record for user '{}'", req.username)))?;
    record.salt_hex = req.salt_hex;
    record.verifier_hex = req.verifier_hex;
    Ok(())
  }
}

/// Drives a full client/server SRP registration + login for `username`
/// and `password` against any [`AuthTransport`], returning the session
/// key both sides agree on plus the issued bearer token. Used by this
/// crate's own tests and suitable as a reference for a
/// real client implementation wiring `AuthTransport` to HTTP.
pub fn register_and_login(
  transport: &dyn AuthTransport,
  username: &str,
  password: &[u8],
) -> Result<(String, [u8; 32])> {
  let (salt, verifier_hex) = srp::generate_registration(password);
  transport.register(RegisterRequest {
    username: username.to_string(),
    salt_hex: hex::encode(salt),
    verifier_hex,
  })?;

  login(transport, username, password)
}

/// Runs only the login half (registration already done) — used to test a
/// wrong-password login attempt without re-registering.
pub fn login(
  transport: &dyn AuthTransport,
  username: &str,
  password: &[u8],
) -> Result<(String, [u8; 32])> {
  let client = srp::client_generate_ephemeral();
  let client_public_a_hex = hex::encode(client.public.to_bytes_be_padded(srp::N_LEN)?);

  let init = transport.login_init(LoginInitRequest {
    username: username.to_string(),
    client_public_a_hex: client_public_a_hex.clone(),
  })?;

  let salt = hex::decode(&init.salt_hex)
    .map_err(|e| OrganizerError::InvalidRequest(format!("bad salt hex: {e}")))?;
  let server_public_b = crate::crypto::bigint::BigUint::from_bytes_be(
    &hex::decode(&init.server_public_b_hex)
      .map_err(|e| OrganizerError::InvalidRequest(format!("bad B hex: {e}")))?,
  );

  let session = srp::client_compute_session(&salt, password, client, &server_public_b)?;

  let verify = transport.login_verify(LoginVerifyRequest {
    username: username.to_string(),
    client_public_a_hex,
    client_m1_hex: hex::encode(session.m1),
  })?;

  let expected_m2 = hex::encode(session.m2);
  if verify.server_m2_hex != expected_m2 {
    return Err(OrganizerError::AuthFail);
  }

  Ok((verify.token, session.session_key))
}

//! Password hashing and session token signing
//!
//! # Passwords
//!
//! Passwords are stored as argon2 PHC strings (salt and parameters embedded).
//! Verification goes through argon2's own comparison, which is constant-time.
//! Plaintext never leaves the request that submitted it.
//!
//! # Session tokens
//!
//! A session cookie carries `{session_id}.{signature}` where the signature is
//! the SHA-256 of the session id followed by the server's session secret, as
//! 64 hex characters. Tokens with a bad signature are treated as absent.
//!
//! This module contains only pure functions; the HTTP framework lives in
//! `lrms-web`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ========================================
// Password Hashing
// ========================================

/// Hash a password with a fresh random salt
///
/// # Examples
///
/// ```
/// use lrms_common::credentials::{hash_password, verify_password};
///
/// let hash = hash_password("admin123").unwrap();
/// assert!(hash.starts_with("$argon2"));
/// assert!(verify_password("admin123", &hash));
/// assert!(!verify_password("admin124", &hash));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC hash string.
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ========================================
// Session Token Signing
// ========================================

/// Calculate the signature of a session id
///
/// SHA-256 over `{session_id}{secret}`, as 64 lowercase hex characters.
pub fn sign_session_id(session_id: &Uuid, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.to_string().as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the cookie value for a session id
pub fn session_token(session_id: &Uuid, secret: &str) -> String {
    format!("{}.{}", session_id, sign_session_id(session_id, secret))
}

/// Parse and verify a session token, returning the session id if genuine
///
/// # Examples
///
/// ```
/// use lrms_common::credentials::{session_token, verify_session_token};
/// use uuid::Uuid;
///
/// let id = Uuid::new_v4();
/// let token = session_token(&id, "secret");
/// assert_eq!(verify_session_token(&token, "secret"), Some(id));
/// assert_eq!(verify_session_token(&token, "other"), None);
/// ```
pub fn verify_session_token(token: &str, secret: &str) -> Option<Uuid> {
    let (id, signature) = token.split_once('.')?;
    let id = Uuid::parse_str(id).ok()?;
    let expected = sign_session_id(&id, secret);

    if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        Some(id)
    } else {
        None
    }
}

/// Constant-time equality for byte slices; compares every byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

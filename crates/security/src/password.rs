//! Password hashing with bcrypt.
//!
//! Both functions are CPU-bound; async callers should run them on a
//! blocking thread.

use crate::AuthError;

/// Hash a plaintext password at the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a plaintext password against a stored bcrypt hash.
///
/// A malformed hash is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}

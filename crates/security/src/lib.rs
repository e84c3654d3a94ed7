//! Security module for numthread: password hashing, bearer tokens, and audit logging.
//!
//! Provides:
//! - **Passwords**: bcrypt hashing and verification at a configurable cost
//! - **Tokens**: HS256 JWT bearer tokens carrying the user's id and name
//! - **Audit logging**: Structured records of registrations, logins, and auth failures

pub mod audit;
pub mod password;
pub mod token;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenSigner};

/// Errors raised while hashing passwords or handling tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

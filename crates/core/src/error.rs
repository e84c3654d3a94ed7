//! Error types for the numthread domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::model::{CommentId, DiscussionId};

/// The top-level error type for all numthread operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Write-path validation ---
    #[error(transparent)]
    Operation(#[from] OperationError),

    // --- Storage ---
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    // --- Request validation ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Rejections raised while creating an operation record.
///
/// All of them are raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numbers must be finite")]
    NonFiniteNumber,

    #[error("Parent comment {parent} not found in discussion {discussion}")]
    UnresolvedParent {
        parent: CommentId,
        discussion: DiscussionId,
    },

    #[error("Discussion not found: {0}")]
    UnknownDiscussion(DiscussionId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),
}

//! # numthread Core
//!
//! Domain types, traits, and error definitions for numthread: discussions
//! seeded with a number, and threaded replies that each apply one arithmetic
//! operation to their parent's result.
//!
//! This crate has **no I/O** — storage is a trait implemented elsewhere.
//!
//! ## Pieces
//!
//! - [`operation`]: the arithmetic evaluator, run once per comment at write time
//! - [`tree`]: assembles a flat, creation-ordered comment list into reply trees
//! - [`aggregate`]: groups comments by discussion and attaches each forest
//! - [`thread`]: the write path (validate → resolve → evaluate → insert) and
//!   the aggregated read path
//! - [`store`]: the `DiscussionStore` trait backends implement

pub mod error;
pub mod model;
pub mod operation;
pub mod tree;
pub mod aggregate;
pub mod store;
pub mod thread;

// Re-export key types at crate root for ergonomics
pub use error::{Error, OperationError, Result, StoreError};
pub use model::{
    Comment, CommentDraft, CommentId, Discussion, DiscussionId, NewComment, StoreCounts, User,
    UserCredentials, UserId,
};
pub use operation::{OperationKind, evaluate};
pub use tree::{CommentNode, Forest, TreeAnomaly, build_forest};
pub use aggregate::{Aggregation, DiscussionWithTree, IntegrityReport, aggregate};
pub use store::DiscussionStore;

//! Storage trait — persistence for users, discussions and comments.
//!
//! Backends live in `numthread-store` (SQLite, in-memory). The core only
//! depends on this trait; callers inject an `Arc<dyn DiscussionStore>`.

use async_trait::async_trait;

use crate::error::{OperationError, StoreError};
use crate::model::{
    Comment, CommentId, Discussion, DiscussionId, NewComment, StoreCounts, User, UserCredentials,
    UserId,
};

/// The core DiscussionStore trait.
///
/// Implementations must assign unique, increasing identities and persist a
/// comment together with its result in a single write.
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Register a user. Fails with `UsernameTaken` if the name is in use.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    /// Look up a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Look up a user and their password hash by username.
    async fn find_credentials(&self, username: &str)
    -> Result<Option<UserCredentials>, StoreError>;

    /// Persist a new discussion owned by `owner`.
    async fn insert_discussion(
        &self,
        owner: UserId,
        start_number: f64,
    ) -> Result<Discussion, StoreError>;

    /// Get a discussion by id.
    async fn fetch_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, StoreError>;

    /// All discussions, newest first (ties broken by id, descending).
    async fn fetch_discussions(&self) -> Result<Vec<Discussion>, StoreError>;

    /// Persist a comment with its precomputed result.
    async fn insert_comment(&self, comment: NewComment, result: f64) -> Result<Comment, StoreError>;

    /// Get a comment by id.
    async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    /// All comments, oldest first (ties broken by id, ascending).
    async fn fetch_all_comments(&self) -> Result<Vec<Comment>, StoreError>;

    /// Comments of one discussion, oldest first (ties broken by id, ascending).
    async fn fetch_comments(&self, discussion: DiscussionId) -> Result<Vec<Comment>, StoreError>;

    /// Row counts.
    async fn counts(&self) -> Result<StoreCounts, StoreError>;

    /// The number a new comment applies its operation to.
    ///
    /// That is the parent's stored result when `parent` is given, otherwise
    /// the discussion's start number. The parent must belong to `discussion`.
    async fn resolve_previous_number(
        &self,
        discussion: DiscussionId,
        parent: Option<CommentId>,
    ) -> crate::Result<f64> {
        let seed = self
            .fetch_discussion(discussion)
            .await?
            .ok_or(OperationError::UnknownDiscussion(discussion))?;

        let Some(parent) = parent else {
            return Ok(seed.start_number);
        };

        match self.fetch_comment(parent).await? {
            Some(comment) if comment.discussion_id == discussion => Ok(comment.result),
            _ => Err(OperationError::UnresolvedParent { parent, discussion }.into()),
        }
    }
}

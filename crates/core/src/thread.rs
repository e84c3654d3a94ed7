//! Discussion threads — the write path and the aggregated read path.
//!
//! Writes validate everything before touching storage: the operation token
//! is parsed, the previous number is resolved, the result is evaluated, and
//! only then is the comment inserted together with its result.

use tracing::{info, warn};

use crate::aggregate::{Aggregation, aggregate};
use crate::error::{OperationError, Result};
use crate::model::{Comment, CommentDraft, Discussion, DiscussionId, NewComment, User};
use crate::operation::{OperationKind, evaluate};
use crate::store::DiscussionStore;

/// Start a new discussion owned by `owner`.
pub async fn start_discussion(
    store: &dyn DiscussionStore,
    owner: &User,
    start_number: f64,
) -> Result<Discussion> {
    if !start_number.is_finite() {
        return Err(OperationError::NonFiniteNumber.into());
    }

    let discussion = store.insert_discussion(owner.id, start_number).await?;
    info!(
        discussion = %discussion.id,
        owner = %owner.username,
        start_number,
        "Discussion started"
    );
    Ok(discussion)
}

/// Validate a comment draft, compute its result and persist it.
pub async fn post_comment(
    store: &dyn DiscussionStore,
    author: &User,
    draft: CommentDraft,
) -> Result<Comment> {
    let operation: OperationKind = draft.operation.parse()?;
    if !draft.operand.is_finite() {
        return Err(OperationError::NonFiniteNumber.into());
    }

    let previous = store
        .resolve_previous_number(draft.discussion_id, draft.parent_id)
        .await?;
    let result = evaluate(previous, operation, draft.operand)?;

    let comment = store
        .insert_comment(
            NewComment {
                discussion_id: draft.discussion_id,
                parent_id: draft.parent_id,
                user_id: author.id,
                operation,
                operand: draft.operand,
            },
            result,
        )
        .await?;

    info!(
        comment = %comment.id,
        discussion = %comment.discussion_id,
        operation = %operation,
        previous,
        result,
        "Comment posted"
    );
    Ok(comment)
}

/// All discussions, newest first, each with its reply forest.
pub async fn load_discussions(store: &dyn DiscussionStore) -> Result<Aggregation> {
    let discussions = store.fetch_discussions().await?;
    let comments = store.fetch_all_comments().await?;
    let aggregation = aggregate(discussions, comments);
    log_report(&aggregation);
    Ok(aggregation)
}

/// A single discussion with its reply forest and integrity report, or `None`
/// if it does not exist. The aggregation holds exactly one discussion.
pub async fn load_discussion(
    store: &dyn DiscussionStore,
    id: DiscussionId,
) -> Result<Option<Aggregation>> {
    let Some(discussion) = store.fetch_discussion(id).await? else {
        return Ok(None);
    };
    let comments = store.fetch_comments(id).await?;
    let aggregation = aggregate(vec![discussion], comments);
    log_report(&aggregation);
    Ok(Some(aggregation))
}

fn log_report(aggregation: &Aggregation) {
    if !aggregation.report.is_clean() {
        warn!(
            orphaned = aggregation.report.orphaned_comments.len(),
            anomalies = aggregation.report.tree_anomalies.len(),
            "Discussion data has integrity issues"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, StoreError};
    use crate::model::{CommentId, StoreCounts, UserCredentials, UserId};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::result::Result;
    use std::sync::Mutex;

    /// Minimal vector-backed store for exercising the write path.
    #[derive(Default)]
    struct MockStore {
        discussions: Mutex<Vec<Discussion>>,
        comments: Mutex<Vec<Comment>>,
        inserts: Mutex<usize>,
    }

    #[async_trait]
    impl DiscussionStore for MockStore {
        fn name(&self) -> &str {
            "mock"
        }

        async fn create_user(&self, username: &str, _hash: &str) -> Result<User, StoreError> {
            Ok(User {
                id: UserId(1),
                username: username.into(),
            })
        }

        async fn find_user(&self, _id: UserId) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_credentials(
            &self,
            _username: &str,
        ) -> Result<Option<UserCredentials>, StoreError> {
            Ok(None)
        }

        async fn insert_discussion(
            &self,
            owner: UserId,
            start_number: f64,
        ) -> Result<Discussion, StoreError> {
            let mut discussions = self.discussions.lock().unwrap();
            let discussion = Discussion {
                id: DiscussionId(discussions.len() as i64 + 1),
                user_id: owner,
                username: "owner".into(),
                start_number,
                created_at: Utc::now(),
            };
            discussions.push(discussion.clone());
            Ok(discussion)
        }

        async fn fetch_discussion(
            &self,
            id: DiscussionId,
        ) -> Result<Option<Discussion>, StoreError> {
            let discussions = self.discussions.lock().unwrap();
            Ok(discussions.iter().find(|d| d.id == id).cloned())
        }

        async fn fetch_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
            let mut discussions = self.discussions.lock().unwrap().clone();
            discussions.reverse();
            Ok(discussions)
        }

        async fn insert_comment(
            &self,
            comment: NewComment,
            result: f64,
        ) -> Result<Comment, StoreError> {
            *self.inserts.lock().unwrap() += 1;
            let mut comments = self.comments.lock().unwrap();
            let stored = Comment {
                id: CommentId(comments.len() as i64 + 1),
                discussion_id: comment.discussion_id,
                parent_id: comment.parent_id,
                user_id: comment.user_id,
                username: "author".into(),
                operation: comment.operation,
                operand: comment.operand,
                result,
                created_at: Utc::now(),
            };
            comments.push(stored.clone());
            Ok(stored)
        }

        async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
            let comments = self.comments.lock().unwrap();
            Ok(comments.iter().find(|c| c.id == id).cloned())
        }

        async fn fetch_all_comments(&self) -> Result<Vec<Comment>, StoreError> {
            Ok(self.comments.lock().unwrap().clone())
        }

        async fn fetch_comments(
            &self,
            discussion: DiscussionId,
        ) -> Result<Vec<Comment>, StoreError> {
            let comments = self.comments.lock().unwrap();
            Ok(comments
                .iter()
                .filter(|c| c.discussion_id == discussion)
                .cloned()
                .collect())
        }

        async fn counts(&self) -> Result<StoreCounts, StoreError> {
            Ok(StoreCounts {
                users: 1,
                discussions: self.discussions.lock().unwrap().len() as u64,
                comments: self.comments.lock().unwrap().len() as u64,
            })
        }
    }

    fn author() -> User {
        User {
            id: UserId(1),
            username: "ada".into(),
        }
    }

    fn draft(discussion: i64, parent: Option<i64>, op: &str, operand: f64) -> CommentDraft {
        CommentDraft {
            discussion_id: DiscussionId(discussion),
            parent_id: parent.map(CommentId),
            operation: op.into(),
            operand,
        }
    }

    #[tokio::test]
    async fn chained_results_use_stored_parent_result() {
        let store = MockStore::default();
        let d = start_discussion(&store, &author(), 100.0).await.unwrap();

        let a = post_comment(&store, &author(), draft(d.id.0, None, "SUBTRACT", 20.0))
            .await
            .unwrap();
        assert_eq!(a.result, 80.0);

        let b = post_comment(&store, &author(), draft(d.id.0, Some(a.id.0), "MULTIPLY", 2.0))
            .await
            .unwrap();
        assert_eq!(b.result, 160.0);
        assert_eq!(b.parent_id, Some(a.id));
    }

    #[tokio::test]
    async fn invalid_operation_writes_nothing() {
        let store = MockStore::default();
        let d = start_discussion(&store, &author(), 10.0).await.unwrap();

        let err = post_comment(&store, &author(), draft(d.id.0, None, "MOD", 5.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::InvalidOperation(ref t)) if t == "MOD"
        ));
        assert_eq!(*store.inserts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn division_by_zero_writes_nothing() {
        let store = MockStore::default();
        let d = start_discussion(&store, &author(), 10.0).await.unwrap();

        let err = post_comment(&store, &author(), draft(d.id.0, None, "DIVIDE", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::DivisionByZero)
        ));
        assert_eq!(*store.inserts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_discussion_rejected() {
        let store = MockStore::default();
        let err = post_comment(&store, &author(), draft(42, None, "ADD", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::UnknownDiscussion(DiscussionId(42)))
        ));
    }

    #[tokio::test]
    async fn parent_from_other_discussion_rejected() {
        let store = MockStore::default();
        let first = start_discussion(&store, &author(), 1.0).await.unwrap();
        let second = start_discussion(&store, &author(), 2.0).await.unwrap();
        let c = post_comment(&store, &author(), draft(first.id.0, None, "ADD", 1.0))
            .await
            .unwrap();

        let err = post_comment(&store, &author(), draft(second.id.0, Some(c.id.0), "ADD", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::UnresolvedParent { .. })
        ));
        assert_eq!(*store.inserts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn non_finite_seed_rejected() {
        let store = MockStore::default();
        let err = start_discussion(&store, &author(), f64::INFINITY)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::NonFiniteNumber)
        ));
    }

    #[tokio::test]
    async fn load_discussions_builds_trees() {
        let store = MockStore::default();
        let d = start_discussion(&store, &author(), 10.0).await.unwrap();
        let r1 = post_comment(&store, &author(), draft(d.id.0, None, "ADD", 5.0))
            .await
            .unwrap();
        post_comment(&store, &author(), draft(d.id.0, Some(r1.id.0), "MULTIPLY", 3.0))
            .await
            .unwrap();
        post_comment(&store, &author(), draft(d.id.0, None, "SUBTRACT", 2.0))
            .await
            .unwrap();

        let aggregation = load_discussions(&store).await.unwrap();
        let comments = &aggregation.discussions[0].comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment.result, 15.0);
        assert_eq!(comments[0].children[0].comment.result, 45.0);
        assert_eq!(comments[1].comment.result, 8.0);
        assert!(aggregation.report.is_clean());
    }

    #[tokio::test]
    async fn load_missing_discussion_is_none() {
        let store = MockStore::default();
        assert!(load_discussion(&store, DiscussionId(5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_discussion_carries_integrity_report() {
        let store = MockStore::default();
        let d = start_discussion(&store, &author(), 10.0).await.unwrap();
        post_comment(&store, &author(), draft(d.id.0, None, "ADD", 5.0))
            .await
            .unwrap();
        // Written behind the validator's back, pointing at nothing.
        store
            .insert_comment(
                NewComment {
                    discussion_id: d.id,
                    parent_id: Some(CommentId(99)),
                    user_id: UserId(1),
                    operation: OperationKind::Add,
                    operand: 1.0,
                },
                2.0,
            )
            .await
            .unwrap();

        let aggregation = load_discussion(&store, d.id).await.unwrap().unwrap();
        assert_eq!(aggregation.discussions.len(), 1);
        assert_eq!(aggregation.discussions[0].comments.len(), 2);
        assert_eq!(aggregation.report.issue_count(), 1);
        assert_eq!(
            aggregation.report.tree_anomalies,
            vec![(
                d.id,
                crate::tree::TreeAnomaly::DanglingParent {
                    comment: CommentId(2),
                    parent: CommentId(99),
                }
            )]
        );
    }
}

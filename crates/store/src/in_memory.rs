//! In-memory backend — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use numthread_core::error::StoreError;
use numthread_core::model::{
    Comment, CommentId, Discussion, DiscussionId, NewComment, StoreCounts, User, UserCredentials,
    UserId,
};
use numthread_core::store::DiscussionStore;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    discussions: Vec<Discussion>,
    comments: Vec<Comment>,
}

impl Tables {
    fn username(&self, id: UserId) -> Result<String, StoreError> {
        self.users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.username.clone())
            .ok_or_else(|| StoreError::Storage(format!("user {id} does not exist")))
    }
}

/// An in-memory store that keeps every table in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscussionStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.user.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }

        let user = User {
            id: UserId(tables.users.len() as i64 + 1),
            username: username.to_string(),
        };
        tables.users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        });
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.username == username)
            .cloned())
    }

    async fn insert_discussion(
        &self,
        owner: UserId,
        start_number: f64,
    ) -> Result<Discussion, StoreError> {
        let mut tables = self.tables.write().await;
        let discussion = Discussion {
            id: DiscussionId(tables.discussions.len() as i64 + 1),
            user_id: owner,
            username: tables.username(owner)?,
            start_number,
            created_at: Utc::now(),
        };
        tables.discussions.push(discussion.clone());
        Ok(discussion)
    }

    async fn fetch_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.discussions.iter().find(|d| d.id == id).cloned())
    }

    async fn fetch_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
        let mut discussions = self.tables.read().await.discussions.clone();
        discussions.sort_by_key(|d| std::cmp::Reverse(d.creation_key()));
        Ok(discussions)
    }

    async fn insert_comment(&self, comment: NewComment, result: f64) -> Result<Comment, StoreError> {
        let mut tables = self.tables.write().await;

        // Mirror the foreign keys of the SQL schema.
        if !tables
            .discussions
            .iter()
            .any(|d| d.id == comment.discussion_id)
        {
            return Err(StoreError::Storage(format!(
                "discussion {} does not exist",
                comment.discussion_id
            )));
        }
        if let Some(parent) = comment.parent_id
            && !tables.comments.iter().any(|c| c.id == parent)
        {
            return Err(StoreError::Storage(format!(
                "parent comment {parent} does not exist"
            )));
        }

        let stored = Comment {
            id: CommentId(tables.comments.len() as i64 + 1),
            discussion_id: comment.discussion_id,
            parent_id: comment.parent_id,
            user_id: comment.user_id,
            username: tables.username(comment.user_id)?,
            operation: comment.operation,
            operand: comment.operand,
            result,
            created_at: Utc::now(),
        };
        tables.comments.push(stored.clone());
        Ok(stored)
    }

    async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn fetch_all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        let mut comments = self.tables.read().await.comments.clone();
        comments.sort_by_key(Comment::creation_key);
        Ok(comments)
    }

    async fn fetch_comments(&self, discussion: DiscussionId) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.discussion_id == discussion)
            .cloned()
            .collect();
        comments.sort_by_key(Comment::creation_key);
        Ok(comments)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            users: tables.users.len() as u64,
            discussions: tables.discussions.len() as u64,
            comments: tables.comments.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numthread_core::OperationKind;

    async fn seeded() -> (InMemoryStore, User, Discussion) {
        let store = InMemoryStore::new();
        let user = store.create_user("ada", "hash").await.unwrap();
        let discussion = store.insert_discussion(user.id, 10.0).await.unwrap();
        (store, user, discussion)
    }

    fn new_comment(discussion: &Discussion, user: &User, parent: Option<CommentId>) -> NewComment {
        NewComment {
            discussion_id: discussion.id,
            parent_id: parent,
            user_id: user.id,
            operation: OperationKind::Add,
            operand: 1.0,
        }
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let store = InMemoryStore::new();
        store.create_user("ada", "h1").await.unwrap();
        let err = store.create_user("ada", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(ref name) if name == "ada"));
    }

    #[tokio::test]
    async fn credentials_lookup() {
        let store = InMemoryStore::new();
        let user = store.create_user("ada", "secret-hash").await.unwrap();
        let creds = store.find_credentials("ada").await.unwrap().unwrap();
        assert_eq!(creds.user, user);
        assert_eq!(creds.password_hash, "secret-hash");
        assert!(store.find_credentials("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn discussion_carries_owner_name() {
        let (_, user, discussion) = seeded().await;
        assert_eq!(discussion.username, user.username);
        assert_eq!(discussion.start_number, 10.0);
    }

    #[tokio::test]
    async fn discussions_newest_first() {
        let (store, user, first) = seeded().await;
        let second = store.insert_discussion(user.id, 20.0).await.unwrap();
        let listed = store.fetch_discussions().await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn comments_oldest_first_per_discussion() {
        let (store, user, discussion) = seeded().await;
        let other = store.insert_discussion(user.id, 0.0).await.unwrap();
        let a = store
            .insert_comment(new_comment(&discussion, &user, None), 11.0)
            .await
            .unwrap();
        store
            .insert_comment(new_comment(&other, &user, None), 1.0)
            .await
            .unwrap();
        let b = store
            .insert_comment(new_comment(&discussion, &user, Some(a.id)), 12.0)
            .await
            .unwrap();

        let ids: Vec<CommentId> = store
            .fetch_comments(discussion.id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(store.fetch_all_comments().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn foreign_keys_enforced() {
        let (store, user, discussion) = seeded().await;
        let mut orphan = new_comment(&discussion, &user, None);
        orphan.discussion_id = DiscussionId(99);
        assert!(store.insert_comment(orphan, 0.0).await.is_err());

        let dangling = new_comment(&discussion, &user, Some(CommentId(7)));
        assert!(store.insert_comment(dangling, 0.0).await.is_err());
    }

    #[tokio::test]
    async fn resolve_previous_number_uses_seed_and_parent() {
        let (store, user, discussion) = seeded().await;
        assert_eq!(
            store
                .resolve_previous_number(discussion.id, None)
                .await
                .unwrap(),
            10.0
        );

        let c = store
            .insert_comment(new_comment(&discussion, &user, None), 11.0)
            .await
            .unwrap();
        assert_eq!(
            store
                .resolve_previous_number(discussion.id, Some(c.id))
                .await
                .unwrap(),
            11.0
        );
        assert!(
            store
                .resolve_previous_number(DiscussionId(5), None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn counts_track_inserts() {
        let (store, user, discussion) = seeded().await;
        store
            .insert_comment(new_comment(&discussion, &user, None), 11.0)
            .await
            .unwrap();
        assert_eq!(
            store.counts().await.unwrap(),
            StoreCounts {
                users: 1,
                discussions: 1,
                comments: 1,
            }
        );
        assert_eq!(store.name(), "in_memory");
    }
}

//! Persistent records: users, discussions and operation records ("comments").
//!
//! Identities are assigned by storage and wrapped in newtypes so a discussion
//! id can never be passed where a comment id is expected. All records
//! serialize with camelCase keys, which is the wire format of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::OperationKind;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identity of a registered user.
    UserId
);
id_type!(
    /// Identity of a discussion.
    DiscussionId
);
id_type!(
    /// Identity of an operation record.
    CommentId
);

/// A registered user as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// A user together with the stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A discussion seeded with a start number. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub id: DiscussionId,
    pub user_id: UserId,
    /// Owner's username, joined at read time.
    pub username: String,
    pub start_number: f64,
    pub created_at: DateTime<Utc>,
}

/// One arithmetic step replying to a discussion or to another comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub discussion_id: DiscussionId,
    /// `None` attaches the comment directly to the discussion seed.
    pub parent_id: Option<CommentId>,
    pub user_id: UserId,
    pub username: String,
    pub operation: OperationKind,
    pub operand: f64,
    /// Computed once at insertion and never recomputed.
    pub result: f64,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Sort key for creation order: timestamp, then identity for ties.
    pub fn creation_key(&self) -> (DateTime<Utc>, CommentId) {
        (self.created_at, self.id)
    }
}

impl Discussion {
    /// Sort key for creation order: timestamp, then identity for ties.
    pub fn creation_key(&self) -> (DateTime<Utc>, DiscussionId) {
        (self.created_at, self.id)
    }
}

/// A validated operation record awaiting insertion.
///
/// The store assigns the identity and the creation timestamp; the result is
/// passed alongside so both are persisted in one write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub discussion_id: DiscussionId,
    pub parent_id: Option<CommentId>,
    pub user_id: UserId,
    pub operation: OperationKind,
    pub operand: f64,
}

/// Unvalidated comment input as received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    pub discussion_id: DiscussionId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub operation: String,
    pub operand: f64,
}

/// Row counts per table, reported by health checks and `numthread status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub users: u64,
    pub discussions: u64,
    pub comments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_serializes_camel_case() {
        let comment = Comment {
            id: CommentId(2),
            discussion_id: DiscussionId(1),
            parent_id: None,
            user_id: UserId(9),
            username: "ada".into(),
            operation: OperationKind::Multiply,
            operand: 3.0,
            result: 45.0,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["discussionId"], 1);
        assert!(json["parentId"].is_null());
        assert_eq!(json["operation"], "MULTIPLY");
        assert_eq!(json["result"], 45.0);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn draft_parent_is_optional() {
        let draft: CommentDraft = serde_json::from_str(
            r#"{"discussionId": 4, "operation": "ADD", "operand": 1.5}"#,
        )
        .unwrap();
        assert_eq!(draft.discussion_id, DiscussionId(4));
        assert!(draft.parent_id.is_none());
        assert_eq!(draft.operation, "ADD");
    }

    #[test]
    fn ids_are_transparent_numbers() {
        assert_eq!(serde_json::to_string(&CommentId(12)).unwrap(), "12");
        assert_eq!(DiscussionId(5).to_string(), "5");
    }
}

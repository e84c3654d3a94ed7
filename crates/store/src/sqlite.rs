//! SQLite backend.
//!
//! Uses a single SQLite database file with three tables:
//! - `users` — registered users and their password hashes
//! - `discussions` — seed numbers, one row per discussion
//! - `comments` — operation records, each naming its discussion and
//!   optionally a parent comment (adjacency list)
//!
//! Timestamps are stored as fixed-width RFC 3339 text with microseconds, so
//! lexical order is chronological order. Reads join `users` for usernames.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use numthread_core::error::StoreError;
use numthread_core::model::{
    Comment, CommentId, Discussion, DiscussionId, NewComment, StoreCounts, User, UserCredentials,
    UserId,
};
use numthread_core::operation::OperationKind;
use numthread_core::store::DiscussionStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const DISCUSSION_COLUMNS: &str = r#"
    SELECT d.id, d.user_id, u.username, d.start_number, d.created_at
    FROM discussions d
    JOIN users u ON u.id = d.user_id
"#;

const COMMENT_COLUMNS: &str = r#"
    SELECT c.id, c.discussion_id, c.parent_id, c.user_id, u.username,
           c.operation, c.operand, c.result, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

/// A production SQLite discussion store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite store from a path or `sqlite:` URL.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests); it is served by a single connection so every query sees
    /// the same database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let in_memory = path.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations — creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                username      TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS discussions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL REFERENCES users(id),
                start_number REAL NOT NULL,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("discussions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                discussion_id INTEGER NOT NULL REFERENCES discussions(id),
                parent_id     INTEGER REFERENCES comments(id),
                user_id       INTEGER NOT NULL REFERENCES users(id),
                operation     TEXT NOT NULL
                              CHECK (operation IN ('ADD', 'SUBTRACT', 'MULTIPLY', 'DIVIDE')),
                operand       REAL NOT NULL,
                result        REAL NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("comments table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_discussions_created_at ON discussions(created_at DESC, id DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("discussions index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_discussion ON comments(discussion_id, created_at, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("comments index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    /// Parse a `Discussion` from a joined row.
    fn row_to_discussion(row: &sqlx::sqlite::SqliteRow) -> Result<Discussion, StoreError> {
        let created_at: String = Self::column(row, "created_at")?;
        Ok(Discussion {
            id: DiscussionId(Self::column(row, "id")?),
            user_id: UserId(Self::column(row, "user_id")?),
            username: Self::column(row, "username")?,
            start_number: Self::column(row, "start_number")?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    /// Parse a `Comment` from a joined row.
    fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<Comment, StoreError> {
        let operation: String = Self::column(row, "operation")?;
        let operation = OperationKind::from_str(&operation)
            .map_err(|e| StoreError::QueryFailed(format!("operation column: {e}")))?;
        let parent_id: Option<i64> = Self::column(row, "parent_id")?;
        let created_at: String = Self::column(row, "created_at")?;

        Ok(Comment {
            id: CommentId(Self::column(row, "id")?),
            discussion_id: DiscussionId(Self::column(row, "discussion_id")?),
            parent_id: parent_id.map(CommentId),
            user_id: UserId(Self::column(row, "user_id")?),
            username: Self::column(row, "username")?,
            operation,
            operand: Self::column(row, "operand")?,
            result: Self::column(row, "result")?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT {table}: {e}")))?;
        let n: i64 = Self::column(&row, "n")?;
        Ok(n as u64)
    }
}

#[async_trait]
impl DiscussionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let outcome = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Self::timestamp(Utc::now()))
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(done) => {
                let id = UserId(done.last_insert_rowid());
                debug!("Created user {id}");
                Ok(User {
                    id,
                    username: username.to_string(),
                })
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::UsernameTaken(username.to_string()))
            }
            Err(e) => Err(StoreError::Storage(format!("INSERT user failed: {e}"))),
        }
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username FROM users WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT user: {e}")))?;

        row.map(|row| {
            Ok(User {
                id: UserId(Self::column(&row, "id")?),
                username: Self::column(&row, "username")?,
            })
        })
        .transpose()
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT credentials: {e}")))?;

        row.map(|row| {
            let created_at: String = Self::column(&row, "created_at")?;
            Ok(UserCredentials {
                user: User {
                    id: UserId(Self::column(&row, "id")?),
                    username: Self::column(&row, "username")?,
                },
                password_hash: Self::column(&row, "password_hash")?,
                created_at: Self::parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    async fn insert_discussion(
        &self,
        owner: UserId,
        start_number: f64,
    ) -> Result<Discussion, StoreError> {
        let done = sqlx::query(
            "INSERT INTO discussions (user_id, start_number, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(owner.0)
        .bind(start_number)
        .bind(Self::timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT discussion failed: {e}")))?;

        let id = DiscussionId(done.last_insert_rowid());
        self.fetch_discussion(id)
            .await?
            .ok_or_else(|| StoreError::Storage(format!("discussion {id} vanished after insert")))
    }

    async fn fetch_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, StoreError> {
        let row = sqlx::query(&format!("{DISCUSSION_COLUMNS} WHERE d.id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT discussion: {e}")))?;

        row.as_ref().map(Self::row_to_discussion).transpose()
    }

    async fn fetch_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
        let rows = sqlx::query(&format!(
            "{DISCUSSION_COLUMNS} ORDER BY d.created_at DESC, d.id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT discussions: {e}")))?;

        rows.iter().map(Self::row_to_discussion).collect()
    }

    async fn insert_comment(&self, comment: NewComment, result: f64) -> Result<Comment, StoreError> {
        let done = sqlx::query(
            r#"
            INSERT INTO comments (discussion_id, parent_id, user_id, operation, operand, result, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(comment.discussion_id.0)
        .bind(comment.parent_id.map(|p| p.0))
        .bind(comment.user_id.0)
        .bind(comment.operation.as_str())
        .bind(comment.operand)
        .bind(result)
        .bind(Self::timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT comment failed: {e}")))?;

        let id = CommentId(done.last_insert_rowid());
        debug!("Stored comment {id}");
        self.fetch_comment(id)
            .await?
            .ok_or_else(|| StoreError::Storage(format!("comment {id} vanished after insert")))
    }

    async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query(&format!("{COMMENT_COLUMNS} WHERE c.id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT comment: {e}")))?;

        row.as_ref().map(Self::row_to_comment).transpose()
    }

    async fn fetch_all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(&format!("{COMMENT_COLUMNS} ORDER BY c.created_at ASC, c.id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT comments: {e}")))?;

        rows.iter().map(Self::row_to_comment).collect()
    }

    async fn fetch_comments(&self, discussion: DiscussionId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(&format!(
            "{COMMENT_COLUMNS} WHERE c.discussion_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(discussion.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT discussion comments: {e}")))?;

        rows.iter().map(Self::row_to_comment).collect()
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            users: self.count_rows("users").await?,
            discussions: self.count_rows("discussions").await?,
            comments: self.count_rows("comments").await?,
        })
    }
}

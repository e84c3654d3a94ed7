//! Storage backends for numthread.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use numthread_config::DatabaseConfig;
use numthread_core::error::StoreError;
use numthread_core::store::DiscussionStore;
use std::sync::Arc;

/// Open the backend selected by `config.backend`.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DiscussionStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(dir) = config.path.parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", dir.display()))
                })?;
            }
            let url = format!("sqlite://{}", config.path.display());
            Ok(Arc::new(SqliteStore::new(&url).await?))
        }
        other => Err(StoreError::Storage(format!(
            "Storage backend '{other}' is not available"
        ))),
    }
}

//! Item storage: the record type, the [`ItemStore`] contract, and its SQLite
//! implementation.
//!
//! Store calls are synchronous. Async callers go through [`blocking`], which
//! runs them on tokio's blocking pool.

use std::sync::Arc;

use thiserror::Error;

mod item;
pub mod migrations;
mod sqlite;

pub use item::{Item, ItemChanges, ItemId, NewItem};
pub use sqlite::SqliteItemStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by item storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("invalid persisted item data: {0}")]
    InvalidData(String),

    #[error("store task failed: {0}")]
    Join(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Persistent CRUD over [`Item`]s.
pub trait ItemStore: Send + Sync {
    /// Inserts an item with `completed = false` and `created = now`.
    fn create(&self, item: &NewItem) -> StoreResult<Item>;

    /// Loads one item; [`StoreError::NotFound`] when absent.
    fn get(&self, id: ItemId) -> StoreResult<Item>;

    /// Every stored item, in storage order.
    fn list(&self) -> StoreResult<Vec<Item>>;

    /// Overwrites the mutable fields of `id` and returns the stored result.
    fn update(&self, id: ItemId, changes: &ItemChanges) -> StoreResult<Item>;

    /// Permanently removes `id`.
    fn delete(&self, id: ItemId) -> StoreResult<()>;
}

/// The store handle shared between request handlers and task workers.
pub type SharedStore = Arc<dyn ItemStore>;

/// Runs `f` against `store` on the blocking thread pool.
///
/// # Errors
///
/// Whatever `f` returns, or [`StoreError::Join`] if it panicked.
pub async fn blocking<T, F>(store: &SharedStore, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ItemStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|err| StoreError::Join(err.to_string()))?
}

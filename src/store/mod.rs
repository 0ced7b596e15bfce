//! Persistence of the last observed status code per monitor.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;
pub mod retry;

pub use memory::MemoryStatusStore;
pub use postgres::PgStatusStore;
pub use retry::{
    ConnectionResetRetryClassifier, DefaultRetryClassifier, RetryClassifier, RetryPolicy,
    RetryingStore,
};

/// Returned by [`StatusStore::get_status`] when no record exists for a key.
pub const NOT_FOUND: i32 = -1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Deadline exceeded while {0}")]
    DeadlineExceeded(&'static str),
}

/// Key/value store mapping a monitor name to its last observed status code.
///
/// Implementations must be safe to share between concurrently running checks.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Last stored status code for `key`, or [`NOT_FOUND`] when there is none.
    async fn get_status(&self, key: &str) -> Result<i32, StoreError>;

    /// Creates or overwrites the record for `key`.
    async fn save_status(&self, key: &str, status_code: i32) -> Result<(), StoreError>;
}


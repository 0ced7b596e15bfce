//! Retry wrapper for status store backends.
//!
//! The default classification retries what the database driver reports as
//! temporary (pool exhaustion, I/O timeouts, throttling SQLSTATEs). On top of
//! that, [`ConnectionResetRetryClassifier`] also retries resets by the peer,
//! which surface from load balancers and managed endpoints that recycle idle
//! connections, often wrapped several layers deep.

use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{StatusStore, StoreError};

const CONNECTION_RESET_SIGNATURE: &str = "connection reset by peer";

// serialization_failure, deadlock_detected, too_many_connections, cannot_connect_now
const RETRYABLE_SQLSTATES: &[&str] = &["40001", "40P01", "53300", "57P03"];

/// Decides whether a failed store call is worth another attempt.
pub trait RetryClassifier: Send + Sync {
    fn should_retry(&self, error: &StoreError) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn should_retry(&self, error: &StoreError) -> bool {
        match error {
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            StoreError::Database(sqlx::Error::Io(e)) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            StoreError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|state| *state == &*code)),
            _ => false,
        }
    }
}

/// Extends a base classifier so connection resets are always retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionResetRetryClassifier<C = DefaultRetryClassifier> {
    base: C,
}

impl<C: RetryClassifier> ConnectionResetRetryClassifier<C> {
    pub fn new(base: C) -> Self {
        Self { base }
    }
}

impl<C: RetryClassifier> RetryClassifier for ConnectionResetRetryClassifier<C> {
    fn should_retry(&self, error: &StoreError) -> bool {
        is_connection_reset(error) || self.base.should_retry(error)
    }
}

/// Walks the error and its chain of causes looking for a reset by the peer.
pub fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if io_err.kind() == io::ErrorKind::ConnectionReset {
            return true;
        }
    }
    if err.to_string().contains(CONNECTION_RESET_SIGNATURE) {
        return true;
    }
    match err.source() {
        Some(cause) => is_connection_reset(cause),
        None => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts made after the first failure.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// A [`StatusStore`] that retries classified-transient failures of `inner`
/// with exponential backoff. The last error is returned unchanged once the
/// retries run out.
pub struct RetryingStore<S, C = ConnectionResetRetryClassifier> {
    inner: S,
    classifier: C,
    policy: RetryPolicy,
}

impl<S: StatusStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self::with_classifier(inner, ConnectionResetRetryClassifier::default(), policy)
    }
}

impl<S: StatusStore, C: RetryClassifier> RetryingStore<S, C> {
    pub fn with_classifier(inner: S, classifier: C, policy: RetryPolicy) -> Self {
        Self {
            inner,
            classifier,
            policy,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, key: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        let mut backoff = self.policy.initial_backoff;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_retries && self.classifier.should_retry(&e) => {
                    attempt += 1;
                    warn!(
                        operation,
                        key,
                        attempt,
                        max_retries = self.policy.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient status store error, retrying."
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<S: StatusStore, C: RetryClassifier> StatusStore for RetryingStore<S, C> {
    async fn get_status(&self, key: &str) -> Result<i32, StoreError> {
        self.run("get_status", key, || self.inner.get_status(key)).await
    }

    async fn save_status(&self, key: &str, status_code: i32) -> Result<(), StoreError> {
        self.run("save_status", key, || self.inner.save_status(key, status_code))
            .await
    }
}

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StorageError;

/// Runs an idempotent read, retrying it once after `backoff` when the first
/// attempt fails with a transient error. Never use this for writes.
pub async fn with_read_retry<T, F, Fut>(
    operation: &str,
    backoff: Duration,
    mut read: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    match read().await {
        Err(e) if e.is_transient() => {
            warn!("{} failed ({}), retrying once in {:?}", operation, e, backoff);
            tokio::time::sleep(backoff).await;
            read().await
        }
        other => other,
    }
}

//! Timeout enforcement.
//!
//! Every adapter call runs under an explicit deadline. Elapsed deadlines
//! become `BackendError::Timeout`; dropping the inner future abandons the
//! in-flight call.

use std::future::Future;
use std::time::Duration;

use crate::backends::{BackendError, BackendId, BackendResult};

/// Run `fut` under `limit`, mapping expiry to a typed timeout error.
pub async fn with_deadline<T, F>(backend: BackendId, limit: Duration, fut: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            backend,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

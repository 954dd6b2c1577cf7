//! Timeout helper for worker tasks.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::TandemError;

/// Await a worker task, aborting it if `timeout` elapses first.
///
/// A worker that panics or is cancelled surfaces as a transport error.
pub async fn join_worker<T>(
    worker: JoinHandle<Result<T, TandemError>>,
    timeout: Option<Duration>,
) -> Result<T, TandemError> {
    let abort = worker.abort_handle();
    let joined = match timeout {
        Some(duration) => match tokio::time::timeout(duration, worker).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                return Err(TandemError::Timeout(duration.as_millis() as u64));
            }
        },
        None => worker.await,
    };
    joined.map_err(|e| TandemError::Transport(format!("transport worker failed: {e}")))?
}

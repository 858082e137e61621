//! Task spawning.
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

use std::future::Future;

use futures::future::{self, Either};

use crate::sync::CancellationToken;

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current Tokio runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Drives `future` until it completes or `token` is cancelled.
///
/// Returns `None` when the token fired first. The future is dropped at that
/// point, which aborts any I/O it owns.
pub async fn with_cancellation<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    let cancelled = token.cancelled();
    futures::pin_mut!(future);
    futures::pin_mut!(cancelled);

    match future::select(future, cancelled).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;

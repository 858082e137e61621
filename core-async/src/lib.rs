//! Async runtime abstraction layer for the sheet sync workspace.
//!
//! Every `core-*` and `provider-*` crate depends on this crate instead of
//! naming Tokio directly. The re-exports keep one place to pin runtime
//! behaviour (timers, channels, cancellation) for the whole workspace.
//!
//! # Modules
//!
//! - `task`: task spawning
//! - `time`: sleep, timeouts, intervals and instants
//! - `sync`: locks, channels and [`sync::CancellationToken`]
//! - `runtime`: `block_on` for synchronous entry points and tests
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task::with_cancellation;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let outcome = with_cancellation(&token, async {
//!         sleep(Duration::from_millis(5)).await;
//!         42
//!     })
//!     .await;
//!     assert_eq!(outcome, Some(42));
//! }
//! ```

pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

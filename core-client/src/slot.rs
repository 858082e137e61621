//! Last-request-wins cancellation.

use core_async::sync::{CancellationToken, Mutex};

/// Holds the token of the one in-flight request of a kind.
///
/// [`RequestSlot::begin`] cancels whatever the slot held before. Every token
/// is a child of the session root, so tearing the session down cancels all
/// slots at once.
#[derive(Debug)]
pub struct RequestSlot {
    root: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl RequestSlot {
    pub fn new(root: &CancellationToken) -> Self {
        Self {
            root: root.clone(),
            current: Mutex::new(None),
        }
    }

    /// Cancel the previous request and hand out a token for a new one.
    pub async fn begin(&self) -> CancellationToken {
        let token = self.root.child_token();
        let mut current = self.current.lock().await;
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the in-flight request, if any.
    pub async fn cancel(&self) {
        if let Some(token) = self.current.lock().await.take() {
            token.cancel();
        }
    }

    /// Release the slot if `token` still owns it.
    pub async fn finish(&self, token: &CancellationToken) {
        let mut current = self.current.lock().await;
        // Tokens have no identity; a superseded request finds its own token cancelled.
        if current.is_some() && !token.is_cancelled() {
            *current = None;
        }
    }

    pub async fn is_busy(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

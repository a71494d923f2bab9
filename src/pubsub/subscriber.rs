use std::sync::Arc;

use tokio::sync::broadcast;

use super::Message;

/// Receiver side of a broker pattern subscription.
///
/// Unsubscribes automatically on `Drop`.
pub struct PatternSubscription {
    /// The glob pattern as it was subscribed.
    pub pattern: Arc<str>,
    /// Receiver for matching messages.
    pub(crate) inner: broadcast::Receiver<Message>,
}

impl PatternSubscription {
    /// Waits for the next message matching the pattern.
    ///
    /// # Returns
    /// - `Ok(Message)` on success
    /// - `Err(RecvError::Closed)` once the broker dropped the pattern
    /// - `Err(RecvError::Lagged(n))` if `n` messages were overwritten before
    ///   being read
    pub async fn recv(&mut self) -> Result<Message, broadcast::error::RecvError> {
        self.inner.recv().await
    }

    /// The subscribed pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Messages queued and not yet received.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Explicit unsubscribe, same as `drop(self)`.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for PatternSubscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PatternSubscription")
            .field("pattern", &self.pattern)
            .field("queued", &self.inner.len())
            .finish()
    }
}

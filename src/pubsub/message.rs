use std::sync::Arc;

use bytes::Bytes;

/// A message travelling through the [`Broker`](super::Broker).
///
/// `channel` is the concrete channel it was published on, not the pattern
/// that matched it.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: Arc<str>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        channel: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

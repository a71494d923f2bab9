#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use triggerbus::{PatternHandler, PatternTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Publish { channel: String, message: String },
    Subscribe(String),
    Unsubscribe(String),
}

/// In-memory transport that records every call.
///
/// Patterns match channels literally, and `pattern_publish` delivers
/// synchronously to the installed handler, so tests can assert right after
/// publishing.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    active: Mutex<HashSet<String>>,
    handler: Mutex<Option<PatternHandler>>,
    failing_subscribe: Mutex<HashSet<String>>,
    failing_unsubscribe: Mutex<HashSet<String>>,
    subscribe_delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_subscribe(
        &self,
        pattern: &str,
    ) {
        self.failing_subscribe.lock().insert(pattern.to_string());
    }

    pub fn fail_unsubscribe(
        &self,
        pattern: &str,
    ) {
        self.failing_unsubscribe.lock().insert(pattern.to_string());
    }

    /// Makes every `pattern_subscribe` wait before acknowledging.
    pub fn delay_subscribe(
        &self,
        delay: Duration,
    ) {
        *self.subscribe_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn subscribe_count(
        &self,
        pattern: &str,
    ) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Subscribe(p) if p == pattern))
            .count()
    }

    pub fn unsubscribe_count(
        &self,
        pattern: &str,
    ) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Unsubscribe(p) if p == pattern))
            .count()
    }

    pub fn is_active(
        &self,
        pattern: &str,
    ) -> bool {
        self.active.lock().contains(pattern)
    }

    /// Invokes the handler as if the backend delivered a message.
    pub fn deliver(
        &self,
        pattern: &str,
        channel: &str,
        message: &str,
    ) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(pattern, channel, message);
        }
    }
}

#[async_trait]
impl PatternTransport for RecordingTransport {
    async fn pattern_publish(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<usize, TransportError> {
        self.calls.lock().push(Call::Publish {
            channel: channel.to_string(),
            message: message.to_string(),
        });
        let matched = self.active.lock().contains(channel);
        if matched {
            self.deliver(channel, channel, message);
        }
        Ok(usize::from(matched))
    }

    async fn pattern_subscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Subscribe(pattern.to_string()));
        let delay = *self.subscribe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_subscribe.lock().contains(pattern) {
            return Err(TransportError::Failed {
                reason: format!("subscribe to '{pattern}' refused"),
            });
        }
        self.active.lock().insert(pattern.to_string());
        Ok(())
    }

    async fn pattern_unsubscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Unsubscribe(pattern.to_string()));
        self.active.lock().remove(pattern);
        if self.failing_unsubscribe.lock().contains(pattern) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    fn on_pattern_message(
        &self,
        handler: PatternHandler,
    ) {
        *self.handler.lock() = Some(handler);
    }
}

/// Polls `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

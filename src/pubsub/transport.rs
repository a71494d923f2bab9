//! Pattern transport capability consumed by the subscription registry.
//!
//! A transport is one client connection to a pattern pub/sub backend. The
//! registry uses two of them: a publisher and a subscriber.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use triggerbus_error::TransportError;

/// Delivery callback: `(matched_pattern, concrete_channel, raw_message)`.
pub type PatternHandler = Arc<dyn Fn(&str, &str, &str) + Send + Sync>;

/// Receives connection events from transports built by the registry.
pub type ConnectionListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

#[async_trait]
pub trait PatternTransport: Send + Sync {
    /// Publishes `message` on `channel`. Returns how many pattern
    /// subscriptions received it.
    async fn pattern_publish(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<usize, TransportError>;

    /// Subscribes to `pattern`. Resolves once the backend acknowledged.
    async fn pattern_subscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError>;

    /// Drops the subscription to `pattern`.
    async fn pattern_unsubscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError>;

    /// Installs the callback invoked for every message matching a subscribed
    /// pattern. Replaces any previous handler.
    fn on_pattern_message(
        &self,
        handler: PatternHandler,
    );
}

/// Which side of the registry a client serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Publisher,
    Subscriber,
}

impl fmt::Display for ClientRole {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ClientRole::Publisher => f.write_str("publisher"),
            ClientRole::Subscriber => f.write_str("subscriber"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { role: ClientRole },
    Error { role: ClientRole, error: TransportError },
}

impl ConnectionEvent {
    pub fn role(&self) -> ClientRole {
        match self {
            ConnectionEvent::Connected { role } | ConnectionEvent::Error { role, .. } => *role,
        }
    }
}

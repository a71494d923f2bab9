use std::{fmt, sync::Arc};

use serde_json::Value;

use super::{Broker, ConnectionListener, PatternTransport};
use crate::config::ConnectionConfig;

/// Maps `(trigger, subscribe options)` to the physical channel name.
pub type TriggerTransform = Arc<dyn Fn(&str, Option<&Value>) -> String + Send + Sync>;

/// The default transform: the trigger name is the channel.
pub fn identity_transform() -> TriggerTransform {
    Arc::new(|trigger: &str, _: Option<&Value>| trigger.to_string())
}

/// Construction options for [`SubscriptionRegistry`](super::SubscriptionRegistry).
///
/// The `publisher`/`subscriber` pair is used only when both are set.
/// Otherwise two [`BrokerClient`](super::BrokerClient)s are connected to
/// `broker`, or to a fresh broker built from `connection`.
#[derive(Clone, Default)]
pub struct PubSubOptions {
    pub trigger_transform: Option<TriggerTransform>,
    pub publisher: Option<Arc<dyn PatternTransport>>,
    pub subscriber: Option<Arc<dyn PatternTransport>>,
    pub broker: Option<Arc<Broker>>,
    pub connection: ConnectionConfig,
    pub connection_listener: Option<ConnectionListener>,
}

impl PubSubOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger_transform<F>(
        mut self,
        transform: F,
    ) -> Self
    where
        F: Fn(&str, Option<&Value>) -> String + Send + Sync + 'static,
    {
        self.trigger_transform = Some(Arc::new(transform));
        self
    }

    /// Uses pre-built transports instead of broker clients.
    pub fn with_transports(
        mut self,
        publisher: Arc<dyn PatternTransport>,
        subscriber: Arc<dyn PatternTransport>,
    ) -> Self {
        self.publisher = Some(publisher);
        self.subscriber = Some(subscriber);
        self
    }

    /// Connects the default clients to an existing broker.
    pub fn with_broker(
        mut self,
        broker: Arc<Broker>,
    ) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_connection(
        mut self,
        connection: ConnectionConfig,
    ) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_connection_listener<F>(
        mut self,
        listener: F,
    ) -> Self
    where
        F: Fn(&super::ConnectionEvent) + Send + Sync + 'static,
    {
        self.connection_listener = Some(Arc::new(listener));
        self
    }
}

impl fmt::Debug for PubSubOptions {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PubSubOptions")
            .field("trigger_transform", &self.trigger_transform.is_some())
            .field("publisher", &self.publisher.is_some())
            .field("subscriber", &self.subscriber.is_some())
            .field("broker", &self.broker)
            .field("connection", &self.connection)
            .field("connection_listener", &self.connection_listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_identity_transform_ignores_options() {
        let transform = identity_transform();
        assert_eq!(transform("comments", None), "comments");
        assert_eq!(transform("comments", Some(&json!({ "repo": "x" }))), "comments");
    }

    #[test]
    fn test_builder_sets_fields() {
        let broker = Arc::new(Broker::new(8));
        let options = PubSubOptions::new()
            .with_broker(Arc::clone(&broker))
            .with_connection(ConnectionConfig {
                channel_capacity: 8,
            })
            .with_trigger_transform(|trigger, _| format!("app.{trigger}"))
            .with_connection_listener(|_| {});

        assert!(options.broker.is_some());
        assert_eq!(options.connection.channel_capacity, 8);
        let transform = options.trigger_transform.as_ref().unwrap();
        assert_eq!(transform("t", None), "app.t");
        assert!(options.connection_listener.is_some());
        assert!(options.publisher.is_none());
    }

    #[test]
    fn test_debug_hides_closures() {
        let options = PubSubOptions::new().with_trigger_transform(|t, _| t.to_string());
        let rendered = format!("{options:?}");
        assert!(rendered.contains("trigger_transform: true"));
        assert!(rendered.contains("publisher: false"));
    }
}

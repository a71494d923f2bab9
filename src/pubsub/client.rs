use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use triggerbus_error::TransportError;

use super::{
    Broker, ClientRole, ConnectionEvent, ConnectionListener, PatternHandler, PatternSubscription,
    PatternTransport,
};

/// A client connection to a [`Broker`].
///
/// Each client owns its pattern subscriptions: subscribing twice to the same
/// pattern is a no-op, and unsubscribing only affects this client. Matching
/// messages are forwarded to the installed handler by one task per pattern,
/// in publish order.
pub struct BrokerClient {
    broker: Arc<Broker>,
    role: ClientRole,
    handler: Arc<RwLock<Option<PatternHandler>>>,
    forwarders: Mutex<HashMap<String, JoinHandle<()>>>,
    listener: Option<ConnectionListener>,
    closed: AtomicBool,
}

impl BrokerClient {
    /// Connects to `broker`, reporting to `listener` when one is given.
    pub fn connect(
        broker: Arc<Broker>,
        role: ClientRole,
        listener: Option<ConnectionListener>,
    ) -> Self {
        let client = Self {
            broker,
            role,
            handler: Arc::new(RwLock::new(None)),
            forwarders: Mutex::new(HashMap::new()),
            listener,
            closed: AtomicBool::new(false),
        };
        tracing::debug!(role = %role, "broker client connected");
        client.emit(ConnectionEvent::Connected { role });
        client
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Patterns this client is subscribed to.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.forwarders.lock().keys().cloned().collect();
        patterns.sort();
        patterns
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Disconnects: drops every pattern subscription. Later calls fail with
    /// [`TransportError::Disconnected`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for (_, forwarder) in self.forwarders.lock().drain() {
            forwarder.abort();
        }
        tracing::debug!(role = %self.role, "broker client closed");
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn emit(
        &self,
        event: ConnectionEvent,
    ) {
        emit_event(self.listener.as_ref(), event);
    }
}

fn emit_event(
    listener: Option<&ConnectionListener>,
    event: ConnectionEvent,
) {
    match (listener, &event) {
        (Some(listener), _) => listener(&event),
        (None, ConnectionEvent::Error { role, error }) => {
            tracing::error!(role = %role, error = %error, "transport error");
        }
        (None, ConnectionEvent::Connected { .. }) => {}
    }
}

async fn forward(
    mut subscription: PatternSubscription,
    handler: Arc<RwLock<Option<PatternHandler>>>,
    role: ClientRole,
    listener: Option<ConnectionListener>,
) {
    loop {
        match subscription.recv().await {
            Ok(message) => {
                let handler = handler.read().clone();
                if let Some(handler) = handler {
                    handler(&subscription.pattern, &message.channel, &message.text());
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(
                    pattern = %subscription.pattern,
                    missed,
                    "pattern subscription lagged, messages dropped"
                );
                emit_event(
                    listener.as_ref(),
                    ConnectionEvent::Error {
                        role,
                        error: TransportError::Failed {
                            reason: format!(
                                "pattern '{}' lagged behind by {missed} messages",
                                subscription.pattern
                            ),
                        },
                    },
                );
            }
            Err(RecvError::Closed) => {
                tracing::debug!(pattern = %subscription.pattern, "pattern closed by broker");
                break;
            }
        }
    }
}

#[async_trait]
impl PatternTransport for BrokerClient {
    async fn pattern_publish(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<usize, TransportError> {
        self.ensure_open()?;
        Ok(self
            .broker
            .publish(channel, Bytes::copy_from_slice(message.as_bytes())))
    }

    async fn pattern_subscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut forwarders = self.forwarders.lock();
        if forwarders.contains_key(pattern) {
            return Ok(());
        }
        let subscription = self.broker.psubscribe(pattern)?;
        let task = tokio::spawn(forward(
            subscription,
            Arc::clone(&self.handler),
            self.role,
            self.listener.clone(),
        ));
        forwarders.insert(pattern.to_string(), task);
        tracing::trace!(role = %self.role, pattern, "pattern subscribed");
        Ok(())
    }

    async fn pattern_unsubscribe(
        &self,
        pattern: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        if let Some(task) = self.forwarders.lock().remove(pattern) {
            task.abort();
            tracing::trace!(role = %self.role, pattern, "pattern unsubscribed");
        }
        Ok(())
    }

    fn on_pattern_message(
        &self,
        handler: PatternHandler,
    ) {
        *self.handler.write() = Some(handler);
    }
}

impl Drop for BrokerClient {
    fn drop(&mut self) {
        for (_, forwarder) in self.forwarders.get_mut().drain() {
            forwarder.abort();
        }
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("role", &self.role)
            .field("patterns", &self.patterns())
            .field("closed", &self.is_closed())
            .finish()
    }
}

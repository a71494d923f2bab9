//! Reference-counted trigger subscriptions over a pattern transport.
//!
//! Many logical subscribers share one transport pattern subscription per
//! physical channel. The first subscriber of a channel waits for the
//! transport to acknowledge; later ones attach immediately. The transport
//! subscription is released when the last subscriber leaves.
//!
//! Transport subscribe/unsubscribe commands are executed one at a time, in
//! submission order, by a control task owned by the registry.

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, trace, warn};
use triggerbus_error::{ErrorExt, PublishError, SubscriptionError};

use super::{
    identity_transform, Broker, BrokerClient, ClientRole, PatternTransport, Payload,
    PubSubOptions, TriggerStream, TriggerTransform, Triggers,
};

/// Identifier of one logical subscription. Unique per registry, never
/// reused; the first id issued is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(id: u64) -> Self {
        SubscriptionId(id)
    }
}

impl From<SubscriptionId> for u64 {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscriber callback, invoked once per delivered payload.
pub type Callback = Arc<dyn Fn(Payload) + Send + Sync>;

struct SubscriptionRecord {
    channel: Arc<str>,
    callback: Callback,
}

/// Both maps live under one lock. A channel key exists in `channel_refs`
/// only while its id list is non-empty, and only then is the transport
/// subscribed to it.
#[derive(Default)]
struct RegistryState {
    subscriptions: HashMap<SubscriptionId, SubscriptionRecord>,
    channel_refs: HashMap<Arc<str>, Vec<SubscriptionId>>,
}

impl RegistryState {
    /// Attaches `id` to `channel` if the channel is already subscribed.
    fn attach_if_active(
        &mut self,
        id: SubscriptionId,
        channel: &Arc<str>,
        callback: &Callback,
    ) -> bool {
        let Some(ids) = self.channel_refs.get_mut(channel) else {
            return false;
        };
        ids.push(id);
        self.subscriptions.insert(
            id,
            SubscriptionRecord {
                channel: Arc::clone(channel),
                callback: Arc::clone(callback),
            },
        );
        true
    }

    fn attach(
        &mut self,
        id: SubscriptionId,
        channel: Arc<str>,
        callback: Callback,
    ) {
        self.channel_refs
            .entry(Arc::clone(&channel))
            .or_default()
            .push(id);
        self.subscriptions
            .insert(id, SubscriptionRecord { channel, callback });
    }

    /// Removes `id`. Returns the channel when `id` was its last reference.
    fn detach(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Arc<str>>, SubscriptionError> {
        let record = self
            .subscriptions
            .remove(&id)
            .ok_or(SubscriptionError::UnknownSubscription { id: id.0 })?;

        let emptied = match self.channel_refs.get_mut(&record.channel) {
            Some(ids) => {
                ids.retain(|other| *other != id);
                ids.is_empty()
            }
            None => false,
        };
        if emptied {
            self.channel_refs.remove(&record.channel);
            Ok(Some(record.channel))
        } else {
            Ok(None)
        }
    }

    /// Callbacks of `pattern` in reference order.
    fn listeners(
        &self,
        pattern: &str,
    ) -> Vec<(SubscriptionId, Callback)> {
        self.channel_refs
            .get(pattern)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        self.subscriptions
                            .get(id)
                            .map(|record| (*id, Arc::clone(&record.callback)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

enum ControlMsg {
    Subscribe {
        id: SubscriptionId,
        channel: Arc<str>,
        callback: Callback,
        reply: oneshot::Sender<Result<(), SubscriptionError>>,
    },
    Unsubscribe {
        channel: Arc<str>,
    },
}

/// Runs transport commands in FIFO order until every registry handle is gone.
async fn run_control(
    mut rx: mpsc::UnboundedReceiver<ControlMsg>,
    state: Arc<Mutex<RegistryState>>,
    subscriber: Arc<dyn PatternTransport>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            ControlMsg::Subscribe {
                id,
                channel,
                callback,
                reply,
            } => {
                // An earlier command may have subscribed the channel already.
                let attached = state.lock().attach_if_active(id, &channel, &callback);
                let result = if attached {
                    Ok(())
                } else {
                    match subscriber.pattern_subscribe(&channel).await {
                        Ok(()) => {
                            state.lock().attach(id, Arc::clone(&channel), callback);
                            Ok(())
                        }
                        Err(err) => {
                            warn!(
                                channel = %channel,
                                error = %err,
                                code = %err.status_code(),
                                retryable = err.is_retryable(),
                                "transport subscribe failed"
                            );
                            Err(SubscriptionError::Transport(err))
                        }
                    }
                };

                let succeeded = result.is_ok();
                if reply.send(result).is_err() && succeeded {
                    // The caller stopped waiting; nobody owns this id.
                    debug!(subscription_id = %id, channel = %channel, "subscribe abandoned, rolling back");
                    let emptied = state.lock().detach(id).ok().flatten();
                    if let Some(channel) = emptied {
                        release(subscriber.as_ref(), &channel).await;
                    }
                }
            }
            ControlMsg::Unsubscribe { channel } => {
                // A subscribe queued ahead of this teardown may have
                // re-attached the channel to the live transport subscription.
                if state.lock().channel_refs.contains_key(&channel) {
                    debug!(channel = %channel, "channel re-attached, teardown skipped");
                    continue;
                }
                release(subscriber.as_ref(), &channel).await;
            }
        }
    }
    trace!("registry control task stopped");
}

async fn release(
    subscriber: &dyn PatternTransport,
    channel: &str,
) {
    match subscriber.pattern_unsubscribe(channel).await {
        Ok(()) => debug!(channel, "transport subscription released"),
        Err(err) => warn!(
            channel,
            error = %err,
            code = %err.status_code(),
            "transport unsubscribe failed"
        ),
    }
}

/// Delivers one transport message to the subscribers of `pattern`.
fn dispatch(
    state: &Mutex<RegistryState>,
    pattern: &str,
    channel: &str,
    message: &str,
) {
    let listeners = state.lock().listeners(pattern);
    if listeners.is_empty() {
        debug!(pattern, channel, "no subscribers for pattern, message dropped");
        return;
    }

    let payload = Payload::decode(message);
    for (id, callback) in listeners {
        let payload = payload.clone();
        if panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
            error!(
                subscription_id = %id,
                pattern,
                channel,
                "subscriber callback panicked"
            );
        }
    }
}

struct RegistryInner {
    state: Arc<Mutex<RegistryState>>,
    next_id: AtomicU64,
    trigger_transform: TriggerTransform,
    publisher: Arc<dyn PatternTransport>,
    subscriber: Arc<dyn PatternTransport>,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    runtime: Handle,
}

/// Subscription registry over a publisher/subscriber transport pair.
///
/// Cloning is cheap; clones share the same subscriptions.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Builds a registry. Must be called inside a tokio runtime.
    pub fn new(options: PubSubOptions) -> Result<Self, SubscriptionError> {
        let runtime = Handle::try_current().map_err(|err| SubscriptionError::NoRuntime {
            reason: err.to_string(),
        })?;

        let PubSubOptions {
            trigger_transform,
            publisher,
            subscriber,
            broker,
            connection,
            connection_listener,
        } = options;

        let (publisher, subscriber) = match (publisher, subscriber) {
            (Some(publisher), Some(subscriber)) => (publisher, subscriber),
            (publisher, subscriber) => {
                if publisher.is_some() || subscriber.is_some() {
                    warn!("only one of publisher/subscriber was given, connecting broker clients for both");
                }
                let broker =
                    broker.unwrap_or_else(|| Arc::new(Broker::new(connection.channel_capacity)));
                let publisher: Arc<dyn PatternTransport> = Arc::new(BrokerClient::connect(
                    Arc::clone(&broker),
                    ClientRole::Publisher,
                    connection_listener.clone(),
                ));
                let subscriber: Arc<dyn PatternTransport> = Arc::new(BrokerClient::connect(
                    broker,
                    ClientRole::Subscriber,
                    connection_listener,
                ));
                (publisher, subscriber)
            }
        };

        let state = Arc::new(Mutex::new(RegistryState::default()));
        let weak_state = Arc::downgrade(&state);
        subscriber.on_pattern_message(Arc::new(move |pattern: &str, channel: &str, message: &str| {
            if let Some(state) = weak_state.upgrade() {
                dispatch(&state, pattern, channel, message);
            }
        }));

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_control(
            control_rx,
            Arc::clone(&state),
            Arc::clone(&subscriber),
        ));

        Ok(Self {
            inner: Arc::new(RegistryInner {
                state,
                next_id: AtomicU64::new(0),
                trigger_transform: trigger_transform.unwrap_or_else(identity_transform),
                publisher,
                subscriber,
                control_tx,
                runtime,
            }),
        })
    }

    /// Publishes `payload` on `trigger`. The trigger transform is not
    /// applied. Returns how many pattern subscriptions the transport reached.
    pub async fn publish(
        &self,
        trigger: &str,
        payload: impl Into<Payload>,
    ) -> Result<usize, PublishError> {
        let message = payload.into().encode();
        let reached = self
            .inner
            .publisher
            .pattern_publish(trigger, &message)
            .await?;
        trace!(trigger, reached, "published");
        Ok(reached)
    }

    /// Serializes `value` to JSON and publishes it.
    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        trigger: &str,
        value: &T,
    ) -> Result<usize, PublishError> {
        let payload = Payload::from_serialize(value)?;
        self.publish(trigger, payload).await
    }

    /// Registers `callback` for `trigger`.
    ///
    /// `options` is handed to the trigger transform together with the
    /// trigger name. Resolves once the transport pattern subscription
    /// exists; on transport failure nothing is registered.
    pub async fn subscribe<F>(
        &self,
        trigger: &str,
        callback: F,
        options: Option<&Value>,
    ) -> Result<SubscriptionId, SubscriptionError>
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        let channel: Arc<str> = Arc::from((self.inner.trigger_transform)(trigger, options));
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let callback: Callback = Arc::new(callback);

        let attached = self
            .inner
            .state
            .lock()
            .attach_if_active(id, &channel, &callback);
        if attached {
            debug!(subscription_id = %id, channel = %channel, "attached to active channel");
            return Ok(id);
        }

        let (reply, reply_rx) = oneshot::channel();
        self.inner.control_tx.send(ControlMsg::Subscribe {
            id,
            channel: Arc::clone(&channel),
            callback,
            reply,
        })?;
        reply_rx.await??;

        debug!(subscription_id = %id, channel = %channel, "subscribed");
        Ok(id)
    }

    /// Removes one subscription.
    ///
    /// Fails with [`SubscriptionError::UnknownSubscription`] for ids that
    /// were never issued or are already gone. Releasing the transport
    /// subscription of the last subscriber happens in the background.
    pub fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> Result<(), SubscriptionError> {
        let emptied = self.inner.state.lock().detach(id)?;
        match emptied {
            Some(channel) => {
                debug!(subscription_id = %id, channel = %channel, "last subscriber left channel");
                if self
                    .inner
                    .control_tx
                    .send(ControlMsg::Unsubscribe { channel })
                    .is_err()
                {
                    warn!(subscription_id = %id, "control task gone, transport unsubscribe skipped");
                }
            }
            None => trace!(subscription_id = %id, "unsubscribed"),
        }
        Ok(())
    }

    /// Pull-based view over one or more triggers.
    pub fn stream(
        &self,
        triggers: impl Into<Triggers>,
    ) -> TriggerStream {
        TriggerStream::new(self.clone(), triggers.into())
    }

    pub fn publisher(&self) -> &Arc<dyn PatternTransport> {
        &self.inner.publisher
    }

    pub fn subscriber(&self) -> &Arc<dyn PatternTransport> {
        &self.inner.subscriber
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.inner.state.lock().channel_refs.len()
    }

    /// Subscription ids of `channel`, in subscription order.
    pub fn channel_refs(
        &self,
        channel: &str,
    ) -> Vec<SubscriptionId> {
        self.inner
            .state
            .lock()
            .channel_refs
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &state.subscriptions.len())
            .field("channels", &state.channel_refs.len())
            .field("next_id", &self.inner.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

//! Pull-based view over registry deliveries.
//!
//! A [`TriggerStream`] is one more registry subscriber: pushed payloads go to
//! the oldest pending `next()` call, or into an unbounded buffer when nobody
//! is waiting.

use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio_stream::Stream;
use tracing::{debug, warn};
use triggerbus_error::SubscriptionError;

use super::{Payload, SubscriptionId, SubscriptionRegistry};

/// One trigger name or an ordered list of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triggers(Vec<String>);

impl Triggers {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Triggers {
    fn from(trigger: &str) -> Self {
        Triggers(vec![trigger.to_string()])
    }
}

impl From<String> for Triggers {
    fn from(trigger: String) -> Self {
        Triggers(vec![trigger])
    }
}

impl From<Vec<String>> for Triggers {
    fn from(triggers: Vec<String>) -> Self {
        Triggers(triggers)
    }
}

impl From<Vec<&str>> for Triggers {
    fn from(triggers: Vec<&str>) -> Self {
        Triggers(triggers.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Triggers {
    fn from(triggers: &[&str]) -> Self {
        Triggers(triggers.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Triggers {
    fn from(triggers: [&str; N]) -> Self {
        Triggers(triggers.iter().map(|t| t.to_string()).collect())
    }
}

/// At most one of `buffer` and `waiters` is non-empty.
#[derive(Default)]
struct PullState {
    buffer: VecDeque<Payload>,
    waiters: VecDeque<oneshot::Sender<Option<Payload>>>,
    ids: Vec<SubscriptionId>,
    /// Kept for `ready()`; `next()` reports it once.
    setup_error: Option<SubscriptionError>,
    error_reported: bool,
    done: bool,
}

struct Shared {
    state: Mutex<PullState>,
    /// `true` once setup finished, failed or was cut short by `close`.
    settled: watch::Sender<bool>,
    registry: SubscriptionRegistry,
    triggers: Triggers,
}

impl Shared {
    fn push(
        &self,
        payload: Payload,
    ) {
        let mut state = self.state.lock();
        if state.done {
            return;
        }
        let mut payload = payload;
        while let Some(waiter) = state.waiters.pop_front() {
            // A waiter whose `next()` was dropped hands the value back.
            match waiter.send(Some(payload)) {
                Ok(()) => return,
                Err(Some(returned)) => payload = returned,
                Err(None) => return,
            }
        }
        state.buffer.push_back(payload);
    }

    async fn wait_settled(&self) {
        let mut settled = self.settled.subscribe();
        let _ = settled.wait_for(|settled| *settled).await;
    }

    fn close(&self) {
        let (ids, waiters, was_done) = {
            let mut state = self.state.lock();
            let was_done = mem::replace(&mut state.done, true);
            state.buffer.clear();
            state.error_reported = true;
            (
                mem::take(&mut state.ids),
                mem::take(&mut state.waiters),
                was_done,
            )
        };

        for waiter in waiters {
            let _ = waiter.send(None);
        }
        for id in ids {
            if let Err(err) = self.registry.unsubscribe(id) {
                debug!(subscription_id = %id, error = %err, "stream subscription already gone");
            }
        }
        self.settled.send_replace(true);

        if !was_done {
            debug!(triggers = ?self.triggers, "trigger stream closed");
        }
    }

    /// Terminates the stream after a failed subscribe, keeping the error for
    /// the next pull.
    fn fail(
        &self,
        err: SubscriptionError,
    ) {
        let (ids, waiters) = {
            let mut state = self.state.lock();
            if !state.done {
                state.setup_error = Some(err);
            }
            state.done = true;
            state.buffer.clear();
            (mem::take(&mut state.ids), mem::take(&mut state.waiters))
        };

        for waiter in waiters {
            let _ = waiter.send(None);
        }
        for id in ids {
            let _ = self.registry.unsubscribe(id);
        }
    }
}

async fn subscribe_all(shared: Arc<Shared>) {
    let weak = Arc::downgrade(&shared);

    for trigger in shared.triggers.iter() {
        let done = shared.state.lock().done;
        if done {
            break;
        }

        let weak = weak.clone();
        let result = shared
            .registry
            .subscribe(
                trigger,
                move |payload| {
                    if let Some(shared) = weak.upgrade() {
                        shared.push(payload);
                    }
                },
                None,
            )
            .await;

        match result {
            Ok(id) => {
                let closed = {
                    let mut state = shared.state.lock();
                    if !state.done {
                        state.ids.push(id);
                    }
                    state.done
                };
                if closed {
                    // `close` ran while this subscribe was in flight.
                    let _ = shared.registry.unsubscribe(id);
                    break;
                }
            }
            Err(err) => {
                warn!(trigger, error = %err, "trigger stream subscribe failed");
                shared.fail(err);
                break;
            }
        }
    }

    shared.settled.send_replace(true);
}

async fn pull(shared: Arc<Shared>) -> Result<Option<Payload>, SubscriptionError> {
    shared.wait_settled().await;

    let rx = {
        let mut state = shared.state.lock();
        if !state.error_reported {
            if let Some(err) = &state.setup_error {
                let err = err.clone();
                state.error_reported = true;
                return Err(err);
            }
        }
        if state.done {
            return Ok(None);
        }
        if let Some(payload) = state.buffer.pop_front() {
            return Ok(Some(payload));
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        rx
    };

    Ok(rx.await.unwrap_or(None))
}

type PullFuture = Pin<Box<dyn Future<Output = Result<Option<Payload>, SubscriptionError>> + Send>>;

/// Asynchronous sequence of the payloads published to a set of triggers.
///
/// Created by [`SubscriptionRegistry::stream`]. Subscriptions are set up in
/// the background; the first `next()` waits for them. Dropping the stream
/// closes it.
pub struct TriggerStream {
    shared: Arc<Shared>,
    /// In-flight pull of the `Stream` impl. Behind a lock only so the
    /// stream stays `Sync`; `poll_next` uses `get_mut`.
    pending: Mutex<Option<PullFuture>>,
}

impl TriggerStream {
    pub(crate) fn new(
        registry: SubscriptionRegistry,
        triggers: Triggers,
    ) -> Self {
        let (settled, _) = watch::channel(false);
        let runtime = registry.runtime().clone();
        let shared = Arc::new(Shared {
            state: Mutex::new(PullState::default()),
            settled,
            registry,
            triggers,
        });
        runtime.spawn(subscribe_all(Arc::clone(&shared)));
        Self {
            shared,
            pending: Mutex::new(None),
        }
    }

    /// Next payload, in arrival order.
    ///
    /// Returns `Ok(None)` once the stream is closed. A failed setup is
    /// reported once as `Err`; the stream is closed afterwards.
    pub async fn next(&self) -> Result<Option<Payload>, SubscriptionError> {
        pull(Arc::clone(&self.shared)).await
    }

    /// Waits for all subscriptions to be in place.
    pub async fn ready(&self) -> Result<(), SubscriptionError> {
        self.shared.wait_settled().await;
        match &self.shared.state.lock().setup_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Ends the stream: unsubscribes, discards buffered payloads and resolves
    /// pending `next()` calls with `None`. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().done
    }

    pub fn triggers(&self) -> &Triggers {
        &self.shared.triggers
    }

    /// Payloads received but not yet pulled.
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }
}

impl Stream for TriggerStream {
    type Item = Payload;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Payload>> {
        let this = &mut *self;
        let shared = &this.shared;
        let pending = this.pending.get_mut();
        let fut = pending.get_or_insert_with(|| Box::pin(pull(Arc::clone(shared))));

        match fut.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                *pending = None;
                match result {
                    Ok(item) => Poll::Ready(item),
                    Err(err) => {
                        warn!(error = %err, "trigger stream ended by setup failure");
                        Poll::Ready(None)
                    }
                }
            }
        }
    }
}

impl Drop for TriggerStream {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for TriggerStream {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TriggerStream")
            .field("triggers", &self.shared.triggers)
            .field("buffered", &state.buffer.len())
            .field("waiting", &state.waiters.len())
            .field("done", &state.done)
            .finish()
    }
}

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use dashmap::DashMap;
use globset::{GlobBuilder, GlobMatcher};
use tokio::sync::broadcast;
use triggerbus_error::TransportError;

use super::{Message, PatternSubscription};

type PatternKey = Arc<str>;

struct PatternEntry {
    matcher: GlobMatcher,
    tx: broadcast::Sender<Message>,
}

/// In-process pattern pub/sub broker.
///
/// Supports:
/// - glob pattern subscriptions (`*`, `?`, `[...]`, `\` escapes)
/// - fan-out to every receiver of every matching pattern
/// - lazy removal of patterns nobody listens to anymore
/// - publish and send-failure counters
///
/// Clients talk to it through [`BrokerClient`](super::BrokerClient); the
/// broker itself has no notion of subscription ownership.
pub struct Broker {
    /// Pattern → compiled matcher and `Sender`
    patterns: DashMap<PatternKey, PatternEntry>,
    /// Capacity of each `broadcast::channel`
    default_capacity: usize,
    /// Total `publish` calls
    pub publish_count: AtomicUsize,
    /// Sends that found no live receiver
    pub send_error_count: AtomicUsize,
}

impl Broker {
    /// Creates a broker whose per-pattern buffers hold `default_capacity`
    /// messages.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            patterns: DashMap::new(),
            default_capacity: default_capacity.max(1),
            publish_count: AtomicUsize::new(0),
            send_error_count: AtomicUsize::new(0),
        }
    }

    /// Subscribes to a glob pattern such as `"news.*"` or `"a?c"`.
    ///
    /// Subscribing twice to the same pattern shares one `Sender`.
    pub fn psubscribe(
        &self,
        pattern: &str,
    ) -> Result<PatternSubscription, TransportError> {
        if let Some(entry) = self.patterns.get(pattern) {
            return Ok(PatternSubscription {
                pattern: entry.key().clone(),
                inner: entry.tx.subscribe(),
            });
        }

        let matcher = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()?
            .compile_matcher();

        let key: PatternKey = Arc::from(pattern);
        let entry = self
            .patterns
            .entry(key.clone())
            .or_insert_with(|| PatternEntry {
                matcher,
                tx: broadcast::channel(self.default_capacity).0,
            });
        Ok(PatternSubscription {
            pattern: key,
            inner: entry.tx.subscribe(),
        })
    }

    /// Removes a pattern and closes every receiver attached to it.
    pub fn punsubscribe_all(
        &self,
        pattern: &str,
    ) {
        self.patterns.remove(pattern);
    }

    /// Publishes `payload` on `channel`.
    ///
    /// Returns the number of receivers the message reached. Patterns whose
    /// receivers are all gone are counted in `send_error_count` and removed.
    pub fn publish(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> usize {
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let channel: Arc<str> = Arc::from(channel);
        let mut delivered = 0;
        let mut abandoned = Vec::new();

        for entry in self.patterns.iter() {
            if !entry.matcher.is_match(&*channel) {
                continue;
            }
            match entry.tx.send(Message::new(channel.clone(), payload.clone())) {
                Ok(receivers) => delivered += receivers,
                Err(_) => {
                    self.send_error_count.fetch_add(1, Ordering::Relaxed);
                    abandoned.push(entry.key().clone());
                }
            }
        }

        for key in abandoned {
            self.patterns
                .remove_if(&key, |_, entry| entry.tx.receiver_count() == 0);
        }

        delivered
    }

    /// Number of live receivers on `pattern`.
    pub fn receiver_count(
        &self,
        pattern: &str,
    ) -> usize {
        self.patterns
            .get(pattern)
            .map(|entry| entry.tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of patterns currently known to the broker.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("patterns", &self.patterns.len())
            .field("default_capacity", &self.default_capacity)
            .field("publish_count", &self.publish_count.load(Ordering::Relaxed))
            .field(
                "send_error_count",
                &self.send_error_count.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Duration};

    use super::*;

    #[tokio::test]
    async fn test_psubscribe_and_receive() {
        let broker = Broker::new(5);
        let mut psub = broker.psubscribe("foo.*").unwrap();

        assert_eq!(broker.publish("foo.bar", Bytes::from_static(b"X")), 1);

        let msg = timeout(Duration::from_millis(50), psub.recv())
            .await
            .expect("timed out")
            .expect("no msg");
        assert_eq!(&*msg.channel, "foo.bar");
        assert_eq!(msg.payload, Bytes::from_static(b"X"));
        assert_eq!(broker.publish_count.load(Ordering::Relaxed), 1);
        assert_eq!(broker.send_error_count.load(Ordering::Relaxed), 0);
    }

    /// A literal pattern only matches the identical channel.
    #[tokio::test]
    async fn test_literal_pattern_does_not_match_longer_channel() {
        let broker = Broker::new(5);
        let _psub = broker.psubscribe("comments").unwrap();

        assert_eq!(broker.publish("comments.repo", Bytes::from_static(b"v")), 0);
        assert_eq!(broker.publish("comments", Bytes::from_static(b"v")), 1);
    }

    #[tokio::test]
    async fn test_publish_without_patterns() {
        let broker = Broker::new(5);
        assert_eq!(broker.publish("nochan", Bytes::from_static(b"z")), 0);
        assert_eq!(broker.publish_count.load(Ordering::Relaxed), 1);
        assert_eq!(broker.send_error_count.load(Ordering::Relaxed), 0);
        assert_eq!(broker.pattern_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_receivers_and_patterns() {
        let broker = Broker::new(5);
        let mut a = broker.psubscribe("qu?x").unwrap();
        let mut b = broker.psubscribe("qu?x").unwrap();
        let mut c = broker.psubscribe("qu*").unwrap();
        assert_eq!(broker.receiver_count("qu?x"), 2);

        assert_eq!(broker.publish("quux", Bytes::from_static(b"hello")), 3);

        for sub in [&mut a, &mut b, &mut c] {
            let msg = timeout(Duration::from_millis(50), sub.recv())
                .await
                .expect("timed out")
                .expect("no msg");
            assert_eq!(&*msg.channel, "quux");
        }
    }

    /// Dropped receivers make the next publish count a send error and
    /// remove the pattern.
    #[tokio::test]
    async fn test_auto_remove_abandoned_pattern() {
        let broker = Broker::new(5);
        drop(broker.psubscribe("temp*").unwrap());
        assert_eq!(broker.pattern_count(), 1);

        assert_eq!(broker.publish("temperature", Bytes::from_static(b"u")), 0);
        assert_eq!(broker.send_error_count.load(Ordering::Relaxed), 1);
        assert_eq!(broker.pattern_count(), 0);
    }

    #[tokio::test]
    async fn test_punsubscribe_all_closes_receivers() {
        let broker = Broker::new(5);
        let mut psub = broker.psubscribe("a?c").unwrap();
        broker.punsubscribe_all("a?c");

        let res = psub.recv().await;
        assert!(matches!(res, Err(broadcast::error::RecvError::Closed)));
    }

    #[test]
    fn test_invalid_glob_pattern() {
        let broker = Broker::new(5);
        let err = broker.psubscribe("[invalid").unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidPattern { ref pattern, .. } if pattern == "[invalid"
        ));
        assert_eq!(broker.pattern_count(), 0);
    }

    #[test]
    fn test_escaped_wildcard_is_literal() {
        let broker = Broker::new(5);
        let _psub = broker.psubscribe(r"news\*").unwrap();
        assert_eq!(broker.publish("news*", Bytes::from_static(b"1")), 1);
        assert_eq!(broker.publish("newsroom", Bytes::from_static(b"2")), 0);
    }
}

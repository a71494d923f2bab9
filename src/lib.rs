/// Settings loading (`config` crate, `TRIGGERBUS_` environment variables).
pub mod config;
/// Error types and status codes.
pub mod error;
/// Logging setup (filters, formatters, console/file sinks).
pub mod logging;
/// Trigger subscriptions, streams and transports.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use crate::config::{ConnectionConfig, Settings};
pub use error::{
    ErrorExt, InitError, PublishError, StatusCode, SubscriptionError, SubscriptionResult,
    TransportError,
};
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
pub use pubsub::{
    Broker, BrokerClient, ClientRole, ConnectionEvent, ConnectionListener, PatternHandler,
    PatternTransport, Payload, PubSubOptions, SubscriptionId, SubscriptionRegistry,
    TriggerStream, TriggerTransform, Triggers,
};

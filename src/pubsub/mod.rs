//! Trigger pub/sub over a pattern transport.
//!
//! - `registry`: reference-counted subscriptions and fan-out dispatch.
//! - `stream`: pull-based sequence over registry deliveries.
//! - `transport`: the pattern transport capability and connection events.
//! - `broker`, `client`: in-process glob broker and its per-connection
//!   transport.
//! - `payload`, `message`: wire codec and broker messages.

pub mod broker;
pub mod client;
pub mod message;
pub mod options;
pub mod payload;
pub mod registry;
pub mod stream;
pub mod subscriber;
pub mod transport;

pub use broker::*;
pub use client::*;
pub use message::*;
pub use options::*;
pub use payload::*;
pub use registry::*;
pub use stream::*;
pub use subscriber::*;
pub use transport::*;

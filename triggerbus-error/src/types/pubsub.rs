use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Failures reported by a pattern transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The pattern could not be compiled by the transport.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The transport client is no longer connected to its backend.
    #[error("transport disconnected")]
    Disconnected,

    /// Any other transport-side failure.
    #[error("transport failure: {reason}")]
    Failed { reason: String },
}

/// Errors of the subscription registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The id was never issued or was already unsubscribed.
    #[error("there is no subscription of id \"{id}\"")]
    UnknownSubscription { id: u64 },

    /// The transport refused the pattern subscription.
    #[error("transport subscribe failed: {0}")]
    Transport(#[from] TransportError),

    /// The registry's control task has stopped.
    #[error("subscription registry is shut down")]
    Closed,

    /// The registry was built outside a tokio runtime.
    #[error("no tokio runtime available: {reason}")]
    NoRuntime { reason: String },
}

/// Errors of `publish`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The payload could not be encoded to text.
    #[error("payload encoding failed: {reason}")]
    Encode { reason: String },

    #[error("transport publish failed: {0}")]
    Transport(#[from] TransportError),
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPattern { .. } => StatusCode::InvalidPattern,
            Self::Disconnected => StatusCode::ConnectionClosed,
            Self::Failed { .. } => StatusCode::ConnectionFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidPattern { pattern, .. } => format!("Invalid pattern: {pattern}"),
            Self::Disconnected => "Transport disconnected".to_string(),
            Self::Failed { .. } => "Transport failure".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub_transport".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::InvalidPattern { pattern, .. } = self {
            tags.push(("pattern", pattern.clone()));
        }
        tags
    }
}

impl ErrorExt for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownSubscription { .. } => StatusCode::NotFound,
            Self::Transport(inner) => inner.status_code(),
            Self::Closed => StatusCode::ConnectionClosed,
            Self::NoRuntime { .. } => StatusCode::RuntimeUnavailable,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::UnknownSubscription { .. } => self.to_string(),
            Self::Transport(inner) => inner.client_message(),
            Self::Closed => "Subscription registry closed".to_string(),
            Self::NoRuntime { .. } => "Internal error".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub_subscription".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::UnknownSubscription { id } = self {
            tags.push(("subscription_id", id.to_string()));
        }
        tags
    }
}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Encode { .. } => StatusCode::SerializationFailed,
            Self::Transport(inner) => inner.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Encode { .. } => "Payload format error".to_string(),
            Self::Transport(inner) => inner.client_message(),
        }
    }
}

#[cfg(feature = "globset")]
impl From<globset::Error> for TransportError {
    fn from(err: globset::Error) -> Self {
        TransportError::InvalidPattern {
            pattern: err.glob().unwrap_or_default().to_string(),
            reason: err.kind().to_string(),
        }
    }
}

#[cfg(feature = "tokio")]
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SubscriptionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SubscriptionError::Closed
    }
}

#[cfg(feature = "tokio")]
impl From<tokio::sync::oneshot::error::RecvError> for SubscriptionError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SubscriptionError::Closed
    }
}

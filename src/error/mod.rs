pub use triggerbus_error::{
    ErrorExt, PublishError, StatusCode, SubscriptionError, SubscriptionResult, TransportError,
};

use std::any::Any;

use thiserror::Error;

/// Failures while loading settings or installing the log subscriber.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid logging configuration: {reason}")]
    InvalidLogConfig { reason: String },

    /// A global tracing subscriber is already installed.
    #[error("logging already initialized: {reason}")]
    AlreadyInitialized { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for InitError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::InvalidLogConfig { .. } => StatusCode::InvalidArgs,
            Self::AlreadyInitialized { .. } => StatusCode::AlreadyExists,
            Self::Io(_) => StatusCode::Io,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_status_codes() {
        let err = InitError::InvalidLogConfig {
            reason: "unknown level 'loud'".into(),
        };
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert_eq!(
            err.to_string(),
            "invalid logging configuration: unknown level 'loud'"
        );

        let io = InitError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.status_code(), StatusCode::Io);
        assert_eq!(io.type_name(), "InitError");
    }
}

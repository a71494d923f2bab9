use std::{any::Any, error::Error};

use crate::StatusCode;

/// Common surface of every triggerbus error. Object safe, so transports can
/// hand back `&dyn ErrorExt` without naming their concrete error type.
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    fn as_any(&self) -> &dyn Any;

    /// Text safe to show a subscriber or publisher. Internal failures are
    /// masked as `"Internal error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Whether repeating the failed subscribe or publish may succeed.
    fn is_retryable(&self) -> bool {
        self.status_code().is_retryable()
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Last path segment of the concrete type name.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct BackendGone;

    impl fmt::Display for BackendGone {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            f.write_str("backend at 10.0.0.7:6379 went away")
        }
    }

    impl Error for BackendGone {}

    impl ErrorExt for BackendGone {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct PatternRefused(&'static str);

    impl fmt::Display for PatternRefused {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "pattern refused: {}", self.0)
        }
    }

    impl Error for PatternRefused {}

    impl ErrorExt for PatternRefused {
        fn status_code(&self) -> StatusCode {
            StatusCode::InvalidPattern
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = BackendGone;
        assert_eq!(err.status_code(), StatusCode::Internal);
        assert_eq!(err.client_message(), "Internal error");
        assert!(err.log_message().contains("BackendGone"));
    }

    #[test]
    fn test_client_errors_keep_their_text() {
        let err = PatternRefused("news.[");
        assert_eq!(err.client_message(), "pattern refused: news.[");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_trait_object_downcast_and_tags() {
        let err: Box<dyn ErrorExt> = Box::new(PatternRefused("a"));
        assert!(err.as_any().downcast_ref::<PatternRefused>().is_some());

        let tags = PatternRefused("a").metrics_tags();
        assert!(tags.contains(&("error_type", "PatternRefused".to_string())));
        assert!(tags.contains(&("status_code", StatusCode::InvalidPattern.to_string())));
    }
}

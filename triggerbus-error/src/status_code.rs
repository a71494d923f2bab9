use std::fmt;

use num_enum::TryFromPrimitive;

/// Status codes used to classify errors.
///
/// # Ranges
/// - 0xxx: success
/// - 1xxx: general errors
/// - 2xxx: caller errors (bad ids, bad arguments)
/// - 4xxx: limits
/// - 5xxx: payload encoding
/// - 6xxx: transport / IO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: success ===
    Success = 0,

    // === 1xxx: general ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: caller errors ===
    NotFound = 2000,
    AlreadyExists = 2001,
    InvalidPattern = 2002,

    // === 4xxx: limits ===
    RateLimited = 4000,
    SubscriberLimitExceeded = 4001,

    // === 5xxx: encoding ===
    SerializationFailed = 5000,
    DeserializationFailed = 5001,

    // === 6xxx: transport / IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    ConnectionFailed = 6002,
    Timeout = 6003,
    RuntimeUnavailable = 6004,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl StatusCode {
    /// Numeric value of the code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Looks up a code by its numeric value.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Whether retrying the operation can reasonably succeed.
    ///
    /// The registry itself never retries; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::ConnectionFailed | Self::ConnectionClosed
        )
    }

    /// Caller-side problem: bad id, bad pattern, bad argument.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=4999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Internal or infrastructure problem.
    pub fn is_server_error(&self) -> bool {
        let c = self.code();
        !matches!(self, Self::InvalidArgs) && matches!(c, 1000..=1999 | 5000..=6999)
    }

    /// Suggested log level for an error carrying this code.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidPattern => LogLevel::Info,
            Self::RateLimited | Self::Timeout | Self::ConnectionClosed => LogLevel::Warn,
            Self::Internal | Self::RuntimeUnavailable => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StatusCode::Timeout.is_retryable());
        assert!(StatusCode::ConnectionFailed.is_retryable());
        assert!(!StatusCode::NotFound.is_retryable());
        assert!(!StatusCode::InvalidPattern.is_retryable());
    }

    #[test]
    fn test_client_vs_server() {
        assert!(StatusCode::InvalidArgs.is_client_error());
        assert!(StatusCode::NotFound.is_client_error());
        assert!(!StatusCode::InvalidArgs.is_server_error());
        assert!(StatusCode::Internal.is_server_error());
        assert!(StatusCode::ConnectionClosed.is_server_error());
        assert!(!StatusCode::NotFound.is_server_error());
    }

    #[test]
    fn test_from_u32_roundtrip() {
        let n = StatusCode::NotFound.code();
        assert_eq!(StatusCode::from_u32(n), Some(StatusCode::NotFound));
        assert!(StatusCode::from_u32(99999).is_none());
        let n: u32 = StatusCode::Timeout.into();
        assert_eq!(n, 6003);
    }

    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::NotFound.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::Internal.log_level(), LogLevel::Error);
        assert_eq!(StatusCode::Io.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_display_contains_name_and_code() {
        let s = StatusCode::NotFound.to_string();
        assert!(s.contains("NotFound"), "got: {s}");
        assert!(s.contains("2000"), "got: {s}");
    }
}

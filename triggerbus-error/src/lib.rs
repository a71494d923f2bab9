pub mod ext;
pub mod status_code;
pub mod types;

// Re-export everything from the submodules so callers can use flat paths.
pub use ext::*;
pub use status_code::*;
pub use types::*;

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

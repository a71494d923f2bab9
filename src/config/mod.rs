pub mod settings;

pub use settings::{ConnectionConfig, Settings};

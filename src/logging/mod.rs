//! Structured logging setup: `tracing` events routed through an `EnvFilter`
//! to a console sink and an optional rolling file sink.

pub mod config;
mod filters;
pub mod formatter;
pub mod handle;
pub mod sinks;

pub use self::config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig, Rotation};
pub use handle::{LoggingHandle, LoggingStats};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::InitError;

/// Installs the global subscriber described by `config`.
///
/// `TRIGGERBUS_LOG_*` variables are applied first; `RUST_LOG`, when set,
/// replaces the configured filter. Keep the returned handle alive for as
/// long as file logging should run.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, InitError> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer_with_config(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer_with_config(&config);
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|err| InitError::AlreadyInitialized {
            reason: err.to_string(),
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        console = config.console.enabled,
        file = config.file.enabled,
        log_dir = %config.log_dir.display(),
        "logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}

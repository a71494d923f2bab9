use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// Settings of the default broker transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Buffer size of each broker pattern channel. Subscribers that fall
    /// further behind lose messages.
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Defaults overlaid with `TRIGGERBUS_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder(None)?.build()?.try_deserialize()
    }

    /// Like [`Settings::load`], with an optional file in between. A missing
    /// file is not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::builder(Some(path.as_ref()))?.build()?.try_deserialize()
    }

    fn builder(
        path: Option<&Path>
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = Config::builder()
            .set_default(
                "connection.channel_capacity",
                ConnectionConfig::default().channel_capacity as u64,
            )?
            .set_default("logging.level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        // Nested keys use a double underscore:
        // TRIGGERBUS_CONNECTION__CHANNEL_CAPACITY=64
        Ok(builder.add_source(
            Environment::with_prefix("TRIGGERBUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        ))
    }
}

use std::{collections::BTreeMap, env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::InitError;

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = InitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(InitError::InvalidLogConfig {
                reason: format!("unknown log format '{other}'"),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        };
        f.write_str(name)
    }
}

/// File rotation period.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Falls back to [`LoggingConfig::format`].
    pub format: Option<LogFormat>,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: None,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// File name prefix inside [`LoggingConfig::log_dir`].
    pub filename: String,
    /// Falls back to JSON.
    pub format: Option<LogFormat>,
    pub rotation: Rotation,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filename: "triggerbus.log".to_string(),
            format: None,
            rotation: Rotation::Daily,
        }
    }
}

/// Logging configuration, loadable as the `logging` section of
/// [`Settings`](crate::config::Settings).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level: trace, debug, info, warn, error or off.
    pub level: String,
    pub format: LogFormat,
    pub log_dir: PathBuf,
    /// Per-target levels, e.g. `"triggerbus::pubsub" = "trace"`.
    pub targets: BTreeMap<String, String>,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            log_dir: PathBuf::from("logs"),
            targets: BTreeMap::new(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Applies `TRIGGERBUS_LOG_*` variables. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("TRIGGERBUS_LOG_LEVEL") {
            self.level = level.to_ascii_lowercase();
        }
        if let Some(format) = env::var("TRIGGERBUS_LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.format = format;
        }
        if let Ok(dir) = env::var("TRIGGERBUS_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = env_flag("TRIGGERBUS_LOG_CONSOLE") {
            self.console.enabled = enabled;
        }
        if let Some(enabled) = env_flag("TRIGGERBUS_LOG_FILE") {
            self.file.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), InitError> {
        check_level(&self.level)?;
        for (target, level) in &self.targets {
            if target.is_empty() {
                return Err(InitError::InvalidLogConfig {
                    reason: "empty target name".to_string(),
                });
            }
            check_level(level)?;
        }
        if self.file.enabled && self.file.filename.trim().is_empty() {
            return Err(InitError::InvalidLogConfig {
                reason: "file logging enabled without a file name".to_string(),
            });
        }
        Ok(())
    }

    /// `EnvFilter` directive, e.g. `"info,triggerbus::pubsub=trace"`.
    pub fn build_filter_directive(&self) -> String {
        let mut directive = self.level.clone();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level);
        }
        directive
    }

    pub fn ensure_log_dir(&self) -> Result<(), InitError> {
        if self.file.enabled {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    pub fn console_format(&self) -> LogFormat {
        self.console.format.unwrap_or(self.format)
    }

    pub fn file_format(&self) -> LogFormat {
        self.file.format.unwrap_or(LogFormat::Json)
    }
}

fn check_level(level: &str) -> Result<(), InitError> {
    if LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(InitError::InvalidLogConfig {
            reason: format!("unknown level '{level}'"),
        })
    }
}

fn env_flag(name: &str) -> Option<bool> {
    match env::var(name).ok()?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

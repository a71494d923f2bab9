use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{
    config::{LoggingConfig, Rotation},
    formatter::{self, LayerOptions},
};

fn appender(config: &LoggingConfig) -> RollingFileAppender {
    let dir = &config.log_dir;
    let name = &config.file.filename;
    match config.file.rotation {
        Rotation::Minutely => rolling::minutely(dir, name),
        Rotation::Hourly => rolling::hourly(dir, name),
        Rotation::Daily => rolling::daily(dir, name),
        Rotation::Never => rolling::never(dir, name),
    }
}

/// Non-blocking rolling file layer. Logs are flushed when the returned guard
/// is dropped.
pub fn layer_with_config<S>(
    config: &LoggingConfig
) -> (Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let (writer, guard) = non_blocking(appender(config));
    let layer = formatter::build_formatter(config.file_format(), LayerOptions::plain(), writer);
    (layer, guard)
}

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Presentation switches shared by every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerOptions {
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl From<&ConsoleConfig> for LayerOptions {
    fn from(console: &ConsoleConfig) -> Self {
        Self {
            with_ansi: console.with_ansi,
            with_target: console.with_target,
            with_thread_ids: console.with_thread_ids,
            with_line_numbers: console.with_line_numbers,
        }
    }
}

impl LayerOptions {
    /// Plain text with every location field, for files.
    pub fn plain() -> Self {
        Self {
            with_ansi: false,
            with_target: true,
            with_thread_ids: true,
            with_line_numbers: true,
        }
    }
}

/// Builds a fmt layer in `format` writing to `writer`.
///
/// Returned boxed so json/pretty/compact layers share one type.
pub fn build_formatter<S, W>(
    format: LogFormat,
    options: LayerOptions,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(options.with_target)
                .with_thread_ids(options.with_thread_ids)
                .with_line_number(options.with_line_numbers);
            Box::new(layer)
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .event_format(fmt::format().pretty())
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(options.with_ansi)
                .with_target(options.with_target)
                .with_thread_ids(options.with_thread_ids)
                .with_line_number(options.with_line_numbers);
            Box::new(layer)
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .event_format(fmt::format().compact())
                .with_writer(writer)
                .with_ansi(options.with_ansi)
                .with_target(options.with_target)
                .with_thread_ids(options.with_thread_ids)
                .with_line_number(options.with_line_numbers);
            Box::new(layer)
        }
    }
}

use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// `RUST_LOG` when set, the configured directive otherwise.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(err) => {
            // No subscriber is installed yet, stderr is all there is.
            eprintln!("invalid log filter directive '{directive}': {err}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}

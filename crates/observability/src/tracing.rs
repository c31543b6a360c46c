use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig};

fn filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter))
}

/// Install the fmt subscriber. Filtering comes from `RUST_LOG`, falling back
/// to the configured default.
pub fn init_with(config: &ObservabilityConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    // `try_init` fails once a global subscriber exists; that is the no-op case.
    let _ = match config.format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(&ObservabilityConfig::default().with_default_filter("debug")))
        .with_test_writer()
        .try_init();
}

//! Tracing/logging setup shared by binaries and tests.

pub mod config;

/// Subscriber installation.
pub mod tracing;

pub use config::{LogFormat, ObservabilityConfig};

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(&ObservabilityConfig::from_env());
}

/// Initialize process-wide logging with an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init_with(config);
}

/// Route logs to the test harness writer (captured per test).
pub fn init_for_tests() {
    tracing::init_for_tests();
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ENV_LOG_FORMAT: &str = "COGS_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output for local use.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Reads `COGS_LOG_FORMAT`; unknown values keep JSON.
    pub fn from_env() -> Self {
        Self::from_format_var(std::env::var(ENV_LOG_FORMAT).ok().as_deref())
    }

    fn from_format_var(raw: Option<&str>) -> Self {
        let format = raw.and_then(|v| v.parse().ok()).unwrap_or_default();
        Self::default().with_format(format)
    }
}

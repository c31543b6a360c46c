//! Orchestrator configuration.

use chrono::{NaiveDate, Utc};

use cogs_accounting::JournalAccounts;
use cogs_costing::{CostingMode, Validator};

pub const ENV_MODE: &str = "COGS_MODE";
pub const ENV_PREVALIDATE: &str = "COGS_PREVALIDATE";
pub const ENV_DEFAULT_ACTOR: &str = "COGS_DEFAULT_ACTOR";

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Mode used when a request leaves `mode` empty.
    pub default_mode: CostingMode,
    /// Run the pre-flight validator before the engine.
    pub prevalidate: bool,
    /// Recorded as `created_by` / `rolled_back_by` when the caller gives none.
    pub default_actor: String,
    /// Reference date for future-date checks; `None` means the current UTC date.
    pub today: Option<NaiveDate>,
    pub journal_accounts: JournalAccounts,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_mode: CostingMode::Fifo,
            prevalidate: true,
            default_actor: "system".to_string(),
            today: None,
            journal_accounts: JournalAccounts::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_mode(mut self, mode: CostingMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_prevalidation(mut self, enabled: bool) -> Self {
        self.prevalidate = enabled;
        self
    }

    pub fn with_default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_journal_accounts(mut self, accounts: JournalAccounts) -> Self {
        self.journal_accounts = accounts;
        self
    }

    /// Read `COGS_MODE`, `COGS_PREVALIDATE` and `COGS_DEFAULT_ACTOR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    /// Unparseable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MODE) {
            match raw.parse::<CostingMode>() {
                Ok(mode) => config.default_mode = mode,
                Err(e) => tracing::warn!(value = %raw, error = %e, "invalid {ENV_MODE}; using fifo"),
            }
        }

        if let Some(raw) = lookup(ENV_PREVALIDATE) {
            match parse_bool(&raw) {
                Some(enabled) => config.prevalidate = enabled,
                None => tracing::warn!(value = %raw, "invalid {ENV_PREVALIDATE}; using true"),
            }
        }

        if let Some(raw) = lookup(ENV_DEFAULT_ACTOR) {
            let actor = raw.trim();
            if actor.is_empty() {
                tracing::warn!("empty {ENV_DEFAULT_ACTOR}; using system");
            } else {
                config.default_actor = actor.to_string();
            }
        }

        config
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.today.unwrap_or_else(|| Utc::now().date_naive()))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        assert_eq!(OrchestratorConfig::from_lookup(lookup(&[])), OrchestratorConfig::default());
    }

    #[test]
    fn reads_values() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            (ENV_MODE, "FIFO"),
            (ENV_PREVALIDATE, "off"),
            (ENV_DEFAULT_ACTOR, " importer "),
        ]));
        assert_eq!(config.default_mode, CostingMode::Fifo);
        assert!(!config.prevalidate);
        assert_eq!(config.default_actor, "importer");
    }

    #[test]
    fn bad_values_fall_back() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            (ENV_MODE, "lifo"),
            (ENV_PREVALIDATE, "maybe"),
            (ENV_DEFAULT_ACTOR, "   "),
        ]));
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn builder_and_validator_date() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let config = OrchestratorConfig::default()
            .with_prevalidation(false)
            .with_default_actor("ops")
            .with_today(today);
        assert!(!config.prevalidate);
        assert_eq!(config.default_actor, "ops");
        assert_eq!(config.validator().today(), today);
    }
}

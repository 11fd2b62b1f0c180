//! Run configuration.
//!
//! Loaded from an optional YAML file, then overridden from the environment.
//!
//! ```yaml
//! bot_username: "@my_bot"
//! scenario_file: scenarios.csv
//! log_dir: logs
//! reply_timeout_secs: 15
//! settle_delay_ms: 1000
//! columns:
//!   scenario: Scenario
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::ActionMarkers;
use crate::interpreter::InterpreterConfig;
use crate::source::ColumnMapping;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("bot_username is not set (config file or BOTCHECK_BOT_USERNAME)")]
    MissingBotUsername,

    #[error("reply_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("max_retries must be greater than zero")]
    ZeroRetryBudget,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotcheckConfig {
    /// Conversation target, e.g. `@my_bot`.
    pub bot_username: String,

    /// CSV file with the scenario table.
    pub scenario_file: PathBuf,

    /// Directory for run logs and reports.
    pub log_dir: PathBuf,

    /// How long to wait for each bot reply.
    pub reply_timeout_secs: u64,

    /// Pause after steps that expect no reply.
    pub settle_delay_ms: u64,

    /// Per-scenario limit on `UNTIL_REPLY` jump-backs.
    pub max_retries: usize,

    pub columns: ColumnMapping,

    pub markers: ActionMarkers,
}

impl Default for BotcheckConfig {
    fn default() -> Self {
        Self {
            bot_username: String::new(),
            scenario_file: PathBuf::from("scenarios.csv"),
            log_dir: PathBuf::from("logs"),
            reply_timeout_secs: 15,
            settle_delay_ms: 1000,
            max_retries: 10_000,
            columns: ColumnMapping::default(),
            markers: ActionMarkers::default(),
        }
    }
}

impl BotcheckConfig {
    /// Loads `path` if it exists, falling back to defaults, then applies
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_yaml_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parses configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies `BOTCHECK_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(username) = get("BOTCHECK_BOT_USERNAME").or_else(|| get("BOT_USERNAME")) {
            self.bot_username = username.trim().to_string();
        }
        if let Some(file) = get("BOTCHECK_SCENARIO_FILE") {
            self.scenario_file = PathBuf::from(file);
        }
        if let Some(dir) = get("BOTCHECK_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(value) = get("BOTCHECK_REPLY_TIMEOUT_SECS") {
            self.reply_timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "BOTCHECK_REPLY_TIMEOUT_SECS",
                value,
            })?;
        }
        Ok(())
    }

    /// Checks that a run can start with this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_username.trim().is_empty() {
            return Err(ConfigError::MissingBotUsername);
        }
        if self.reply_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetryBudget);
        }
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Interpreter settings derived from this configuration.
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig::new(self.bot_username.trim())
            .with_reply_timeout(self.reply_timeout())
            .with_settle_delay(self.settle_delay())
            .with_max_retries(self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = BotcheckConfig::default();
        assert_eq!(config.scenario_file, PathBuf::from("scenarios.csv"));
        assert_eq!(config.reply_timeout(), Duration::from_secs(15));
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.columns.scenario, "Сценарий");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingBotUsername)
        ));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = BotcheckConfig::from_yaml_str(
            r#"
bot_username: "@demo_bot"
reply_timeout_secs: 30
columns:
  scenario: Scenario
markers:
  button: ["Presses"]
"#,
        )
        .unwrap();
        assert_eq!(config.bot_username, "@demo_bot");
        assert_eq!(config.reply_timeout_secs, 30);
        assert_eq!(config.columns.scenario, "Scenario");
        assert_eq!(config.columns.action, "Действие юзера");
        assert_eq!(config.markers.button, vec!["Presses"]);
        assert_eq!(config.markers.placeholder_substitute, "Тестировщик");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        config.validate().unwrap();
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(
            BotcheckConfig::from_yaml_str("  \n").unwrap(),
            BotcheckConfig::default()
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = BotcheckConfig::from_yaml_str("bot_username: '@file_bot'").unwrap();
        config
            .apply_env_overrides_from(env(&[
                ("BOTCHECK_BOT_USERNAME", "@env_bot"),
                ("BOTCHECK_LOG_DIR", "/tmp/botcheck"),
                ("BOTCHECK_REPLY_TIMEOUT_SECS", "5"),
            ]))
            .unwrap();
        assert_eq!(config.bot_username, "@env_bot");
        assert_eq!(config.log_dir, PathBuf::from("/tmp/botcheck"));
        assert_eq!(config.reply_timeout_secs, 5);
    }

    #[test]
    fn legacy_bot_username_variable() {
        let mut config = BotcheckConfig::default();
        config
            .apply_env_overrides_from(env(&[("BOT_USERNAME", "@legacy_bot")]))
            .unwrap();
        assert_eq!(config.bot_username, "@legacy_bot");
    }

    #[test]
    fn invalid_env_timeout() {
        let mut config = BotcheckConfig::default();
        let err = config
            .apply_env_overrides_from(env(&[("BOTCHECK_REPLY_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "BOTCHECK_REPLY_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = BotcheckConfig {
            bot_username: "@bot".into(),
            reply_timeout_secs: 0,
            ..BotcheckConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let config = BotcheckConfig {
            bot_username: "@bot".into(),
            max_retries: 0,
            ..BotcheckConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRetryBudget)
        ));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BotcheckConfig::load(&dir.path().join("botcheck.yml")).unwrap();
        assert_eq!(config.max_retries, 10_000);
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("botcheck.yml");
        std::fs::write(&path, "bot_username: '@file_bot'\nmax_retries: 50\n").unwrap();
        let config = BotcheckConfig::load(&path).unwrap();
        assert_eq!(config.max_retries, 50);
    }

    #[test]
    fn interpreter_config_carries_settings() {
        let config = BotcheckConfig {
            bot_username: " @bot ".into(),
            settle_delay_ms: 250,
            ..BotcheckConfig::default()
        };
        let interpreter = config.interpreter_config();
        assert_eq!(interpreter.target, "@bot");
        assert_eq!(interpreter.settle_delay, Duration::from_millis(250));
        assert_eq!(interpreter.max_retries, 10_000);
    }
}

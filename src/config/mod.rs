//! Configuration
//!
//! A JSON5 file deserialized into [`BotConfig`]; every field has a default,
//! so a missing file is a valid (if token-less) configuration. A handful of
//! environment variables override file values:
//!
//! - `BOT_TOKEN`: Telegram bot token
//! - `CLASSBOT_DATA_DIR`: directory for documents and the static catalog
//! - `CLASSBOT_LOG`: log filter directive
//!
//! The file location is `--config`, else `CLASSBOT_CONFIG`, else
//! `<config dir>/classbot/config.json5`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channels::telegram::TelegramConfig;
use crate::cron::parse_time_of_day;
use crate::tracing::LoggingConfig;

pub const DEFAULT_TIMEZONE: &str = "Europe/Minsk";
pub const CONFIG_PATH_ENV: &str = "CLASSBOT_CONFIG";
pub const TOKEN_ENV: &str = "BOT_TOKEN";
pub const DATA_DIR_ENV: &str = "CLASSBOT_DATA_DIR";
pub const LOG_ENV: &str = "CLASSBOT_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid announce time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("polls.persistIntervalSecs must be greater than zero")]
    InvalidInterval,

    #[error("bot token missing: set telegram.botToken or BOT_TOKEN")]
    MissingToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BirthdaysConfig {
    pub enabled: bool,
    /// Local announce time, `HH:MM`
    pub at: String,
    pub catch_up_on_start: bool,
    pub catch_up_delay_secs: u64,
}

impl Default for BirthdaysConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            at: "00:00".to_string(),
            catch_up_on_start: true,
            catch_up_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollsConfig {
    pub persist_interval_secs: u64,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            persist_interval_secs: 12,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub timezone: String,
    pub birthdays: BirthdaysConfig,
    pub polls: PollsConfig,
    pub logging: LoggingConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            data_dir: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            birthdays: BirthdaysConfig::default(),
            polls: PollsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn announce_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_time_of_day(&self.birthdays.at)
            .ok_or_else(|| ConfigError::InvalidTime(self.birthdays.at.clone()))
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.polls.persist_interval_secs)
    }

    /// Configured data directory, else `<data dir>/classbot`, else `./data`
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("classbot"))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Check everything except the token
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        self.announce_time()?;
        if self.polls.persist_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    /// The bot token, if one is configured
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        let token = self.telegram.bot_token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(token)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("classbot")
        .join("config.json5")
}

/// Resolve the config file path from the flag, the environment or the default
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_config_path(),
    }
}

/// Parse a config file body
pub fn parse_config(raw: &str, path: &Path) -> Result<BotConfig, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(BotConfig::default());
    }
    json5::from_str(raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load from `path` (missing file = defaults), apply environment overrides, validate
pub fn load_config(path: &Path) -> Result<BotConfig, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(raw) => parse_config(&raw, path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => BotConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Minsk);
        assert_eq!(config.announce_time().unwrap(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(config.persist_interval(), Duration::from_secs(12));
        assert!(config.birthdays.catch_up_on_start);
        assert!(config.validate().is_ok());
        assert!(matches!(config.require_token(), Err(ConfigError::MissingToken)));
    }

    #[test]
    fn test_parse_json5_partial() {
        let raw = r#"{
            // comments and trailing commas are fine
            telegram: { botToken: "123:abc", pollTimeoutSecs: 20 },
            timezone: "Europe/Moscow",
            birthdays: { at: "08:30" },
            polls: { persistIntervalSecs: 30, },
        }"#;
        let config = parse_config(raw, Path::new("test.json5")).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.poll_timeout_secs, 20);
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.birthdays.at, "08:30");
        assert!(config.birthdays.enabled);
        assert_eq!(config.persist_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = BotConfig {
            timezone: "Mars/Olympus".to_string(),
            ..BotConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimezone(_))));

        config.timezone = DEFAULT_TIMEZONE.to_string();
        config.birthdays.at = "24:61".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTime(_))));

        config.birthdays.at = "00:00".to_string();
        config.polls.persist_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (TOKEN_ENV, " 42:token "),
            (DATA_DIR_ENV, "/srv/classbot"),
            (LOG_ENV, "debug"),
        ]
        .into_iter()
        .collect();
        let mut config = BotConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.require_token().unwrap(), "42:token");
        assert_eq!(config.data_dir(), PathBuf::from("/srv/classbot"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_config("{ telegram: ", Path::new("bad.json5")).unwrap_err();
        assert!(err.to_string().contains("bad.json5"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ timezone: 'UTC' }").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/x.json5")));
        assert_eq!(path, PathBuf::from("/tmp/x.json5"));
    }
}

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Placeholder values written into the example config file.
pub const TOKEN_PLACEHOLDER: &str = "SEU_TOKEN_AQUI";
pub const CHAT_ID_PLACEHOLDER: &str = "SEU_CHAT_ID_AQUI";

/// Upper bound for entry offsets and tolerance, in minutes.
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token - loaded from env TELEGRAM_TOKEN when set
    #[serde(default)]
    pub token: String,
    /// Destination channel/group - loaded from env TELEGRAM_CHAT_ID when set
    #[serde(default)]
    pub chat_id: String,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Optional footer link appended to every signal table.
    #[serde(default)]
    pub link_label: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
}

/// Signal strategy parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategyConfig {
    /// Consecutive non-target outcomes required to arm. Zero or negative
    /// arms on the target itself.
    #[serde(default = "default_min_absences")]
    pub min_absences: i64,
    /// Minutes after confirmation at which each entry window is centred.
    #[serde(default = "default_entry_offsets")]
    pub entry_offsets: [i64; 3],
    /// Half-width of every entry window, in minutes.
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: i64,
    #[serde(default = "default_max_signals_per_day")]
    pub max_signals_per_day: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Recent-results endpoint, most recent first.
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Emit a status line every N ticks.
    #[serde(default = "default_status_every_ticks")]
    pub status_every_ticks: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_min_absences() -> i64 {
    5
}
fn default_entry_offsets() -> [i64; 3] {
    [4, 7, 10]
}
fn default_tolerance_minutes() -> i64 {
    1
}
fn default_max_signals_per_day() -> u32 {
    50
}
fn default_feed_url() -> String {
    "https://blaze.bet.br/api/singleplayer-originals/originals/roulette_games/recent/1".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_status_every_ticks() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_absences: default_min_absences(),
            entry_offsets: default_entry_offsets(),
            tolerance_minutes: default_tolerance_minutes(),
            max_signals_per_day: default_max_signals_per_day(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            status_every_ticks: default_status_every_ticks(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build a config from environment variables and defaults only.
    pub fn from_env() -> Self {
        Config {
            telegram: TelegramConfig {
                token: std::env::var("TELEGRAM_TOKEN").unwrap_or_default(),
                chat_id: std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
                api_url: std::env::var("TELEGRAM_API_URL")
                    .unwrap_or_else(|_| default_telegram_api_url()),
                link_label: None,
                link_url: None,
            },
            strategy: StrategyConfig::default(),
            feed: FeedConfig {
                url: std::env::var("BRANCO_FEED_URL").unwrap_or_else(|_| default_feed_url()),
                ..FeedConfig::default()
            },
            runner: RunnerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn apply_env_overrides(&mut self) {
        // Secrets may live outside the file entirely
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            if !token.is_empty() {
                self.telegram.token = token;
            }
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat_id.is_empty() {
                self.telegram.chat_id = chat_id;
            }
        }
    }

    /// Reject settings the bot cannot run with. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.is_empty() || self.telegram.token == TOKEN_PLACEHOLDER {
            return Err(ConfigError::Missing("telegram.token (or TELEGRAM_TOKEN)"));
        }
        if self.telegram.chat_id.is_empty() || self.telegram.chat_id == CHAT_ID_PLACEHOLDER {
            return Err(ConfigError::Missing("telegram.chat_id (or TELEGRAM_CHAT_ID)"));
        }
        if self.feed.url.is_empty() {
            return Err(ConfigError::Missing("feed.url"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "feed.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        let in_range = |m: i64| (0..=MAX_WINDOW_MINUTES).contains(&m);
        if let Some(bad) = self.strategy.entry_offsets.iter().find(|m| !in_range(**m)) {
            return Err(ConfigError::Invalid {
                field: "strategy.entry_offsets",
                reason: format!("offset {} outside 0..={}", bad, MAX_WINDOW_MINUTES),
            });
        }
        if !in_range(self.strategy.tolerance_minutes) {
            return Err(ConfigError::Invalid {
                field: "strategy.tolerance_minutes",
                reason: format!(
                    "{} outside 0..={}",
                    self.strategy.tolerance_minutes, MAX_WINDOW_MINUTES
                ),
            });
        }
        if self.runner.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "runner.poll_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Example file written on first run when no config exists.
pub fn example_toml() -> String {
    format!(
        r#"[telegram]
token = "{token}"
chat_id = "{chat}"

[strategy]
min_absences = {absences}
entry_offsets = [4, 7, 10]
tolerance_minutes = {tolerance}
max_signals_per_day = {max}

[feed]
url = "{url}"
timeout_secs = {timeout}
retry_attempts = {retries}

[logging]
level = "info"
json = false
"#,
        token = TOKEN_PLACEHOLDER,
        chat = CHAT_ID_PLACEHOLDER,
        absences = default_min_absences(),
        tolerance = default_tolerance_minutes(),
        max = default_max_signals_per_day(),
        url = default_feed_url(),
        timeout = default_timeout_secs(),
        retries = default_retry_attempts(),
    )
}

pub fn write_example(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, example_toml())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[telegram]
token = "123:abc"
chat_id = "-100200"
"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.strategy.min_absences, 5);
        assert_eq!(config.strategy.entry_offsets, [4, 7, 10]);
        assert_eq!(config.strategy.tolerance_minutes, 1);
        assert_eq!(config.strategy.max_signals_per_day, 50);
        assert_eq!(config.feed.timeout_secs, 10);
        assert_eq!(config.feed.retry_attempts, 3);
        assert_eq!(config.runner.poll_interval_ms, 1000);
        assert_eq!(config.runner.status_every_ticks, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_overrides() {
        let raw = format!(
            "{}\n[strategy]\nmin_absences = 0\nentry_offsets = [2, 5, 8]\ntolerance_minutes = 2\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert_eq!(config.strategy.min_absences, 0);
        assert_eq!(config.strategy.entry_offsets, [2, 5, 8]);
        assert_eq!(config.strategy.tolerance_minutes, 2);
        assert_eq!(config.strategy.max_signals_per_day, 50);
    }

    #[test]
    fn test_offsets_must_be_three() {
        let raw = format!("{}\n[strategy]\nentry_offsets = [4, 7]\n", MINIMAL);
        assert!(toml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn test_example_is_rejected_until_filled_in() {
        let config: Config = toml::from_str(&example_toml()).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let filled = example_toml()
            .replace(TOKEN_PLACEHOLDER, "123:abc")
            .replace(CHAT_ID_PLACEHOLDER, "-100200");
        let config: Config = toml::from_str(&filled).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_offsets() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.strategy.entry_offsets = [4, -1, 10];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "strategy.entry_offsets", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let raw = format!(
            "{}\n[strategy]\nentry_offsets = [4, 7, 1000000000000]\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "strategy.entry_offsets", .. })
        ));

        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.strategy.entry_offsets = [4, 7, MAX_WINDOW_MINUTES];
        config.strategy.tolerance_minutes = MAX_WINDOW_MINUTES;
        assert!(config.validate().is_ok());

        config.strategy.tolerance_minutes = MAX_WINDOW_MINUTES + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "strategy.tolerance_minutes", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branco.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(&path).unwrap();
        assert!(!config.telegram.chat_id.is_empty());

        let missing = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_write_example_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branco.toml");
        write_example(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let config: Config = toml::from_str(&raw).unwrap();
        assert_eq!(config.strategy, StrategyConfig::default());
    }
}

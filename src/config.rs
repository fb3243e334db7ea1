use cron::Schedule;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Startup configuration errors. These are the only fatal errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown data source {0:?} (expected yahoo, rest or mock)")]
    UnknownDataSource(String),

    #[error("monthly budget must be positive, got {0}")]
    NonPositiveBudget(f64),

    #[error("DATA_SOURCE=rest requires DATA_SOURCE_BASE_URL")]
    MissingBaseUrl,

    #[error("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together")]
    IncompleteTelegram,

    #[error("{key} is not a valid cron expression ({expr:?}): {reason}")]
    InvalidCron {
        key: &'static str,
        expr: String,
        reason: String,
    },
}

/// Which market data source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Yahoo,
    Rest,
    Mock,
}

impl FromStr for DataSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "rest" | "vstrader" => Ok(Self::Rest),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigError::UnknownDataSource(other.to_string())),
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yahoo => "yahoo",
            Self::Rest => "rest",
            Self::Mock => "mock",
        })
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Cron expressions (seconds-first, six fields) for the periodic tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub weekly: String,
    pub daily: String,
    pub monthly: String,
    pub quarterly: String,
    pub weekly_reset: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekly: "0 0 8 * * Mon".to_string(),
            daily: "0 0 22 * * Mon-Fri".to_string(),
            monthly: "0 0 9 1 * *".to_string(),
            quarterly: "0 0 9 1 1,4,7,10 *".to_string(),
            weekly_reset: "0 0 0 * * Mon".to_string(),
        }
    }
}

impl ScheduleConfig {
    pub(crate) fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("CRON_WEEKLY", self.weekly.as_str()),
            ("CRON_DAILY", self.daily.as_str()),
            ("CRON_MONTHLY", self.monthly.as_str()),
            ("CRON_QUARTERLY", self.quarterly.as_str()),
            ("CRON_WEEKLY_RESET", self.weekly_reset.as_str()),
        ]
    }
}

/// Parse a cron expression, naming the variable it came from on failure.
pub fn parse_schedule(key: &'static str, expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expr).map_err(|e| ConfigError::InvalidCron {
        key,
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Instrument to track.
    pub symbol: String,
    pub data_source: DataSourceKind,
    pub data_source_base_url: Option<String>,
    pub data_source_api_key: Option<String>,
    /// Outbound proxy for data and notification requests.
    pub https_proxy: Option<String>,
    /// Price served by the mock source.
    pub mock_price: f64,
    pub monthly_budget: f64,
    pub fund_state_file: PathBuf,
    /// History database; `None` disables recording.
    pub sqlite_path: Option<PathBuf>,
    /// `None` sends notifications to the log only.
    pub telegram: Option<TelegramConfig>,
    pub schedule: ScheduleConfig,
    /// Retries after the first failed notification attempt.
    pub notify_max_retries: u32,
    /// Run one weekly cycle right after startup.
    pub run_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            symbol: "SPX500".to_string(),
            data_source: DataSourceKind::Yahoo,
            data_source_base_url: None,
            data_source_api_key: None,
            https_proxy: None,
            mock_price: 5800.0,
            monthly_budget: 10_000.0,
            fund_state_file: PathBuf::from("data/fund_state.json"),
            sqlite_path: Some(PathBuf::from("data/sentinel.db")),
            telegram: None,
            schedule: ScheduleConfig::default(),
            notify_max_retries: 3,
            run_on_start: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let data_source_base_url = get("DATA_SOURCE_BASE_URL");
        let data_source = match get("DATA_SOURCE") {
            Some(v) => v.parse()?,
            None if data_source_base_url.is_some() => DataSourceKind::Rest,
            None => DataSourceKind::Yahoo,
        };

        let monthly_budget = match get("MONTHLY_BUDGET") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "MONTHLY_BUDGET",
                value: v.clone(),
            })?,
            None => defaults.monthly_budget,
        };

        // An explicitly empty SQLITE_PATH disables the recorder.
        let sqlite_path = match lookup("SQLITE_PATH") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => defaults.sqlite_path,
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTelegram),
        };

        let schedule = ScheduleConfig {
            weekly: get("CRON_WEEKLY").unwrap_or(defaults.schedule.weekly),
            daily: get("CRON_DAILY").unwrap_or(defaults.schedule.daily),
            monthly: get("CRON_MONTHLY").unwrap_or(defaults.schedule.monthly),
            quarterly: get("CRON_QUARTERLY").unwrap_or(defaults.schedule.quarterly),
            weekly_reset: get("CRON_WEEKLY_RESET").unwrap_or(defaults.schedule.weekly_reset),
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            symbol: get("SYMBOL").unwrap_or(defaults.symbol),
            data_source,
            data_source_base_url,
            data_source_api_key: get("DATA_SOURCE_API_KEY"),
            https_proxy: get("HTTPS_PROXY").or_else(|| get("https_proxy")),
            mock_price: get("MOCK_PRICE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mock_price),
            monthly_budget,
            fund_state_file: get("FUND_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.fund_state_file),
            sqlite_path,
            telegram,
            schedule,
            notify_max_retries: get("NOTIFY_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.notify_max_retries),
            run_on_start: get("RUN_ON_START")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.run_on_start),
        })
    }

    /// Check semantic constraints that parsing alone cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.monthly_budget.is_finite() || self.monthly_budget <= 0.0 {
            return Err(ConfigError::NonPositiveBudget(self.monthly_budget));
        }

        if self.data_source == DataSourceKind::Rest && self.data_source_base_url.is_none() {
            return Err(ConfigError::MissingBaseUrl);
        }

        for (key, expr) in self.schedule.entries() {
            parse_schedule(key, expr)?;
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 3002);
        assert_eq!(config.symbol, "SPX500");
        assert_eq!(config.data_source, DataSourceKind::Yahoo);
        assert_eq!(config.monthly_budget, 10_000.0);
        assert!(config.telegram.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_schedules_parse() {
        for (key, expr) in ScheduleConfig::default().entries() {
            assert!(parse_schedule(key, expr).is_ok(), "{key}");
        }
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("SYMBOL", "SPY"),
            ("MONTHLY_BUDGET", "2500.5"),
            ("FUND_STATE_FILE", "/tmp/fund.json"),
            ("NOTIFY_MAX_RETRIES", "5"),
            ("RUN_ON_START", "true"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100200"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.symbol, "SPY");
        assert_eq!(config.monthly_budget, 2500.5);
        assert_eq!(config.fund_state_file, PathBuf::from("/tmp/fund.json"));
        assert_eq!(config.notify_max_retries, 5);
        assert!(config.run_on_start);
        assert_eq!(config.telegram.unwrap().chat_id, "-100200");
    }

    #[test]
    fn test_base_url_implies_rest() {
        let config = from_pairs(&[("DATA_SOURCE_BASE_URL", "http://bars.local")]).unwrap();
        assert_eq!(config.data_source, DataSourceKind::Rest);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_sqlite_path_disables_recorder() {
        let config = from_pairs(&[("SQLITE_PATH", "")]).unwrap();
        assert!(config.sqlite_path.is_none());
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn test_unknown_data_source() {
        let err = from_pairs(&[("DATA_SOURCE", "bloomberg")]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownDataSource("bloomberg".into()));
    }

    #[test]
    fn test_bad_budget() {
        assert!(matches!(
            from_pairs(&[("MONTHLY_BUDGET", "lots")]),
            Err(ConfigError::InvalidValue { key: "MONTHLY_BUDGET", .. })
        ));

        let config = from_pairs(&[("MONTHLY_BUDGET", "0")]).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveBudget(0.0)));
    }

    #[test]
    fn test_rest_requires_base_url() {
        let config = from_pairs(&[("DATA_SOURCE", "rest")]).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::MissingBaseUrl));
    }

    #[test]
    fn test_incomplete_telegram() {
        let err = from_pairs(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap_err();
        assert_eq!(err, ConfigError::IncompleteTelegram);
    }

    #[test]
    fn test_invalid_cron() {
        let config = from_pairs(&[("CRON_DAILY", "every day please")]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCron { key: "CRON_DAILY", .. })
        ));
    }
}

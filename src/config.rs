use crate::data_structures::Interval;
use price_analyzer::{AnalysisConfig, AnalysisConfigError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: '{value}'")]
    InvalidVar { name: &'static str, value: String },
    #[error("invalid analysis settings: {0}")]
    Analysis(#[from] AnalysisConfigError),
}

// Upstream market-data provider settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,    // e.g., "https://query1.finance.yahoo.com"
    pub cookie_url: String,  // visited once to obtain session cookies
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,  // first backoff step, doubled per attempt
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            cookie_url: "https://fc.yahoo.com".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            retry_base_ms: 500,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Defaults applied when a history request leaves out its range or interval
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryDefaults {
    pub default_days: i64,
    pub default_interval: Interval,
}

impl HistoryDefaults {
    pub const MAX_DEFAULT_DAYS: i64 = 36_500;

    /// `default_days` must be positive and at most a century.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (1..=Self::MAX_DEFAULT_DAYS).contains(&self.default_days) {
            Ok(())
        } else {
            Err(ConfigError::InvalidVar {
                name: "DEFAULT_HISTORY_DAYS",
                value: self.default_days.to_string(),
            })
        }
    }
}

impl Default for HistoryDefaults {
    fn default() -> Self {
        Self {
            default_days: 180,
            default_interval: Interval::OneDay,
        }
    }
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub history: HistoryDefaults,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    pub provider: ProviderConfig,
    pub history: HistoryDefaults,
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_name: "market-insights-proxy".to_string(),
            environment: "development".to_string(),
            port: 8080,
            provider: ProviderConfig::default(),
            history: HistoryDefaults::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml_file(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml_file(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        let defaults = Self::default();

        let config = Self {
            node_name: yaml_config.node_name.unwrap_or(defaults.node_name),
            environment: yaml_config.environment.unwrap_or(defaults.environment),
            port: yaml_config.port.unwrap_or(defaults.port),
            provider: yaml_config.provider,
            history: yaml_config.history,
            analysis: yaml_config.analysis,
        };
        config.history.validate()?;
        config.analysis.validate()?;
        Ok(config)
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; unset names fall back to
    /// defaults, set-but-unparseable names are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let provider = ProviderConfig {
            base_url: lookup("PROVIDER_BASE_URL").unwrap_or(defaults.provider.base_url),
            cookie_url: lookup("PROVIDER_COOKIE_URL").unwrap_or(defaults.provider.cookie_url),
            timeout_secs: parse_var(&lookup, "PROVIDER_TIMEOUT_SECS", defaults.provider.timeout_secs)?,
            max_retries: parse_var(&lookup, "PROVIDER_MAX_RETRIES", defaults.provider.max_retries)?,
            retry_base_ms: parse_var(&lookup, "PROVIDER_RETRY_BASE_MS", defaults.provider.retry_base_ms)?,
        };

        let history = HistoryDefaults {
            default_days: parse_var(&lookup, "DEFAULT_HISTORY_DAYS", defaults.history.default_days)?,
            default_interval: parse_var(&lookup, "DEFAULT_INTERVAL", defaults.history.default_interval)?,
        };

        let analysis = AnalysisConfig {
            short_window: parse_var(&lookup, "ANALYSIS_SHORT_WINDOW", defaults.analysis.short_window)?,
            long_window: parse_var(&lookup, "ANALYSIS_LONG_WINDOW", defaults.analysis.long_window)?,
            flat_band_percent: parse_var(&lookup, "ANALYSIS_FLAT_BAND", defaults.analysis.flat_band_percent)?,
            moderate_volatility: parse_var(
                &lookup,
                "ANALYSIS_MODERATE_VOLATILITY",
                defaults.analysis.moderate_volatility,
            )?,
            high_volatility: parse_var(&lookup, "ANALYSIS_HIGH_VOLATILITY", defaults.analysis.high_volatility)?,
        };
        history.validate()?;
        analysis.validate()?;

        Ok(Self {
            node_name: lookup("NODE_NAME").unwrap_or(defaults.node_name),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            provider,
            history,
            analysis,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        None => Ok(default),
    }
}

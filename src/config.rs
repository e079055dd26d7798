use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Pause before every pool details call.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_cooldown_secs")]
    pub retry_cooldown_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub restart_cooldown_secs: u64,
    /// Attempts per unit of work before it is skipped. Unset retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

/// A decentralized-exchange contract to scan.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub name: String,
    pub contract_address: String,
    pub contract_name: String,
}

fn default_api_url() -> String { "https://api.mainnet.hiro.so".to_string() }
fn default_fetch_delay_ms() -> u64 { 250 }
fn default_timeout_secs() -> u64 { 10 }
fn default_cooldown_secs() -> u64 { 5 }
fn default_cache_file() -> String { "dex-cache.json".to_string() }

fn default_exchanges() -> Vec<ExchangeConfig> {
    vec![ExchangeConfig {
        name: "CHARISMA".to_string(),
        contract_address: "SP2ZNGJ85ENDY6QRHQ5P2D4FXKGZWCKTB2T0Z55KS".to_string(),
        contract_name: "univ2-core".to_string(),
    }]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            fetch_delay_ms: default_fetch_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            retry_cooldown_secs: default_cooldown_secs(),
            restart_cooldown_secs: default_cooldown_secs(),
            max_attempts: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
        }
    }
}

impl ApiConfig {
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScanConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.retry_cooldown_secs)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "exchanges",
                reason: "at least one exchange is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for exchange in &self.exchanges {
            if exchange.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "name",
                    reason: "exchange name must not be empty".to_string(),
                });
            }
            if !seen.insert(exchange.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "name",
                    reason: format!("duplicate exchange {}", exchange.name),
                });
            }
            if exchange.contract_address.is_empty() || exchange.contract_name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "contract_address",
                    reason: format!("{} needs a contract address and name", exchange.name),
                });
            }
        }

        if self.scan.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::*;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub normalizer: NormalizerConfig,
    pub storage: StorageConfig,
    pub snapshot: SnapshotConfig,
}

/// Pagination and backoff settings handed to the fetcher at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Transient failures tolerated over a whole fetch, not per page.
    pub retry_budget: u32,
    pub retry_delay_ms: u64,
    pub courtesy_delay_ms: u64,
    /// Wait used when a 429 carries no usable Retry-After header.
    pub rate_limit_default_secs: u64,
    pub max_page_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            courtesy_delay_ms: DEFAULT_COURTESY_DELAY_MS,
            rate_limit_default_secs: DEFAULT_RATE_LIMIT_WAIT_SECS,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    pub fn rate_limit_default(&self) -> Duration {
        Duration::from_secs(self.rate_limit_default_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Reject duplicate product ids and null titles instead of passing them through.
    pub strict_mode: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { strict_mode: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub dir: String,
    pub prefix: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: DEFAULT_SNAPSHOT_DIR.to_string(),
            prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when the file does not exist,
    /// then apply `ETL_*` environment overrides.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                EtlError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&config_content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env_non_empty("ETL_BASE_URL") {
            self.fetcher.base_url = url;
        }
        if let Some(path) = env_non_empty("ETL_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(flag) = env_non_empty("ETL_STRICT_MODE") {
            self.normalizer.strict_mode = flag.parse::<bool>().map_err(|_| {
                EtlError::Config(format!("ETL_STRICT_MODE must be true or false, got '{}'", flag))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetcher.base_url.trim().is_empty() {
            return Err(EtlError::Config("fetcher.base_url must not be empty".into()));
        }
        if self.fetcher.max_page_size == 0 || self.fetcher.max_page_size > MAX_PAGE_SIZE {
            return Err(EtlError::Config(format!(
                "fetcher.max_page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.fetcher.max_page_size
            )));
        }
        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

//! Configuration file management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use glance_core::options::{
    DEFAULT_ABOVE_RANGE, DEFAULT_AUTOMATIC_FETCH_INTERVAL, DEFAULT_BELOW_RANGE,
    DEFAULT_DELTA_GAP, DEFAULT_FETCH_COUNT, DEFAULT_LOOKBACK_MINUTES,
    DEFAULT_STALE_RETRY_INTERVAL, DEFAULT_STALENESS_THRESHOLD,
};
use glance_core::throttle::DEFAULT_MIN_FETCH_INTERVAL;
use glance_core::{DisplayOptions, GlanceOptions, PollOptions, RateLimitPolicy, ShareServer};

/// Most readings the share service returns for one day (one every five minutes).
pub const MAX_FETCH_COUNT: usize = 288;
/// Longest lookback the share service accepts.
pub const MAX_LOOKBACK_MINUTES: u32 = 1440;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Share account settings.
    pub account: AccountConfig,
    /// Range thresholds and staleness.
    pub display: DisplayConfig,
    /// Polling and rate limiting.
    pub polling: PollingConfig,
    /// Local reading store.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_or_default(default_config_path())
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// A copy safe to print: the password, if any, is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.account.password.is_some() {
            copy.account.password = Some("********".to_string());
        }
        copy
    }

    /// Validate the configuration and return any errors.
    ///
    /// ```
    /// use glance_cli::config::Config;
    ///
    /// Config::default().validate().expect("defaults are valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.account.validate());
        errors.extend(self.display.validate());
        errors.extend(self.polling.validate());
        errors.extend(self.storage.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Options for the glucose monitor.
    #[must_use]
    pub fn to_options(&self) -> GlanceOptions {
        GlanceOptions {
            display: self.display.to_options(),
            polling: self.polling.to_options(),
        }
    }
}

/// Share account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// `us`, `non_us`, or a base URL.
    pub server: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            server: ShareServer::default().to_string(),
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("server", &self.server)
            .finish()
    }
}

impl AccountConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = self.server.parse::<ShareServer>() {
            errors.push(ValidationError {
                field: "account.server".to_string(),
                message: e.to_string(),
            });
        }
        if self.username.as_deref().is_some_and(|u| u.trim().is_empty()) {
            errors.push(ValidationError {
                field: "account.username".to_string(),
                message: "username cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Range thresholds and staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Values below this are shown as low (mg/dL).
    pub below_range: i32,
    /// Values above this are shown as high (mg/dL).
    pub above_range: i32,
    /// A reading older than this is stale.
    pub staleness_threshold_secs: u64,
    /// Largest gap between the two newest readings that still yields a delta.
    pub delta_gap_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            below_range: DEFAULT_BELOW_RANGE,
            above_range: DEFAULT_ABOVE_RANGE,
            staleness_threshold_secs: DEFAULT_STALENESS_THRESHOLD.as_secs(),
            delta_gap_secs: DEFAULT_DELTA_GAP.as_secs(),
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.below_range >= self.above_range {
            errors.push(ValidationError {
                field: "display.below_range".to_string(),
                message: format!(
                    "must be lower than above_range ({}), got {}",
                    self.above_range, self.below_range
                ),
            });
        }
        if self.staleness_threshold_secs == 0 {
            errors.push(ValidationError {
                field: "display.staleness_threshold_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }

        errors
    }

    fn to_options(&self) -> DisplayOptions {
        DisplayOptions {
            below_range: self.below_range,
            above_range: self.above_range,
            staleness_threshold: Duration::from_secs(self.staleness_threshold_secs),
            delta_gap: Duration::from_secs(self.delta_gap_secs),
        }
    }
}

/// Polling and rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Expected spacing between new readings.
    pub automatic_fetch_interval_secs: u64,
    /// Retry spacing while the newest reading is stale.
    pub stale_retry_interval_secs: u64,
    /// Minimum spacing between two requests to the share service.
    pub min_fetch_interval_secs: u64,
    /// What to do when a fetch comes too soon after the last one.
    pub rate_limit_policy: RateLimitPolicy,
    /// Readings requested per fetch.
    pub fetch_count: usize,
    /// How far back the share service should look.
    pub lookback_minutes: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            automatic_fetch_interval_secs: DEFAULT_AUTOMATIC_FETCH_INTERVAL.as_secs(),
            stale_retry_interval_secs: DEFAULT_STALE_RETRY_INTERVAL.as_secs(),
            min_fetch_interval_secs: DEFAULT_MIN_FETCH_INTERVAL.as_secs(),
            rate_limit_policy: RateLimitPolicy::default(),
            fetch_count: DEFAULT_FETCH_COUNT,
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.automatic_fetch_interval_secs == 0 {
            errors.push(ValidationError {
                field: "polling.automatic_fetch_interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.stale_retry_interval_secs == 0 {
            errors.push(ValidationError {
                field: "polling.stale_retry_interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.fetch_count == 0 || self.fetch_count > MAX_FETCH_COUNT {
            errors.push(ValidationError {
                field: "polling.fetch_count".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_FETCH_COUNT, self.fetch_count
                ),
            });
        }
        if self.lookback_minutes == 0 || self.lookback_minutes > MAX_LOOKBACK_MINUTES {
            errors.push(ValidationError {
                field: "polling.lookback_minutes".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_LOOKBACK_MINUTES, self.lookback_minutes
                ),
            });
        }

        errors
    }

    fn to_options(&self) -> PollOptions {
        PollOptions {
            automatic_fetch_interval: Duration::from_secs(self.automatic_fetch_interval_secs),
            stale_retry_interval: Duration::from_secs(self.stale_retry_interval_secs),
            min_fetch_interval: Duration::from_secs(self.min_fetch_interval_secs),
            rate_limit_policy: self.rate_limit_policy,
            fetch_count: self.fetch_count,
            lookback_minutes: self.lookback_minutes,
        }
    }
}

/// Local reading store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Load stored readings at start and save new ones.
    pub enabled: bool,
    /// Database file.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: glance_store::default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.enabled && self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }
        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `display.below_range`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glance")
        .join("config.toml")
}

// crates/coinload-config/src/config.rs
// ============================================================================
// Module: Coinload Configuration
// Description: Configuration loading and validation for load-test runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: coinload-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, then `COINLOAD_CONFIG`, then
//! `coinload.toml` in the working directory. Unknown keys are rejected and
//! every value is range-checked before any traffic is generated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use coinload_core::ExecutorConfig;
use coinload_core::HarnessSettings;
use coinload_core::LoadProfile;
use coinload_core::ScenarioSettings;
use coinload_core::UserPoolSettings;
use coinload_core::credentials::DEFAULT_PASSWORD;
use coinload_core::credentials::DEFAULT_USERNAME_PREFIX;
use coinload_core::executor::DEFAULT_MAX_RESPONSE_BYTES;
use coinload_core::executor::DEFAULT_USER_AGENT;
use coinload_core::harness::DEFAULT_MAX_CHECK_FAILURE_RATIO;
use coinload_core::harness::DEFAULT_USER_POOL_SIZE;
use coinload_core::scenario::DEFAULT_ITEM;
use coinload_core::scenario::DEFAULT_TRANSFER_AMOUNT;
use coinload_core::scheduler::DEFAULT_MAX_WORKERS;
use coinload_core::scheduler::DEFAULT_PRE_ALLOCATED_WORKERS;
use coinload_core::scheduler::DEFAULT_RATE_PER_SECOND;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "coinload.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "COINLOAD_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Default target base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
/// Default admission window in seconds.
pub const DEFAULT_DURATION_SECONDS: u64 = 300;
/// Default inter-step delay in milliseconds.
pub const DEFAULT_INTER_STEP_DELAY_MS: u64 = 1_000;
/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Maximum synthetic user pool size.
pub(crate) const MAX_USER_POOL_SIZE: usize = 1_000_000;
/// Minimum username length accepted by the target API.
pub(crate) const MIN_USERNAME_LENGTH: usize = 4;
/// Maximum username length accepted by the target API.
pub(crate) const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum password length.
pub(crate) const MAX_PASSWORD_LENGTH: usize = 256;
/// Maximum arrival rate in iterations per second.
pub(crate) const MAX_RATE_PER_SECOND: f64 = 100_000.0;
/// Maximum admission window in seconds.
pub(crate) const MAX_DURATION_SECONDS: u64 = 86_400;
/// Maximum worker limit.
pub(crate) const MAX_WORKERS: usize = 100_000;
/// Maximum inter-step delay in milliseconds.
pub(crate) const MAX_INTER_STEP_DELAY_MS: u64 = 60_000;
/// Maximum item name length accepted by the target API.
pub(crate) const MAX_ITEM_LENGTH: usize = 16;
/// Maximum request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Maximum response body limit in bytes.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Coinload run configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoinloadConfig {
    /// Target API configuration.
    #[serde(default)]
    pub target: TargetConfig,
    /// Synthetic user pool configuration.
    #[serde(default)]
    pub users: UsersConfig,
    /// Arrival rate and worker pool configuration.
    #[serde(default)]
    pub load: LoadConfig,
    /// Per-iteration scenario configuration.
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Pass/fail thresholds.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    /// Event logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoinloadConfig {
    /// Loads and validates configuration using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration without validating values, so callers can apply
    /// overrides first. Size, encoding and syntax are still enforced.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses configuration from TOML text without validating values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.target.validate()?;
        self.users.validate()?;
        self.load.validate()?;
        self.scenario.validate()?;
        self.thresholds.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Converts the configuration into harness settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configuration is invalid.
    pub fn harness_settings(&self) -> Result<HarnessSettings, ConfigError> {
        self.validate()?;
        Ok(HarnessSettings {
            base_url: self.target.url()?,
            users: UserPoolSettings {
                size: self.users.pool_size,
                username_prefix: self.users.username_prefix.clone(),
                password: self.users.password.clone(),
            },
            load: LoadProfile {
                rate_per_second: self.load.rate_per_second,
                duration: Duration::from_secs(self.load.duration_seconds),
                pre_allocated_workers: self.load.pre_allocated_workers,
                max_workers: self.load.max_workers,
            },
            scenario: ScenarioSettings {
                item: self.scenario.item.clone(),
                transfer_amount: self.scenario.transfer_amount,
                inter_step_delay: Duration::from_millis(self.scenario.inter_step_delay_ms),
                request_timeout: Duration::from_millis(self.scenario.request_timeout_ms),
            },
            session_ttl: self.scenario.session_ttl_seconds.map(Duration::from_secs),
            max_check_failure_ratio: self.thresholds.max_check_failure_ratio,
        })
    }

    /// Returns the HTTP executor configuration.
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_response_bytes: self.scenario.max_response_bytes,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Target API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// API base URL including the `/api` prefix.
    pub base_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl TargetConfig {
    /// Parses the base URL.
    fn url(&self) -> Result<Url, ConfigError> {
        Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("target.base_url is not a valid url: {err}")))
    }

    /// Validates the target configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "target.base_url must use http:// or https://".to_string(),
            ));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid("target.base_url must include a host".to_string()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid(
                "target.base_url must not embed credentials".to_string(),
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "target.base_url must not include a query or fragment".to_string(),
            ));
        }
        Ok(())
    }
}

/// Synthetic user pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsersConfig {
    /// Number of users to generate.
    pub pool_size: usize,
    /// Username prefix; the user index is appended.
    pub username_prefix: String,
    /// Password shared by every user.
    pub password: String,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_USER_POOL_SIZE,
            username_prefix: DEFAULT_USERNAME_PREFIX.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl UsersConfig {
    /// Validates the user pool configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("users.pool_size must be greater than zero".to_string()));
        }
        if self.pool_size > MAX_USER_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "users.pool_size must be at most {MAX_USER_POOL_SIZE}"
            )));
        }
        if self.username_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "users.username_prefix must not contain whitespace".to_string(),
            ));
        }
        let shortest = format!("{}0", self.username_prefix).chars().count();
        let longest = format!("{}{}", self.username_prefix, self.pool_size - 1).chars().count();
        if shortest < MIN_USERNAME_LENGTH || longest > MAX_USERNAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "generated usernames must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} characters"
            )));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Invalid("users.password must be non-empty".to_string()));
        }
        if self.password.len() > MAX_PASSWORD_LENGTH {
            return Err(ConfigError::Invalid("users.password exceeds max length".to_string()));
        }
        Ok(())
    }
}

/// Arrival rate and worker pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Target arrival rate in iterations per second.
    pub rate_per_second: f64,
    /// Admission window in seconds.
    pub duration_seconds: u64,
    /// Workers available at start.
    pub pre_allocated_workers: usize,
    /// Hard worker limit.
    pub max_workers: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            duration_seconds: DEFAULT_DURATION_SECONDS,
            pre_allocated_workers: DEFAULT_PRE_ALLOCATED_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl LoadConfig {
    /// Validates the load configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
            return Err(ConfigError::Invalid(
                "load.rate_per_second must be a positive number".to_string(),
            ));
        }
        if self.rate_per_second > MAX_RATE_PER_SECOND {
            return Err(ConfigError::Invalid(format!(
                "load.rate_per_second must be at most {MAX_RATE_PER_SECOND}"
            )));
        }
        if self.duration_seconds == 0 {
            return Err(ConfigError::Invalid(
                "load.duration_seconds must be greater than zero".to_string(),
            ));
        }
        if self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "load.duration_seconds must be at most {MAX_DURATION_SECONDS}"
            )));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("load.max_workers must be at least 1".to_string()));
        }
        if self.max_workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!("load.max_workers must be at most {MAX_WORKERS}")));
        }
        if self.pre_allocated_workers > self.max_workers {
            return Err(ConfigError::Invalid(
                "load.pre_allocated_workers must not exceed load.max_workers".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-iteration scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Pause after each endpoint step in milliseconds.
    pub inter_step_delay_ms: u64,
    /// Item bought on every iteration.
    pub item: String,
    /// Coins sent on every iteration.
    pub transfer_amount: u64,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum response body size in bytes.
    pub max_response_bytes: usize,
    /// Optional maximum session age in seconds.
    pub session_ttl_seconds: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            inter_step_delay_ms: DEFAULT_INTER_STEP_DELAY_MS,
            item: DEFAULT_ITEM.to_string(),
            transfer_amount: DEFAULT_TRANSFER_AMOUNT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            session_ttl_seconds: None,
        }
    }
}

impl ScenarioConfig {
    /// Validates the scenario configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.inter_step_delay_ms > MAX_INTER_STEP_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "scenario.inter_step_delay_ms must be at most {MAX_INTER_STEP_DELAY_MS}"
            )));
        }
        let item = self.item.trim();
        if item.is_empty() || item != self.item {
            return Err(ConfigError::Invalid(
                "scenario.item must be non-empty without surrounding whitespace".to_string(),
            ));
        }
        if item.chars().count() > MAX_ITEM_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "scenario.item must be at most {MAX_ITEM_LENGTH} characters"
            )));
        }
        if self.transfer_amount == 0 {
            return Err(ConfigError::Invalid(
                "scenario.transfer_amount must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "scenario.request_timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "scenario.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if self.session_ttl_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "scenario.session_ttl_seconds must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pass/fail thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    /// Failure ratio above which the run fails.
    pub max_check_failure_ratio: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_check_failure_ratio: DEFAULT_MAX_CHECK_FAILURE_RATIO,
        }
    }
}

impl ThresholdsConfig {
    /// Validates the thresholds.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.max_check_failure_ratio) {
            return Err(ConfigError::Invalid(
                "thresholds.max_check_failure_ratio must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Emit events at all.
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl LoggingConfig {
    /// Validates the logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("logging.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

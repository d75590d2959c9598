//! Configuration loading, validation, and management for Remindly.
//!
//! Loads configuration from `~/.remindly/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use remindly_core::cadence::{CadencePolicy, MinuteRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.remindly/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Where user records live
    #[serde(default)]
    pub store: StoreConfig,

    /// Scheduler tick settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Re-ping delay ranges per annoyance tier
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// Orchestration loop and reply settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// HTTP lookup collaborators, registered as tools named after their key
    #[serde(default)]
    pub lookups: HashMap<String, LookupConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .field("cadence", &self.cadence)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .field("lookups", &self.lookups)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Directory holding one JSON file per user
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Completed/failed tasks kept per user before the oldest are pruned
    #[serde(default = "default_retention_ceiling")]
    pub retention_ceiling: usize,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}
fn default_store_path() -> PathBuf {
    AppConfig::config_dir().join("users")
}
fn default_retention_ceiling() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            retention_ceiling: default_retention_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_low")]
    pub low: MinuteRange,

    #[serde(default = "default_med")]
    pub med: MinuteRange,

    #[serde(default = "default_high")]
    pub high: MinuteRange,
}

fn default_low() -> MinuteRange {
    CadencePolicy::default().low
}
fn default_med() -> MinuteRange {
    CadencePolicy::default().med
}
fn default_high() -> MinuteRange {
    CadencePolicy::default().high
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            low: default_low(),
            med: default_med(),
            high: default_high(),
        }
    }
}

impl CadenceConfig {
    pub fn policy(&self) -> CadencePolicy {
        CadencePolicy {
            low: self.low,
            med: self.med,
            high: self.high,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name the assistant uses for itself
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Tool rounds allowed per invocation before tools are force-disabled
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// History entries included in each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_typing_interval_ms")]
    pub typing_interval_ms: u64,

    /// Minimum buffer growth (chars) before a partial update is pushed
    #[serde(default = "default_typing_min_growth")]
    pub typing_min_growth: usize,

    /// Static reply sent when the completion service fails
    #[serde(default = "default_apology")]
    pub apology: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Free text about the user's timezone, included in every prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_note: Option<String>,
}

fn default_assistant_name() -> String {
    "Remindly".into()
}
fn default_max_depth() -> u32 {
    5
}
fn default_history_window() -> usize {
    20
}
fn default_typing_interval_ms() -> u64 {
    1500
}
fn default_typing_min_growth() -> usize {
    40
}
fn default_apology() -> String {
    "Sorry, I couldn't reach my brain just now. Please try again in a moment.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            max_depth: default_max_depth(),
            history_window: default_history_window(),
            typing_interval_ms: default_typing_interval_ms(),
            typing_min_growth: default_typing_min_growth(),
            apology: default_apology(),
            system_prompt_override: None,
            timezone_note: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Endpoint queried with `GET {url}?{query_param}=<query>`
    pub url: String,

    #[serde(default = "default_query_param")]
    pub query_param: String,

    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_lookup_description")]
    pub description: String,
}

fn default_query_param() -> String {
    "q".into()
}
fn default_lookup_timeout_secs() -> u64 {
    10
}
fn default_lookup_description() -> String {
    "Look something up and return the raw answer text".into()
}

impl AppConfig {
    /// Load configuration from the default path with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("REMINDLY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("REMINDLY_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("REMINDLY_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".remindly")
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.store.retention_ceiling == 0 {
            return Err(ConfigError::ValidationError(
                "store.retention_ceiling must be > 0".into(),
            ));
        }

        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.tick_interval_secs must be > 0".into(),
            ));
        }

        for (tier, range) in [
            ("low", self.cadence.low),
            ("med", self.cadence.med),
            ("high", self.cadence.high),
        ] {
            if range.min_minutes == 0 || range.min_minutes > range.max_minutes {
                return Err(ConfigError::ValidationError(format!(
                    "cadence.{tier} needs 1 <= min_minutes <= max_minutes"
                )));
            }
        }

        if self.agent.max_depth == 0 {
            return Err(ConfigError::ValidationError("agent.max_depth must be > 0".into()));
        }

        if self.agent.typing_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "agent.typing_interval_ms must be > 0".into(),
            ));
        }

        for (name, lookup) in &self.lookups {
            if lookup.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "lookups.{name}.url must not be empty"
                )));
            }
            if lookup.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "lookups.{name}.timeout_secs must be > 0"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            store: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            cadence: CadenceConfig::default(),
            agent: AgentConfig::default(),
            providers: HashMap::new(),
            lookups: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

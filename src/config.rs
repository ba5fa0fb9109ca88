//! Configuration for the tailwatch binary.
//!
//! Layered the same way at every entry point:
//! - Default values
//! - TOML configuration file (`.tailwatch/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TAILWATCH_` and use double
//! underscores to separate nested levels:
//! - `TAILWATCH_WATCHER__RETRY_INTERVAL_MS=250` sets `watcher.retry_interval_ms`
//! - `TAILWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::filter::{FilterError, KeywordFilter, RateLimiter};
use crate::monitor::ObserveOptions;
use crate::sender::{SharedSender, WebhookFormat, WebhookSender, WriterSender};
use crate::watcher::WatcherConfig;

const CONFIG_DIR: &str = ".tailwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "TAILWATCH_";

/// Errors from loading settings or building what they describe.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Failed to write configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration file already exists at {path}. Use --force to overwrite")]
    AlreadyExists { path: PathBuf },

    #[error("Invalid sender: {reason}")]
    InvalidSender { reason: String },

    #[error("Invalid filter for {path}: {source}")]
    InvalidFilter {
        path: PathBuf,
        #[source]
        source: FilterError,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path watcher tunables
    #[serde(default)]
    pub watcher: WatcherSettings,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Roots to observe
    #[serde(default)]
    pub observe: Vec<ObserveConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatcherSettings {
    /// How often paths that do not exist yet are rechecked
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

/// One `[[observe]]` entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ObserveConfig {
    /// File or directory to observe
    pub path: PathBuf,

    /// Banned substrings separated by `|`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// At most `count` lines per `window_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Where surviving lines go; must not be empty
    #[serde(default)]
    pub senders: Vec<SenderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub count: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SenderConfig {
    Stdout,
    Webhook {
        url: String,
        #[serde(default)]
        format: WebhookFormat,
    },
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_retry_interval_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watcher: WatcherSettings::default(),
            logging: LoggingConfig::default(),
            observe: Vec::new(),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatcherSettings {
    pub fn to_config(&self) -> WatcherConfig {
        WatcherConfig {
            retry_interval: Duration::from_millis(self.retry_interval_ms.max(1)),
        }
    }
}

impl SenderConfig {
    pub fn build(&self) -> Result<SharedSender, ConfigError> {
        match self {
            SenderConfig::Stdout => Ok(Arc::new(WriterSender::stdout())),
            SenderConfig::Webhook { url, format } => {
                Ok(Arc::new(WebhookSender::new(url.clone(), *format)?))
            }
        }
    }
}

impl ObserveConfig {
    /// Build monitor options: keyword filter first, then the rate limit.
    pub fn to_options(&self) -> Result<ObserveOptions, ConfigError> {
        let mut options = ObserveOptions::new();

        for sender in &self.senders {
            options = options.shared_sender(sender.build()?);
        }

        if let Some(exclude) = self.exclude.as_deref().filter(|e| !e.is_empty()) {
            options = options.filter(KeywordFilter::new(exclude));
        }

        if let Some(rate) = self.rate_limit {
            let limiter = RateLimiter::new(Duration::from_millis(rate.window_ms), rate.count)
                .map_err(|source| ConfigError::InvalidFilter {
                    path: self.path.clone(),
                    source,
                })?;
            options = options.filter(limiter);
        }

        Ok(options)
    }
}

/// Starter file written by `tailwatch init`.
const SETTINGS_TEMPLATE: &str = r#"# Tailwatch configuration
version = 1

[watcher]
# How often paths that do not exist yet are rechecked
retry_interval_ms = 1000

[logging]
# error | warn | info | debug | trace (RUST_LOG takes precedence)
default = "warn"

[logging.modules]
# watcher = "debug"

# [[observe]]
# path = "/var/log/app"
# exclude = "DEBUG|TRACE"
# rate_limit = { window_ms = 60000, count = 30 }
# senders = [
#     { kind = "stdout" },
#     { kind = "webhook", url = "https://hooks.example.com/T000", format = "plain" },
# ]
"#;

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)?;
        Ok(settings)
    }

    /// Find `.tailwatch/settings.toml`, searching from the current directory up
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Create a starter settings file under `dir`
    pub fn init_config_file(dir: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists { path: config_path });
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, SETTINGS_TEMPLATE)?;
        Ok(config_path)
    }
}

//! Hotfix configuration (hotfix.toml)
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HotfixConfig {
    /// Artifact naming and location
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Loader behaviour
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Debug bridge
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Artifact naming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactsConfig {
    /// Root directory for fetched and packed artifacts
    #[serde(default = "default_root")]
    pub root: String,

    /// Folder under the root holding hot-fix artifacts
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Module base file name
    #[serde(default = "default_module")]
    pub module: String,

    /// Symbols base file name
    #[serde(default = "default_symbols")]
    pub symbols: String,

    /// Extension appended to encoded artifacts
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_root() -> String {
    "assets".to_string()
}

fn default_folder() -> String {
    "HotFix".to_string()
}

fn default_module() -> String {
    "hotfix.module".to_string()
}

fn default_symbols() -> String {
    "hotfix.symbols".to_string()
}

fn default_extension() -> String {
    "bytes".to_string()
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            folder: default_folder(),
            module: default_module(),
            symbols: default_symbols(),
            extension: default_extension(),
        }
    }
}

/// Build profile
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Symbols loaded, debug service started
    #[default]
    Development,
    /// No symbols, no debug service
    Production,
}

impl Profile {
    /// Whether this is the production profile
    pub fn is_production(self) -> bool {
        self == Profile::Production
    }
}

/// How artifacts are fetched
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Blocking fetch, no suspension
    Sync,
    /// Suspending fetch
    #[default]
    Async,
}

/// Loader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Build profile
    #[serde(default)]
    pub profile: Profile,

    /// Fetch mode
    #[serde(default)]
    pub fetch_mode: FetchMode,

    /// Upper bound for a single fetch, in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            fetch_mode: FetchMode::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl LoaderConfig {
    /// Fetch timeout as a duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Debug bridge settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    56000
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl DebugConfig {
    /// Socket address to listen on
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("debug.bind: {}", e)))
    }
}

impl HotfixConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HotfixConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("artifacts.folder", &self.artifacts.folder),
            ("artifacts.module", &self.artifacts.module),
            ("artifacts.symbols", &self.artifacts.symbols),
            ("artifacts.extension", &self.artifacts.extension),
        ];
        for (field, value) in names {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }

        if self.artifacts.module == self.artifacts.symbols {
            return Err(ConfigError::ValidationError(
                "artifacts.module and artifacts.symbols must differ".to_string(),
            ));
        }

        if self.loader.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "loader.fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }

        self.debug.socket_addr()?;
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

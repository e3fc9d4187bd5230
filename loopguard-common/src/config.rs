//! Bootstrap configuration
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (--database, --host, --port)
//! 2. Environment variables (LOOPGUARD_CONFIG, LOOPGUARD_DATABASE, ...)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing TOML file is not an error; a malformed one is. Resolution
//! runs before logging is installed, so it reports a [`ConfigSource`] for
//! the caller to log instead of logging itself.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use crate::{Error, Result};

/// Environment variable naming the TOML file
pub const CONFIG_ENV_VAR: &str = "LOOPGUARD_CONFIG";

/// Service configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct LoopGuardConfig {
    /// SQLite database file; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    /// Default: 5780
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS; empty disables cross-origin access
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file did not exist; defaults used
    Missing(PathBuf),
    /// No config path could be determined; defaults used
    Defaults,
}

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoopGuardConfig {
    /// Parse a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load from the resolved config path and apply overrides
    pub fn resolve(
        cli_config: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<(Self, ConfigSource)> {
        let (mut config, source) = match resolve_config_path(cli_config) {
            Some(path) if path.exists() => (Self::load(&path)?, ConfigSource::File(path)),
            Some(path) => (Self::default(), ConfigSource::Missing(path)),
            None => (Self::default(), ConfigSource::Defaults),
        };
        config.apply(overrides);
        Ok((config, source))
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.database_path {
            self.database_path = Some(path);
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
    }

    /// Configured database path, or the platform default
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Config file location: CLI argument, then `LOOPGUARD_CONFIG`, then the
/// platform config directory
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// `~/.config/loopguard/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("loopguard").join("config.toml"))
}

/// `~/.local/share/loopguard/loopguard.db` on Linux
pub fn default_database_path() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join("loopguard").join("loopguard.db"))
        .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
}

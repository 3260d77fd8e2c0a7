//! INI configuration file.
//!
//! ```ini
//! [datasource]
//! timeout_secs = 30
//! merge_policy = registration
//! processing = worker
//!
//! [logging]
//! level = info
//! file = /var/log/contactflow.log
//! ```
//!
//! Every key is optional. Unknown sections and keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::datasource::{DataSourceConfig, MergePolicy, ProcessingMode};
use crate::logging::{LoggingConfig, DEFAULT_LOG_LEVEL};

/// Config directory name under the user config dir.
pub const CONFIG_DIR_NAME: &str = "contactflow";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[datasource]` settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSourceSettings {
    /// Load timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub merge_policy: MergePolicy,
    pub processing: ProcessingMode,
}

/// `[logging]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Optional log file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub datasource: DataSourceSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Default location: `<config dir>/contactflow/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Loads `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parses INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("datasource")) {
            if let Some(value) = section.get("timeout_secs") {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        invalid("datasource", "timeout_secs", value, e.to_string())
                    })?;
                config.datasource.timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            if let Some(value) = section.get("merge_policy") {
                config.datasource.merge_policy = value
                    .parse()
                    .map_err(|reason| invalid("datasource", "merge_policy", value, reason))?;
            }
            if let Some(value) = section.get("processing") {
                config.datasource.processing = value
                    .parse()
                    .map_err(|reason| invalid("datasource", "processing", value, reason))?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(value) = section.get("level") {
                let level = value.trim();
                if level.is_empty() {
                    return Err(invalid("logging", "level", value, "empty".to_string()));
                }
                config.logging.level = level.to_string();
            }
            if let Some(value) = section.get("file") {
                let file = value.trim();
                config.logging.file = (!file.is_empty()).then(|| expand_tilde(file));
            }
        }

        Ok(config)
    }

    /// Data source configuration from the `[datasource]` section.
    pub fn to_datasource_config(&self) -> DataSourceConfig {
        let mut config = DataSourceConfig::default()
            .with_merge_policy(self.datasource.merge_policy)
            .with_processing(self.datasource.processing);
        if let Some(timeout) = self.datasource.timeout {
            config = config.with_load_timeout(timeout);
        }
        config
    }

    /// Logging configuration from the `[logging]` section.
    pub fn to_logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::default().with_level(self.logging.level.clone());
        match &self.logging.file {
            Some(file) => config.with_file(file.clone()),
            None => config,
        }
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

//! Client configuration.
//!
//! Everything that used to be implied by the global configuration directory
//! lives in [`PocketConfig`], which is handed to the credential store and the
//! authorization flow when they are built.
//!
//! # Storage Location
//!
//! The configuration directory is `~/.config/pocket` on Linux, the matching
//! platform directory elsewhere. An optional `config.toml` in that directory
//! overrides the defaults:
//!
//! ```toml
//! api_base_url = "https://getpocket.com"
//! callback_timeout_secs = 300
//! log_level = "info"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the optional configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default base URL of the Pocket service.
pub const DEFAULT_API_BASE_URL: &str = "https://getpocket.com";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home/configuration directory could be determined.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,

    /// The configuration directory could not be created.
    #[error("failed to create configuration directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`PocketConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Configuration shared by the credential store and the authorization flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PocketConfig {
    /// Directory holding the consumer key and authorization record.
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// File holding the consumer key, relative to `config_dir`.
    pub consumer_key_file: PathBuf,

    /// File holding the authorization record, relative to `config_dir`.
    pub auth_file: PathBuf,

    /// Base URL of the Pocket service.
    pub api_base_url: String,

    /// Host the callback listener binds to.
    pub callback_host: String,

    /// How long to wait for the browser callback. Waits forever when unset.
    pub callback_timeout_secs: Option<u64>,

    /// Default logging filter for the binary.
    pub log_level: String,
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::new(),
            consumer_key_file: PathBuf::from("consumer_key"),
            auth_file: PathBuf::from("auth.json"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            callback_host: "127.0.0.1".to_string(),
            callback_timeout_secs: None,
            log_level: "warn".to_string(),
        }
    }
}

impl PocketConfig {
    /// Default configuration rooted at the given directory.
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    /// The platform configuration directory for the client.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", "pocket").ok_or(ConfigError::ConfigDirUnavailable)?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Load the configuration and make sure its directory exists.
    ///
    /// `dir_override` replaces the platform directory. The `config.toml`
    /// inside the directory is optional.
    pub fn load(dir_override: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = match dir_override {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_dir()?,
        };

        std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::CreateDir {
            path: config_dir.clone(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let mut config: PocketConfig = if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            })?
        } else {
            PocketConfig::default()
        };

        config.config_dir = config_dir;
        tracing::debug!("Loaded configuration rooted at {:?}", config.config_dir);

        Ok(config)
    }

    /// Path of the consumer key file.
    pub fn consumer_key_path(&self) -> PathBuf {
        self.config_dir.join(&self.consumer_key_file)
    }

    /// Path of the authorization record file.
    pub fn auth_path(&self) -> PathBuf {
        self.config_dir.join(&self.auth_file)
    }

    /// Callback wait limit, if any.
    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }
}

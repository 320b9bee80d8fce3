//! Credential persistence.
//!
//! The credential store owns two files in the configuration directory:
//! - the consumer key, plain text, first line only
//! - the authorization record, JSON `{"access_token": ..., "username": ...}`
//!
//! Both are written with owner-only permissions. The authorization record is
//! written to a sibling temporary file and renamed into place, so a reader
//! sees either the previous file or a complete new one.
//!
//! # Example
//!
//! ```rust,ignore
//! use pocket_core::{CredentialStore, PocketConfig};
//!
//! let config = PocketConfig::load(None)?;
//! let store = CredentialStore::new(&config);
//! let key = store.load_consumer_key_interactive()?;
//! ```

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PocketConfig;
use crate::model::{Authorization, ConsumerKey};

/// Where operators find their consumer key.
pub const CONSUMER_KEY_HELP_URL: &str = "https://getpocket.com/developer/apps/";

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist.
    #[error("{path} not found")]
    NotFound { path: PathBuf },

    /// The file exists but does not hold a valid record.
    #[error("malformed record in {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// I/O error reading or writing the store.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operator supplied no consumer key.
    #[error("no consumer key entered")]
    EmptyInput,
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// File-backed store for the consumer key and the authorization record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    consumer_key_path: PathBuf,
    auth_path: PathBuf,
}

impl CredentialStore {
    /// Create a store using the paths from the configuration.
    pub fn new(config: &PocketConfig) -> Self {
        Self::with_paths(config.consumer_key_path(), config.auth_path())
    }

    /// Create a store with explicit file paths.
    pub fn with_paths(consumer_key_path: PathBuf, auth_path: PathBuf) -> Self {
        Self {
            consumer_key_path,
            auth_path,
        }
    }

    /// Path of the consumer key file.
    pub fn consumer_key_path(&self) -> &Path {
        &self.consumer_key_path
    }

    /// Path of the authorization record.
    pub fn auth_path(&self) -> &Path {
        &self.auth_path
    }

    /// Read the cached consumer key.
    pub fn load_consumer_key(&self) -> Result<ConsumerKey, StoreError> {
        let contents = fs::read_to_string(&self.consumer_key_path)
            .map_err(|e| StoreError::io(&self.consumer_key_path, e))?;

        ConsumerKey::from_file_contents(&contents).ok_or_else(|| StoreError::Malformed {
            path: self.consumer_key_path.clone(),
            message: "first line is empty".to_string(),
        })
    }

    /// Read the cached consumer key, asking the operator when there is none.
    ///
    /// The prompt goes to `output`, the answer is the first line of `input`.
    /// The answer is written to the key file with owner-only permissions.
    pub fn load_consumer_key_or_prompt<R, W>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<ConsumerKey, StoreError>
    where
        R: BufRead,
        W: Write,
    {
        match self.load_consumer_key() {
            Ok(key) => return Ok(key),
            Err(e) => tracing::warn!("Can't get consumer key: {}", e),
        }

        let console = PathBuf::from("<stdin>");
        write!(
            output,
            "Enter your consumer key (from here {}): ",
            CONSUMER_KEY_HELP_URL
        )
        .and_then(|_| output.flush())
        .map_err(|e| StoreError::io(&console, e))?;

        let mut line = String::new();
        input
            .read_line(&mut line)
            .map_err(|e| StoreError::io(&console, e))?;

        let key = ConsumerKey::from_file_contents(&line).ok_or(StoreError::EmptyInput)?;

        write_private(&self.consumer_key_path, key.expose().as_bytes())
            .map_err(|e| StoreError::io(&self.consumer_key_path, e))?;
        tracing::debug!("Saved consumer key to {:?}", self.consumer_key_path);

        Ok(key)
    }

    /// [`load_consumer_key_or_prompt`](Self::load_consumer_key_or_prompt) on
    /// the process's standard input and error streams.
    pub fn load_consumer_key_interactive(&self) -> Result<ConsumerKey, StoreError> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stderr();
        self.load_consumer_key_or_prompt(&mut input, &mut output)
    }

    /// Read the cached authorization record.
    ///
    /// Fails with [`StoreError::NotFound`] when there is no cache yet and
    /// [`StoreError::Malformed`] when the file cannot be parsed.
    pub fn load_authorization(&self) -> Result<Authorization, StoreError> {
        let contents =
            fs::read_to_string(&self.auth_path).map_err(|e| StoreError::io(&self.auth_path, e))?;

        serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
            path: self.auth_path.clone(),
            message: e.to_string(),
        })
    }

    /// Persist the authorization record.
    pub fn save_authorization(&self, authorization: &Authorization) -> Result<(), StoreError> {
        let contents = serde_json::to_string(authorization).map_err(|e| StoreError::Malformed {
            path: self.auth_path.clone(),
            message: e.to_string(),
        })?;

        let mut tmp_name = self
            .auth_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.auth_path.with_file_name(tmp_name);

        write_private(&tmp_path, format!("{}\n", contents).as_bytes())
            .map_err(|e| StoreError::io(&tmp_path, e))?;

        if let Err(e) = fs::rename(&tmp_path, &self.auth_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(&self.auth_path, e));
        }

        tracing::debug!("Saved authorization to {:?}", self.auth_path);
        Ok(())
    }
}

/// Create or truncate `path` and write `contents`, readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // `mode` only applies on creation; an existing file keeps its bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents)?;
    file.sync_all()
}

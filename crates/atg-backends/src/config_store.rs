//! Saved configuration
//!
//! One JSON document per user at `<config dir>/atg/config.json`. The
//! interactive flow offers the saved file first and otherwise asks for the
//! connection, model, and retry budget, then saves the answers.

use crate::console::ConsolePrompter;
use atg_core::{AtgConfig, Confirmer, PromptError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncWrite};

/// Application directory under the platform config dir
pub const APP_DIR: &str = "atg";

/// Config file name
pub const CONFIG_FILE: &str = "config.json";

/// Configuration load/save errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither a platform config dir nor a home dir is known
    #[error("cannot determine a configuration directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The saved file is not a valid config
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The connection answer is not JSON
    #[error("connection must be a JSON object: {0}")]
    InvalidConnection(#[source] serde_json::Error),

    /// Prompting failed
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl ConfigError {
    fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Location of the saved config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at an explicit file path
    #[inline]
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user default location
    ///
    /// Falls back to `~/.config` when the platform has no config dir.
    ///
    /// # Errors
    /// `ConfigError::NoConfigDir` if no base directory is known.
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::at(base.join(APP_DIR).join(CONFIG_FILE)))
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read the saved config
    ///
    /// # Errors
    /// `ConfigError::Io` or `ConfigError::Parse`.
    pub async fn load(&self) -> Result<AtgConfig, ConfigError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConfigError::io_error(&self.path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write `config` as pretty JSON, creating parent directories
    ///
    /// # Errors
    /// `ConfigError::Io` if the directory or file cannot be written.
    pub async fn save(&self, config: &AtgConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io_error(parent, e))?;
        }
        let body = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| ConfigError::io_error(&self.path, e))?;
        tracing::info!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Offer the saved config, else ask for a new one and save it
    ///
    /// # Errors
    /// Prompt failures, an unparseable connection answer, or a store error.
    pub async fn resolve<R, W>(&self, prompter: &ConsolePrompter<R, W>) -> Result<AtgConfig, ConfigError>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        if self.exists().await && prompter.confirm("Use saved config?", true).await? {
            let config = self.load().await?;
            tracing::debug!(path = %self.path.display(), model = %config.model, "using saved config");
            return Ok(config);
        }

        let connection = prompter.ask_string("Connection settings (JSON): ").await?;
        let connection: Value =
            serde_json::from_str(&connection).map_err(ConfigError::InvalidConnection)?;
        let model = prompter.ask_string("AI model: ").await?;
        let max_retries = prompter.ask_number("Max retries per test: ").await?;

        let config = AtgConfig::new(connection, model, max_retries);
        self.save(&config).await?;
        Ok(config)
    }
}

/// Config as JSON with every connection value masked
#[must_use]
pub fn redacted(config: &AtgConfig) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or(Value::Null);
    if let Some(connection) = value.get_mut("connection") {
        *connection = match connection {
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, _)| (key.clone(), Value::String("***".to_string())))
                    .collect(),
            ),
            Value::Null => Value::Null,
            _ => Value::String("***".to_string()),
        };
    }
    value
}

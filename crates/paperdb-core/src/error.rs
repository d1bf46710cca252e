use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("{0}")]
    Input(String),

    #[error("Failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Provider { provider: provider.into(), message: message.to_string() }
    }

    pub fn store(message: impl ToString) -> Self {
        Self::Store(message.to_string())
    }

    pub fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Load { path: path.into(), message: message.to_string() }
    }

    /// True for failures that should stop the process at startup rather than
    /// being reported inline by the shell.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for indras-filelog
//!
//! Only construction-time failures surface as errors. Once the writer is
//! running, I/O problems are reported through `tracing` and skipped.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or driving a [`Logger`](crate::Logger)
#[derive(Debug, Error)]
pub enum LogError {
    /// I/O error, tagged with what was being attempted
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value that has no sensible default
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for [`LoggerConfig`](crate::LoggerConfig)
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// The writer worker has stopped and no longer accepts events
    #[error("Log queue is closed")]
    Closed,
}

impl LogError {
    /// Create a new I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl<T> From<flume::SendError<T>> for LogError {
    fn from(_: flume::SendError<T>) -> Self {
        LogError::Closed
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LogError>;

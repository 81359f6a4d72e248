//! Severity levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Log severity, ordered from least to most severe
///
/// `Jedi` sits between `Info` and `Warning` and is meant for
/// application-specific highlights that should stand out from routine
/// info lines without being treated as problems.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Jedi,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// All levels in ascending severity
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Jedi,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Upper-case name used in rendered lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Jedi => "JEDI",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Parse a level name, falling back to `Info` for unknown names
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(level = name, "Unknown log level, using info");
            Level::default()
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "jedi" => Ok(Level::Jedi),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(LogError::config(format!("unknown level '{other}'"))),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

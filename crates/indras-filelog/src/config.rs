//! Configuration types for the file logger
//!
//! The on-disk format is YAML with kebab-case keys:
//!
//! ```yaml
//! level: debug
//! frequency: hourly
//! console: true
//! max-size: 16kb
//! compress: false
//! ```
//!
//! Values are kept as written and resolved lazily, so a typo in one field
//! degrades to that field's default instead of rejecting the whole file.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::level::Level;
use crate::rotation::RollFrequency;

/// Fallback rotation size when `max-size` cannot be parsed (8 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 8 * 1024 * 1024;

/// Default bound on queued events before producers block
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Main logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggerConfig {
    /// Minimum level that is written (`debug`, `info`, `jedi`, ...)
    pub level: String,

    /// Rotation period (`secondly` through `yearly`)
    pub frequency: String,

    /// Echo every written line to the console
    pub console: bool,

    /// Size threshold per file, e.g. `16kb`, `1.5MB`
    pub max_size: String,

    /// Gzip the previous file of the active bucket after a size rotation
    ///
    /// Retired buckets are always compressed, whatever this says.
    pub compress: bool,

    /// Capacity of the event queue
    pub queue_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            frequency: "daily".to_string(),
            console: false,
            max_size: "8MB".to_string(),
            compress: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LoggerConfig {
    /// Parse a configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LogError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the rotation frequency
    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = frequency.into();
        self
    }

    /// Enable or disable console echo
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Set the per-file size threshold
    pub fn with_max_size(mut self, size: impl Into<String>) -> Self {
        self.max_size = size.into();
        self
    }

    /// Enable or disable compression after size rotation
    pub fn with_compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Set the event queue capacity (at least 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Resolved minimum level
    pub fn resolved_level(&self) -> Level {
        Level::parse_or_default(&self.level)
    }

    /// Resolved rotation frequency
    pub fn resolved_frequency(&self) -> RollFrequency {
        RollFrequency::parse_or_default(&self.frequency)
    }

    /// Resolved size threshold in bytes
    pub fn max_size_bytes(&self) -> u64 {
        parse_size(&self.max_size).unwrap_or_else(|| {
            tracing::warn!(size = %self.max_size, "Invalid size string, using 8MB");
            DEFAULT_MAX_SIZE
        })
    }
}

/// Convert a human size string such as `16kb` or `1.5MB` into bytes
///
/// Units are binary multiples and case-insensitive. Returns `None` for
/// anything without a `KB`/`MB`/`GB` suffix or with a non-numeric value.
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim();
    if size.len() < 3 || !size.is_char_boundary(size.len() - 2) {
        return None;
    }

    let (value, unit) = size.split_at(size.len() - 2);
    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    let value: f64 = value.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some((value * multiplier as f64) as u64)
}

/// Turn a user-supplied path into an absolute, cleaned path
///
/// A leading `~` is replaced with the home directory. When the home
/// directory or the working directory cannot be determined the relative
/// path `logs` is returned instead.
pub fn resolve_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => return PathBuf::from("logs"),
        },
        Err(_) => path.to_path_buf(),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(_) => return PathBuf::from("logs"),
        }
    };

    clean_path(&absolute)
}

/// Lexically resolve `.` and `..` components
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

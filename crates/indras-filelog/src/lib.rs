//! Rotating, compressing file logger for Indras Network
//!
//! Producers on any number of threads hand log lines to a bounded queue; a
//! single background thread writes them to disk in enqueue order, rotating
//! files by time period and by size, and gzipping files once they retire.
//!
//! # Layout
//!
//! ```text
//! <root>/<category>/<bucket>/<index>.log      active file
//! <root>/<category>/<bucket>/<index>.log.gz   retired, compressed
//! ```
//!
//! `bucket` is the current time at the configured granularity, for example
//! `2024-01-02-15` for hourly rotation. Within a bucket the index starts at 1
//! and increases each time the active file reaches the size threshold.
//!
//! # Quick Start
//!
//! ```ignore
//! use indras_filelog::{Logger, LoggerConfig};
//!
//! let config = LoggerConfig::default()
//!     .with_level("debug")
//!     .with_frequency("hourly")
//!     .with_max_size("16kb");
//!
//! let logger = Logger::new("example", "database", "~/logs", config)?;
//! logger.info("connected");
//! logger.jedi(format!("replicated {} rows", 42));
//! ```
//!
//! # Tracing
//!
//! Use [`FileLogLayer`] to route `tracing` events into a logger:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
//!
//! let logger = Arc::new(Logger::new("node", "events", "./logs", LoggerConfig::default())?);
//! tracing_subscriber::registry()
//!     .with(indras_filelog::FileLogLayer::new(logger))
//!     .init();
//! ```
//!
//! # Failure handling
//!
//! Construction fails if the directories or the first file cannot be
//! created. After that, I/O errors are reported through `tracing` and the
//! affected write or compression is skipped; logging keeps going.

pub mod clock;
pub mod compress;
pub mod config;
pub mod error;
pub mod format;
pub mod layer;
pub mod level;
pub mod logger;
pub mod rotation;
pub mod sink;
mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use compress::{CompressionReport, compress_retired_files, reconcile_on_startup};
pub use config::{LoggerConfig, parse_size, resolve_path};
pub use error::{LogError, Result};
pub use format::render;
pub use layer::FileLogLayer;
pub use level::Level;
pub use logger::{Logger, LoggerBuilder};
pub use rotation::{RollFrequency, RotationDecision};
pub use sink::{ColorConsole, ConsoleSink, FileSink};
pub use writer::LogEvent;

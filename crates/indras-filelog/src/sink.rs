//! Output sinks
//!
//! [`FileSink`] owns the single open log file. Console echo is a separate,
//! injectable capability so the writer never touches terminal state itself.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::level::Level;
use crate::writer::LogEvent;

/// Append-only handle to one log file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Open (or create) a file for appending
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Append bytes to the file
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    /// Current size of the file at its path
    ///
    /// Fails if the file was removed or renamed while open.
    pub fn size(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Path of the open file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the handle
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Destination for echoed log lines
///
/// Called by the writer thread right after the event's line reached the
/// file, in the same order.
pub trait ConsoleSink: Send {
    /// Echo one event
    fn echo(&mut self, event: &LogEvent) -> io::Result<()>;
}

/// Writes lines to stdout, colored by level
#[derive(Debug, Default)]
pub struct ColorConsole;

impl ColorConsole {
    pub fn new() -> Self {
        Self
    }
}

impl ConsoleSink for ColorConsole {
    fn echo(&mut self, event: &LogEvent) -> io::Result<()> {
        let line = event.line.trim_end_matches('\n');
        let colored = match event.level {
            Level::Error | Level::Fatal => line.red(),
            Level::Warning => line.yellow(),
            Level::Jedi => line.green(),
            Level::Debug => line.blue(),
            Level::Info => line.normal(),
        };
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{colored}")
    }
}

//! The logger instance and its builder

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::clock::{Clock, SystemClock};
use crate::config::{LoggerConfig, resolve_path};
use crate::error::{LogError, Result};
use crate::format::render;
use crate::level::Level;
use crate::sink::{ColorConsole, ConsoleSink};
use crate::writer::{Command, LogEvent, Worker, WriterSettings, WriterState};

/// Builder for a [`Logger`]
///
/// Lets callers inject the clock and console sink in addition to the
/// configuration.
pub struct LoggerBuilder {
    name: String,
    category: String,
    root: PathBuf,
    config: LoggerConfig,
    clock: Arc<dyn Clock>,
    console: Option<Box<dyn ConsoleSink>>,
}

impl LoggerBuilder {
    /// Start a builder writing under `<root>/<category>/`
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        root: impl AsRef<Path>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            root: root.as_ref().to_path_buf(),
            config: LoggerConfig::default(),
            clock: Arc::new(SystemClock),
            console: None,
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a YAML file
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = LoggerConfig::from_yaml_file(path)?;
        Ok(self)
    }

    /// Use a custom time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Echo lines to a custom console sink, regardless of the `console` flag
    pub fn with_console(mut self, console: Box<dyn ConsoleSink>) -> Self {
        self.console = Some(console);
        self
    }

    /// Create the directories, sweep stale files and start the writer
    pub fn build(self) -> Result<Logger> {
        let config = self.config;
        let level = config.resolved_level();
        let settings = WriterSettings {
            category_root: resolve_path(&self.root).join(&self.category),
            frequency: config.resolved_frequency(),
            max_size: config.max_size_bytes(),
            compress: config.compress,
        };

        let state = Arc::new(Mutex::new(WriterState::open(settings, self.clock.now())?));

        let console = match self.console {
            Some(console) => Some(console),
            None if config.console => Some(Box::new(ColorConsole::new()) as Box<dyn ConsoleSink>),
            None => None,
        };

        let (sender, receiver) = flume::bounded(config.queue_capacity.max(1));
        let worker = Worker {
            state: Arc::clone(&state),
            clock: Arc::clone(&self.clock),
            console,
            receiver,
        };

        let handle = std::thread::Builder::new()
            .name(format!("filelog-{}", self.category))
            .spawn(move || worker.run())
            .map_err(|e| LogError::io("spawn log writer thread", e))?;

        debug!(name = %self.name, category = %self.category, %level, "Logger started");

        Ok(Logger {
            name: self.name,
            category: self.category,
            level,
            clock: self.clock,
            sender: Some(sender),
            state,
            worker: Some(handle),
        })
    }
}

/// Asynchronous file logger
///
/// Producers on any thread call [`log`](Self::log) or [`submit`](Self::submit);
/// a dedicated thread writes the lines in enqueue order. When the queue is
/// full, producers block until the writer catches up.
///
/// Dropping the logger drains the queue and closes the file.
pub struct Logger {
    name: String,
    category: String,
    level: Level,
    clock: Arc<dyn Clock>,
    sender: Option<flume::Sender<Command>>,
    state: Arc<Mutex<WriterState>>,
    worker: Option<JoinHandle<()>>,
}

impl Logger {
    /// Create a logger with the system clock
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        root: impl AsRef<Path>,
        config: LoggerConfig,
    ) -> Result<Self> {
        LoggerBuilder::new(name, category, root)
            .with_config(config)
            .build()
    }

    /// Create a logger from a YAML configuration file
    pub fn from_config_file(
        name: impl Into<String>,
        category: impl Into<String>,
        root: impl AsRef<Path>,
        config_path: impl AsRef<Path>,
    ) -> Result<Self> {
        LoggerBuilder::new(name, category, root)
            .with_config_file(config_path)?
            .build()
    }

    /// Free-form name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory segment under the root
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Minimum level that gets written
    pub fn level_threshold(&self) -> Level {
        self.level
    }

    /// Whether events at `level` would be written
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    /// File the writer is currently appending to
    pub fn active_file(&self) -> Option<PathBuf> {
        self.state.lock().active_path().map(Path::to_path_buf)
    }

    fn sender(&self) -> Result<&flume::Sender<Command>> {
        self.sender.as_ref().ok_or(LogError::Closed)
    }

    fn event(&self, level: Level, line: String) -> LogEvent {
        LogEvent {
            level,
            timestamp: self.clock.now(),
            line,
        }
    }

    fn enqueue(&self, event: LogEvent) -> Result<()> {
        self.sender()?.send(Command::Event(event))?;
        Ok(())
    }

    /// Enqueue an already rendered line
    ///
    /// Blocks while the queue is full. Lines below the threshold are
    /// dropped without being queued.
    pub fn submit(&self, level: Level, line: impl Into<String>) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.enqueue(self.event(level, line.into()))
    }

    /// Enqueue an already rendered line, awaiting queue space
    pub async fn submit_async(&self, level: Level, line: impl Into<String>) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        let command = Command::Event(self.event(level, line.into()));
        self.sender()?.send_async(command).await?;
        Ok(())
    }

    /// Render and enqueue a message
    ///
    /// The rendered timestamp and the event's `timestamp` come from the same
    /// clock reading. Never fails; a closed queue is reported through
    /// `tracing`.
    pub fn log(&self, level: Level, message: impl Display) {
        if !self.enabled(level) {
            return;
        }
        let timestamp = self.clock.now();
        let event = LogEvent {
            level,
            timestamp,
            line: render(level, &timestamp, &message.to_string()),
        };
        if let Err(e) = self.enqueue(event) {
            error!(category = %self.category, error = %e, "Dropped log event");
        }
    }

    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn jedi(&self, message: impl Display) {
        self.log(Level::Jedi, message);
    }

    pub fn warning(&self, message: impl Display) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    /// Log at `Fatal`, wait for it to reach the file, then exit with status 1
    pub fn fatal(&self, message: impl Display) -> ! {
        self.log(Level::Fatal, message);
        if let Err(e) = self.flush() {
            error!(error = %e, "Failed to flush before exit");
        }
        std::process::exit(1);
    }

    /// Block until everything enqueued before this call has been written
    pub fn flush(&self) -> Result<()> {
        let (ack, done) = flume::bounded(1);
        self.sender()?.send(Command::Flush(ack))?;
        done.recv().map_err(|_| LogError::Closed)
    }

    /// Async variant of [`flush`](Self::flush)
    pub async fn flush_async(&self) -> Result<()> {
        let (ack, done) = flume::bounded(1);
        self.sender()?.send_async(Command::Flush(ack)).await?;
        done.recv_async().await.map_err(|_| LogError::Closed)
    }

    /// Drain pending events, close the file and stop the writer
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the only sender lets the worker finish the queue and exit.
        self.sender.take();
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            error!(category = %self.category, "Log writer thread panicked");
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

//! The serializing writer
//!
//! A single worker thread drains the event queue and is the only code that
//! touches the active file. Every event goes through the same sequence:
//! check rotation, rotate (and compress) if needed, append the line, echo.
//! Because there is one consumer, lines are written in enqueue order and a
//! rotation can never split a line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::compress::{compress_and_remove, compress_retired_files, reconcile_on_startup};
use crate::error::{LogError, Result};
use crate::level::Level;
use crate::rotation::{self, RollFrequency, RotationDecision, log_file_name, resume_index};
use crate::sink::{ConsoleSink, FileSink};

/// A rendered event waiting to be written
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    /// When the producer created the event
    pub timestamp: DateTime<Local>,
    /// Fully rendered line, including the trailing newline
    pub line: String,
}

/// Messages accepted by the worker
pub(crate) enum Command {
    Event(LogEvent),
    /// Acknowledged once every earlier command has been processed
    Flush(flume::Sender<()>),
}

/// Static parameters of a writer
#[derive(Debug, Clone)]
pub(crate) struct WriterSettings {
    pub category_root: PathBuf,
    pub frequency: RollFrequency,
    pub max_size: u64,
    /// Gzip the previous index after a size rotation
    pub compress: bool,
}

/// Rotation bookkeeping plus the open file
#[derive(Debug)]
pub(crate) struct WriterState {
    settings: WriterSettings,
    bucket: String,
    index: u32,
    last_rotate: DateTime<Local>,
    sink: Option<FileSink>,
}

impl WriterState {
    /// Prepare the active bucket and file for a freshly constructed logger
    ///
    /// Creates the bucket directory, sweeps leftovers from a previous run
    /// and opens the file to continue in. Any failure here is returned.
    pub fn open(settings: WriterSettings, now: DateTime<Local>) -> Result<Self> {
        let bucket = settings.frequency.bucket(&now);
        let dir = rotation::bucket_dir(&settings.category_root, &bucket);

        fs::create_dir_all(&dir)
            .map_err(|e| LogError::io(format!("create {}", dir.display()), e))?;

        if let Err(e) = reconcile_on_startup(&settings.category_root, &bucket) {
            warn!(
                path = %settings.category_root.display(),
                error = %e,
                "Startup compression sweep failed"
            );
        }

        let index = resume_index(&dir, settings.max_size)
            .map_err(|e| LogError::io(format!("scan {}", dir.display()), e))?;
        let path = dir.join(log_file_name(index));
        let sink = FileSink::open(&path)
            .map_err(|e| LogError::io(format!("open {}", path.display()), e))?;

        info!(path = %path.display(), "Opened log file");

        Ok(Self {
            settings,
            bucket,
            index,
            last_rotate: now,
            sink: Some(sink),
        })
    }

    fn bucket_path(&self) -> PathBuf {
        rotation::bucket_dir(&self.settings.category_root, &self.bucket)
    }

    /// Path of the file currently being written, if one is open
    pub fn active_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(FileSink::path)
    }

    /// Rotate if the period changed or the file is full
    pub fn prepare(&mut self, now: DateTime<Local>) {
        let size = match &self.sink {
            Some(sink) => match sink.size() {
                Ok(size) => size,
                Err(e) => {
                    warn!(path = %sink.path().display(), error = %e, "Failed to stat log file");
                    return;
                }
            },
            None => {
                self.recover(now);
                return;
            }
        };

        let decision = rotation::decide(
            &now,
            &self.last_rotate,
            self.settings.frequency,
            size,
            self.settings.max_size,
        );
        if decision != RotationDecision::NoAction {
            self.rotate(decision, now);
        }
    }

    /// Try to get a file open again after an earlier open failure
    fn recover(&mut self, now: DateTime<Local>) {
        if self.settings.frequency.bucket(&now) != self.bucket {
            self.rotate(RotationDecision::NewPeriod, now);
        } else {
            self.open_current();
        }
    }

    fn open_current(&mut self) {
        let dir = self.bucket_path();
        if let Err(e) = fs::create_dir_all(&dir) {
            error!(path = %dir.display(), error = %e, "Failed to create log directory");
            return;
        }

        let path = dir.join(log_file_name(self.index));
        match FileSink::open(&path) {
            Ok(sink) => {
                debug!(path = %path.display(), "Opened log file");
                self.sink = Some(sink);
            }
            Err(e) => error!(path = %path.display(), error = %e, "Failed to open log file"),
        }
    }

    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            let path = sink.path().to_path_buf();
            if let Err(e) = sink.close() {
                warn!(path = %path.display(), error = %e, "Failed to close log file");
            }
        }
    }

    fn rotate(&mut self, decision: RotationDecision, now: DateTime<Local>) {
        let previous_dir = self.bucket_path();
        let previous_index = self.index;

        match decision {
            RotationDecision::NoAction => {}
            RotationDecision::NewIndexSamePeriod => {
                self.close_sink();
                self.index += 1;
                self.last_rotate = now;
                self.open_current();

                if self.settings.compress {
                    let retired = previous_dir.join(log_file_name(previous_index));
                    if let Err(e) = compress_and_remove(&retired) {
                        warn!(path = %retired.display(), error = %e, "Failed to compress log file");
                    }
                }
            }
            RotationDecision::NewPeriod => {
                self.close_sink();
                self.bucket = self.settings.frequency.bucket(&now);
                self.last_rotate = now;

                let dir = self.bucket_path();
                let resumed = fs::create_dir_all(&dir)
                    .and_then(|_| resume_index(&dir, self.settings.max_size));
                self.index = match resumed {
                    Ok(index) => index,
                    Err(e) => {
                        error!(path = %dir.display(), error = %e, "Failed to prepare log directory");
                        1
                    }
                };
                self.open_current();
                info!(bucket = %self.bucket, index = self.index, "Started new log period");

                match compress_retired_files(&previous_dir) {
                    Ok(report) => debug!(
                        path = %previous_dir.display(),
                        compressed = report.compressed.len(),
                        failed = report.failed.len(),
                        "Compressed retired bucket"
                    ),
                    Err(e) => warn!(
                        path = %previous_dir.display(),
                        error = %e,
                        "Failed to scan retired bucket"
                    ),
                }
            }
        }
    }

    /// Append a line to the active file
    pub fn write(&mut self, line: &str) {
        match self.sink.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.write(line.as_bytes()) {
                    warn!(path = %sink.path().display(), error = %e, "Failed to write log line");
                }
            }
            None => warn!("No open log file, dropping line"),
        }
    }

    /// Close the active file
    pub fn close(&mut self) {
        self.close_sink();
    }
}

/// The background consumer
pub(crate) struct Worker {
    pub state: Arc<Mutex<WriterState>>,
    pub clock: Arc<dyn Clock>,
    pub console: Option<Box<dyn ConsoleSink>>,
    pub receiver: flume::Receiver<Command>,
}

impl Worker {
    /// Process commands until every sender is gone, then close the file
    pub fn run(mut self) {
        while let Ok(command) = self.receiver.recv() {
            match command {
                Command::Event(event) => self.handle(event),
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        self.state.lock().close();
        debug!("Log writer stopped");
    }

    fn handle(&mut self, event: LogEvent) {
        // Rotation follows the writer's clock: producer stamps from different
        // threads can arrive out of order and must not move the bucket back.
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            state.prepare(now);
            state.write(&event.line);
        }

        if let Some(console) = self.console.as_mut()
            && let Err(e) = console.echo(&event)
        {
            warn!(error = %e, "Failed to echo log line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn start_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .earliest()
            .unwrap()
    }

    fn settings(root: &Path, max_size: u64, compress: bool) -> WriterSettings {
        WriterSettings {
            category_root: root.join("app"),
            frequency: RollFrequency::Hourly,
            max_size,
            compress,
        }
    }

    #[test]
    fn test_open_creates_bucket_and_first_file() {
        let temp = TempDir::new().unwrap();
        let state = WriterState::open(settings(temp.path(), 1024, true), start_time()).unwrap();
        let expected = temp.path().join("app/2024-01-15-10/1.log");
        assert_eq!(state.active_path(), Some(expected.as_path()));
        assert!(expected.exists());
    }

    #[test]
    fn test_size_rotation_increments_index() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 10, false), now).unwrap();

        state.prepare(now);
        state.write("0123456789\n");
        state.prepare(now);
        state.write("next\n");

        let bucket = temp.path().join("app/2024-01-15-10");
        assert_eq!(fs::read_to_string(bucket.join("1.log")).unwrap(), "0123456789\n");
        assert_eq!(fs::read_to_string(bucket.join("2.log")).unwrap(), "next\n");
    }

    #[test]
    fn test_size_rotation_compresses_previous_index() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 4, true), now).unwrap();

        state.prepare(now);
        state.write("full\n");
        state.prepare(now);
        state.write("more\n");

        let bucket = temp.path().join("app/2024-01-15-10");
        assert!(!bucket.join("1.log").exists());
        assert!(bucket.join("1.log.gz").exists());
        assert!(bucket.join("2.log").exists());
    }

    #[test]
    fn test_period_rotation_resets_index_and_retires_bucket() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 4, true), now).unwrap();

        state.prepare(now);
        state.write("a\n");
        let later = now + Duration::hours(1);
        state.prepare(later);
        state.write("b\n");

        let old = temp.path().join("app/2024-01-15-10");
        let new = temp.path().join("app/2024-01-15-11");
        assert!(old.join("1.log.gz").exists());
        assert!(!old.join("1.log").exists());
        assert_eq!(fs::read_to_string(new.join("1.log")).unwrap(), "b\n");
    }

    #[test]
    fn test_period_rotation_compresses_even_when_flag_is_off() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 1024, false), now).unwrap();

        state.prepare(now);
        state.write("a\n");
        state.prepare(now + Duration::hours(1));
        state.write("b\n");

        let old = temp.path().join("app/2024-01-15-10");
        assert!(!old.join("1.log").exists());
        assert!(old.join("1.log.gz").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_failure_skips_rotation_but_still_writes() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 4, false), now).unwrap();

        state.prepare(now);
        state.write("full\n");

        // The open handle stays valid after the path disappears.
        let active = temp.path().join("app/2024-01-15-10/1.log");
        fs::remove_file(&active).unwrap();

        state.prepare(now);
        assert_eq!(state.index, 1);
        assert_eq!(state.active_path(), Some(active.as_path()));
        state.write("more\n");

        let bucket = temp.path().join("app/2024-01-15-10");
        assert!(!bucket.join("2.log").exists());
        assert!(!bucket.join("1.log.gz").exists());
    }

    #[test]
    fn test_recovers_after_bucket_removed() {
        let temp = TempDir::new().unwrap();
        let now = start_time();
        let mut state = WriterState::open(settings(temp.path(), 1024, false), now).unwrap();
        state.close();

        fs::remove_dir_all(temp.path().join("app/2024-01-15-10")).unwrap();
        state.prepare(now);
        state.write("back\n");

        let path = temp.path().join("app/2024-01-15-10/1.log");
        assert_eq!(fs::read_to_string(path).unwrap(), "back\n");
    }
}

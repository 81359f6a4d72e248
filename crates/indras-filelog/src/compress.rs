//! Gzip compression of retired log files
//!
//! The original file is removed only after the compressed copy has been
//! fully written, flushed and synced. A crash mid-compression can leave a
//! partial `.gz` next to the intact `.log`, which the next sweep overwrites.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info, warn};

use crate::rotation::parse_index;

/// Suffix appended to compressed files
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// Result of sweeping one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionReport {
    /// Compressed files that were produced
    pub compressed: Vec<PathBuf>,
    /// Files whose compression failed and were left in place
    pub failed: Vec<PathBuf>,
}

/// Path of the compressed companion of a log file
pub fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(COMPRESSED_SUFFIX);
    PathBuf::from(name)
}

/// Compress `input` into `output` at maximum compression
///
/// Does not touch `input`.
pub fn compress_file(input: &Path, output: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);

    let mut encoder = GzEncoder::new(writer, Compression::best());
    let copied = io::copy(&mut reader, &mut encoder)?;

    let mut writer = encoder.finish()?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    Ok(copied)
}

/// Compress one log file and remove the original
pub fn compress_and_remove(input: &Path) -> io::Result<PathBuf> {
    let output = compressed_path(input);
    let bytes = compress_file(input, &output)?;
    fs::remove_file(input)?;
    debug!(path = %output.display(), bytes, "Compressed log file");
    Ok(output)
}

/// Compress every uncompressed `N.log` file in a retired bucket directory
///
/// Failures are logged and only abandon the file they occurred on.
pub fn compress_retired_files(dir: &Path) -> io::Result<CompressionReport> {
    let mut report = CompressionReport::default();

    let mut targets = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_log = entry
            .file_name()
            .to_str()
            .and_then(|name| parse_index(name, false))
            .is_some();
        if is_log && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            targets.push(entry.path());
        }
    }
    targets.sort();

    for path in targets {
        match compress_and_remove(&path) {
            Ok(output) => report.compressed.push(output),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to compress log file");
                report.failed.push(path);
            }
        }
    }

    Ok(report)
}

/// Compress leftovers from a previous run
///
/// Looks at the bucket directories under `category_root`, ignores the one
/// named `current_bucket`, and sweeps only the latest of the rest by name.
/// Older buckets are expected to have been swept by earlier runs.
pub fn reconcile_on_startup(
    category_root: &Path,
    current_bucket: &str,
) -> io::Result<Option<CompressionReport>> {
    let mut buckets = Vec::new();
    for entry in fs::read_dir(category_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string()
            && name != current_bucket
        {
            buckets.push(name);
        }
    }

    buckets.sort();
    let Some(latest) = buckets.pop() else {
        return Ok(None);
    };

    let report = compress_retired_files(&category_root.join(&latest))?;
    if !report.compressed.is_empty() {
        info!(
            bucket = %latest,
            files = report.compressed.len(),
            "Compressed log files left by a previous run"
        );
    }
    Ok(Some(report))
}

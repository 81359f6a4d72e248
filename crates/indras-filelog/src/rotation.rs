//! Rotation policy and on-disk naming
//!
//! Files live at `<root>/<category>/<bucket>/<index>.log`, where `bucket` is
//! the current time formatted at the rotation granularity. Bucket formats
//! are zero-padded and most-significant-first so that sorting names as
//! strings sorts them by time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// How often a new bucket directory is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollFrequency {
    Secondly,
    Minutely,
    Hourly,
    #[default]
    Daily,
    /// Shares the daily bucket format, so it currently rotates every day
    Weekly,
    Monthly,
    Yearly,
}

impl RollFrequency {
    /// Parse a frequency name, falling back to `Daily` for unknown names
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "secondly" => RollFrequency::Secondly,
            "minutely" => RollFrequency::Minutely,
            "hourly" => RollFrequency::Hourly,
            "daily" => RollFrequency::Daily,
            "weekly" => RollFrequency::Weekly,
            "monthly" => RollFrequency::Monthly,
            "yearly" => RollFrequency::Yearly,
            other => {
                tracing::warn!(frequency = other, "Unknown rotation frequency, using daily");
                RollFrequency::default()
            }
        }
    }

    /// `strftime` pattern used for bucket directory names
    pub fn bucket_format(&self) -> &'static str {
        match self {
            RollFrequency::Secondly => "%Y-%m-%d-%H-%M-%S",
            RollFrequency::Minutely => "%Y-%m-%d-%H-%M",
            RollFrequency::Hourly => "%Y-%m-%d-%H",
            // TODO: give weekly its own ISO-week format once existing
            // deployments no longer depend on daily directories.
            RollFrequency::Daily | RollFrequency::Weekly => "%Y-%m-%d",
            RollFrequency::Monthly => "%Y-%m",
            RollFrequency::Yearly => "%Y",
        }
    }

    /// Bucket name for a point in time
    pub fn bucket<Tz>(&self, time: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        time.format(self.bucket_format()).to_string()
    }
}

/// Outcome of a rotation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Keep writing to the current file
    NoAction,
    /// Size threshold reached, move to the next index in the same bucket
    NewIndexSamePeriod,
    /// The period changed, start a new bucket and retire the old one
    NewPeriod,
}

/// Decide whether the writer must rotate before the next write
///
/// A period change takes precedence over the size threshold.
pub fn decide<Tz>(
    now: &DateTime<Tz>,
    last_rotate: &DateTime<Tz>,
    frequency: RollFrequency,
    current_size: u64,
    max_size: u64,
) -> RotationDecision
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if frequency.bucket(now) != frequency.bucket(last_rotate) {
        RotationDecision::NewPeriod
    } else if current_size >= max_size {
        RotationDecision::NewIndexSamePeriod
    } else {
        RotationDecision::NoAction
    }
}

/// Name of the active file for an index
pub fn log_file_name(index: u32) -> String {
    format!("{index}.log")
}

/// Index encoded in a file name
///
/// Accepts `N.log` and, when `include_compressed` is set, `N.log.gz`.
pub fn parse_index(file_name: &str, include_compressed: bool) -> Option<u32> {
    let stem = match file_name.strip_suffix(".log") {
        Some(stem) => stem,
        None if include_compressed => file_name.strip_suffix(".log.gz")?,
        None => return None,
    };
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Highest index present in a bucket directory, counting compressed files
pub fn highest_index(dir: &Path) -> io::Result<u32> {
    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(index) = entry.file_name().to_str().and_then(|n| parse_index(n, true)) {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}

/// Pick the index to write to when opening a bucket
///
/// Continues the highest uncompressed file if it is still below
/// `max_size`; otherwise starts the next index. An empty bucket yields 1.
pub fn resume_index(dir: &Path, max_size: u64) -> io::Result<u32> {
    let highest = highest_index(dir)?;
    if highest > 0 {
        let candidate = dir.join(log_file_name(highest));
        if let Ok(meta) = fs::metadata(&candidate)
            && meta.len() < max_size
        {
            return Ok(highest);
        }
    }
    Ok(highest + 1)
}

/// Path of the bucket directory for a category
pub fn bucket_dir(category_root: &Path, bucket: &str) -> PathBuf {
    category_root.join(bucket)
}

//! Line rendering

use chrono::{DateTime, TimeZone};

use crate::level::Level;

/// Timestamp layout: millisecond precision with a numeric UTC offset
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Width of the bracketed level column, including padding
pub const LEVEL_COLUMN_WIDTH: usize = 9;

/// Render one log line, including the trailing newline
///
/// ```text
/// 2024-01-02T15:04:05.123+03:00 [ERROR]   disk is full
/// ```
pub fn render<Tz>(level: Level, timestamp: &DateTime<Tz>, message: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let tag = format!("[{}]", level.as_str());
    format!(
        "{} {:<width$} {}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        tag,
        message,
        width = LEVEL_COLUMN_WIDTH
    )
}

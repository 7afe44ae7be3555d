//! Recording clock for export timestamps.
//!
//! The derived format wants one start date for the whole recording plus a
//! time of day per frame. The first exported frame fixes the start; every
//! later frame's time is its elapsed milliseconds added to the start time of
//! day. A frame captured on a later calendar day has its hour reduced modulo
//! 24 so the hour field never overflows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

use crate::error::ExportError;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Date and time strings handed to the derived-format writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    /// Recording start date, `YYYY-MM-DD`
    pub date: String,
    /// Time of day, `HH:MM:SS.mmm`
    pub time: String,
}

#[derive(Debug, Clone, Copy)]
struct Start {
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
}

/// Derives export timestamps from capture times and elapsed milliseconds.
#[derive(Debug, Default)]
pub struct RecordingClock {
    start: Option<Start>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date of the first stamped frame.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start.map(|start| start.date)
    }

    /// Timestamp for a frame captured at `capture_time`, `elapsed_ms` after
    /// the recording started.
    pub fn stamp(&mut self, capture_time: &str, elapsed_ms: f64) -> Result<Timestamp, ExportError> {
        let captured = parse_capture_time(capture_time)?;
        let start = *self.start.get_or_insert_with(|| Start {
            date: captured.date(),
            hour: captured.hour(),
            minute: captured.minute(),
            second: captured.second(),
        });

        let elapsed = if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            elapsed_ms as u64
        } else {
            0
        };
        let ms = elapsed
            + start.second as u64 * MS_PER_SECOND
            + start.minute as u64 * MS_PER_MINUTE
            + start.hour as u64 * MS_PER_HOUR;

        let mut hours = ms / MS_PER_HOUR;
        if captured.date() != start.date {
            hours %= 24;
        }

        Ok(Timestamp {
            date: start.date.format("%Y-%m-%d").to_string(),
            time: format!("{:02}:{}", hours, format_minutes(ms)),
        })
    }
}

/// Format milliseconds as `HH:MM:SS.mmm`. Hours are not wrapped.
pub fn format_elapsed(ms: u64) -> String {
    format!("{:02}:{}", ms / MS_PER_HOUR, format_minutes(ms))
}

fn format_minutes(ms: u64) -> String {
    format!(
        "{:02}:{:02}.{:03}",
        (ms / MS_PER_MINUTE) % 60,
        (ms / MS_PER_SECOND) % 60,
        ms % MS_PER_SECOND
    )
}

/// Parse a capture time tag such as `2014-03-19 14:21:33.123 -0700`.
///
/// The local wall-clock time is kept; the zone offset is only validated.
/// Times without an offset are accepted with a space or `T` separator.
pub fn parse_capture_time(value: &str) -> Result<NaiveDateTime, ExportError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Ok(parsed.naive_local());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| ExportError::Timestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}

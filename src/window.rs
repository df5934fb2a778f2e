//! Time windows and the canonical timestamp wire format.
//!
//! Every timestamp that becomes part of a cache key or an upstream request is
//! rendered as `YYYY-MM-DDTHH:MM:SS.mmmZ`. Inputs may be bare dates, naive
//! datetimes (assumed UTC) or RFC 3339 with any offset; all of them collapse to
//! the same canonical string so that equal windows share a cache entry.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::ValidationError;

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window from already-parsed instants.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyWindow {
                start: format_canonical(&start),
                end: format_canonical(&end),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two user-supplied timestamps.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    /// Parse an optional window; both bounds or neither.
    pub fn parse_optional(
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<Self>, ValidationError> {
        match (start, end) {
            (Some(s), Some(e)) => Self::parse(s, e).map(Some),
            (None, None) => Ok(None),
            _ => Err(ValidationError::PartialWindow),
        }
    }

    /// The immediately preceding window of identical length.
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        Self {
            start: self.start - length,
            end: self.start,
        }
    }

    pub fn start_iso(&self) -> String {
        format_canonical(&self.start)
    }

    pub fn end_iso(&self) -> String {
        format_canonical(&self.end)
    }
}

/// Render an instant in the canonical wire format.
pub fn format_canonical(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any accepted timestamp spelling into a UTC instant.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(ValidationError::InvalidTimestamp(input.to_string()))
}

/// Normalize a timestamp string to the canonical wire format.
pub fn normalize_timestamp(input: &str) -> Result<String, ValidationError> {
    parse_timestamp(input).map(|dt| format_canonical(&dt))
}

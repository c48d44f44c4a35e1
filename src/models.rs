//! Data models for the glucose monitor.
//!
//! `RawEntry` mirrors one element of the Nightscout
//! `/api/v1/entries/current.json` array; `Reading` is the validated,
//! UTC-normalized value the rest of the pipeline works with.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::FetchError;

// ---

/// Trend code reported alongside each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Direction {
    // ---
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
}

impl Direction {
    pub const ALL: [Direction; 7] = [
        Direction::DoubleUp,
        Direction::SingleUp,
        Direction::FortyFiveUp,
        Direction::Flat,
        Direction::FortyFiveDown,
        Direction::SingleDown,
        Direction::DoubleDown,
    ];

    /// Code as it appears on the wire.
    pub fn code(self) -> &'static str {
        // ---
        match self {
            Direction::DoubleUp => "DoubleUp",
            Direction::SingleUp => "SingleUp",
            Direction::FortyFiveUp => "FortyFiveUp",
            Direction::Flat => "Flat",
            Direction::FortyFiveDown => "FortyFiveDown",
            Direction::SingleDown => "SingleDown",
            Direction::DoubleDown => "DoubleDown",
        }
    }

    /// Parse a wire code. Anything outside the seven known codes is `None`.
    pub fn from_code(code: &str) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.code() == code)
    }
}

/// Raw entry from the monitoring API
#[derive(Debug, Deserialize)]
pub struct RawEntry {
    // ---
    pub sgv: f64,
    pub delta: f64,
    #[serde(rename = "dateString")]
    pub date_string: String,
    pub direction: Direction,
}

/// Validated reading, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    /// Sensor glucose value in mg/dL.
    pub sgv: f64,
    /// Change since the previous reading in mg/dL, signed.
    pub delta: f64,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
}

impl RawEntry {
    // ---
    pub fn to_reading(&self) -> Result<Reading, FetchError> {
        // ---
        if !self.sgv.is_finite() || self.sgv < 0.0 {
            return Err(FetchError::MalformedResponse(format!(
                "sgv must be a non-negative number, got {}",
                self.sgv
            )));
        }
        if !self.delta.is_finite() {
            return Err(FetchError::MalformedResponse(format!(
                "delta must be a finite number, got {}",
                self.delta
            )));
        }

        Ok(Reading {
            sgv: self.sgv,
            delta: self.delta,
            timestamp: parse_timestamp(&self.date_string)?,
            direction: self.direction,
        })
    }
}

/// Parse a `dateString` into UTC.
///
/// Accepts `2024-01-01T00:00:00.000000+0000`, RFC 3339 (`...Z`, `...+01:00`)
/// and offset-less timestamps, which are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FetchError> {
    // ---
    let raw = raw.trim();

    if let Ok(ts) = DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    Err(FetchError::MalformedResponse(format!(
        "unrecognized dateString '{}'",
        raw
    )))
}

/// Parse a response body into the current reading (first array element).
pub fn parse_entries(body: &str) -> Result<Reading, FetchError> {
    // ---
    let entries: Vec<RawEntry> = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let first = entries
        .first()
        .ok_or_else(|| FetchError::MalformedResponse("response contains no entries".into()))?;

    first.to_reading()
}

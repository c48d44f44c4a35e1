// src/pipeline/staleness.rs
//! Age of a reading in whole minutes.

use chrono::{DateTime, Duration, Utc};

// ---

/// Floor of the elapsed minutes between `reading` and `now`.
///
/// Sub-second parts count: a reading half a second in the future (clock
/// skew) is already at -1. Negative values are reported, never an error.
pub fn minutes_since(reading: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    // ---
    let elapsed = now - reading;

    // num_seconds() truncates toward zero; step down for a negative fraction.
    let mut seconds = elapsed.num_seconds();
    if elapsed < Duration::seconds(seconds) {
        seconds -= 1;
    }
    seconds.div_euclid(60)
}

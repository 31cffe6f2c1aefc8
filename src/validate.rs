//! Rolling-Window Validator - Serving gate
//!
//! Checks that a request carries enough chronologically ordered history
//! for the long-horizon detector to be meaningful. The validator only
//! checks; reordering is the caller's responsibility.
//!
//! Passing validation does not guarantee a non-sentinel long-horizon
//! score for every row: only the overall span is checked, and rows early
//! in the window still receive the insufficient-history result.

use crate::error::ValidationError;
use crate::readings::SensorReading;

/// Validate that `readings` form an acceptable rolling window.
///
/// Rejects when:
/// - fewer than 2 readings are present,
/// - timestamps are not chronologically ordered,
/// - two readings share a timestamp,
/// - the span between first and last timestamp is below `min_hours`.
pub fn validate_rolling_window(
    readings: &[SensorReading],
    min_hours: f64,
) -> Result<(), ValidationError> {
    if readings.len() < 2 {
        return Err(ValidationError::TooFewReadings(readings.len()));
    }

    for (i, pair) in readings.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.timestamp < prev.timestamp {
            return Err(ValidationError::OutOfOrder { index: i + 1 });
        }
        if next.timestamp == prev.timestamp {
            return Err(ValidationError::DuplicateTimestamp {
                index: i + 1,
                timestamp: next.timestamp.to_string(),
            });
        }
    }

    let first = readings[0].timestamp;
    let last = readings[readings.len() - 1].timestamp;
    let span_hours = (last - first).num_seconds() as f64 / 3600.0;

    if span_hours < min_hours {
        return Err(ValidationError::InsufficientSpan {
            required: min_hours,
            actual: span_hours,
        });
    }

    Ok(())
}

//! Sensor Readings - Inbound data model and frame construction
//!
//! A reading carries a timezone-naive ISO-8601 timestamp plus four
//! optional physiological channels. Frame construction stabilizes order,
//! refuses duplicate timestamps, and resolves missing values with
//! forward-fill, then backward-fill, then zero, producing a fully dense
//! channel matrix with one row per reading.

use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::constants::{CHANNELS, CHANNEL_COUNT};
use crate::error::ValidationError;

/// Single wearable sensor reading.
///
/// Field names follow the inbound API convention (camelCase); absent
/// numeric fields are treated as missing and imputed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// ISO-8601 timestamp (timezone-naive).
    pub timestamp: NaiveDateTime,
    /// Systolic blood pressure (mmHg).
    #[serde(default)]
    pub blood_pressure: Option<f64>,
    /// Blood glucose level (mg/dL).
    #[serde(default)]
    pub blood_glucose: Option<f64>,
    /// Heart rate (bpm).
    #[serde(default)]
    pub heart_rate: Option<f64>,
    /// Activity level (steps/hour equivalent).
    #[serde(default)]
    pub activity: Option<f64>,
}

impl SensorReading {
    /// Channel values in matrix column order.
    fn channels(&self) -> [Option<f64>; CHANNEL_COUNT] {
        [
            self.blood_pressure,
            self.blood_glucose,
            self.heart_rate,
            self.activity,
        ]
    }
}

/// Chronologically ordered, fully imputed channel matrix.
#[derive(Debug, Clone)]
pub struct ReadingFrame {
    timestamps: Vec<NaiveDateTime>,
    /// Dense matrix, one row per reading, one column per channel.
    channels: Array2<f64>,
}

impl ReadingFrame {
    /// Build a frame from raw readings.
    ///
    /// Readings are stably sorted by timestamp. Duplicate timestamps are
    /// rejected: rolling-window statistics do not special-case ties, so
    /// accepting them would silently degrade feature quality.
    pub fn from_readings(readings: &[SensorReading]) -> Result<Self, ValidationError> {
        if readings.is_empty() {
            return Err(ValidationError::TooFewReadings(0));
        }

        let mut sorted: Vec<&SensorReading> = readings.iter().collect();
        sorted.sort_by_key(|r| r.timestamp);

        for (i, pair) in sorted.windows(2).enumerate() {
            if pair[0].timestamp == pair[1].timestamp {
                return Err(ValidationError::DuplicateTimestamp {
                    index: i + 1,
                    timestamp: pair[1].timestamp.to_string(),
                });
            }
        }

        let n = sorted.len();
        let timestamps: Vec<NaiveDateTime> = sorted.iter().map(|r| r.timestamp).collect();

        let mut channels = Array2::<f64>::zeros((n, CHANNEL_COUNT));
        for col in 0..CHANNEL_COUNT {
            let raw: Vec<Option<f64>> = sorted.iter().map(|r| r.channels()[col]).collect();
            let filled = impute(&raw);
            for (row, value) in filled.into_iter().enumerate() {
                channels[[row, col]] = value;
            }
        }

        Ok(Self {
            timestamps,
            channels,
        })
    }

    /// Number of readings in the frame.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Dense channel matrix (rows x 4), column order per [`CHANNELS`].
    pub fn channels(&self) -> &Array2<f64> {
        &self.channels
    }

    /// Column index of a named channel.
    pub fn channel_index(name: &str) -> Option<usize> {
        CHANNELS.iter().position(|&c| c == name)
    }
}

/// Forward-fill, then backward-fill, then zero.
fn impute(values: &[Option<f64>]) -> Vec<f64> {
    let mut out: Vec<Option<f64>> = values.to_vec();

    let mut last = None;
    for v in out.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }

    let mut next = None;
    for v in out.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }

    out.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn reading(hour: u32, bp: Option<f64>) -> SensorReading {
        SensorReading {
            timestamp: ts(hour),
            blood_pressure: bp,
            blood_glucose: Some(95.0),
            heart_rate: Some(70.0),
            activity: Some(100.0),
        }
    }

    #[test]
    fn forward_then_backward_fill() {
        let readings = vec![
            reading(0, None),
            reading(1, Some(120.0)),
            reading(2, None),
            reading(3, Some(125.0)),
            reading(4, None),
        ];
        let frame = ReadingFrame::from_readings(&readings).unwrap();
        let bp = frame.channels().column(0);
        // Leading gap backfills, interior gaps forward-fill.
        assert_eq!(bp[0], 120.0);
        assert_eq!(bp[2], 120.0);
        assert_eq!(bp[4], 125.0);
    }

    #[test]
    fn fully_absent_channel_imputes_to_zero() {
        let readings = vec![reading(0, None), reading(1, None)];
        let frame = ReadingFrame::from_readings(&readings).unwrap();
        assert!(frame.channels().column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn readings_are_sorted_stably() {
        let readings = vec![reading(3, Some(1.0)), reading(1, Some(2.0)), reading(2, Some(3.0))];
        let frame = ReadingFrame::from_readings(&readings).unwrap();
        assert_eq!(frame.timestamps(), &[ts(1), ts(2), ts(3)]);
        assert_eq!(frame.channels().column(0).to_vec(), vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let readings = vec![reading(1, None), reading(1, None)];
        let err = ReadingFrame::from_readings(&readings).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateTimestamp { .. }));
    }

    #[test]
    fn empty_input_rejected_single_reading_accepted() {
        let err = ReadingFrame::from_readings(&[]).unwrap_err();
        assert_eq!(err, ValidationError::TooFewReadings(0));

        let frame = ReadingFrame::from_readings(&[reading(0, Some(120.0))]).unwrap();
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn deserializes_camel_case_with_absent_fields() {
        let json = r#"{"timestamp":"2024-01-01T00:00:00","bloodPressure":121.5,"heartRate":68.0}"#;
        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.blood_pressure, Some(121.5));
        assert_eq!(reading.blood_glucose, None);
        assert_eq!(reading.activity, None);
    }

    #[test]
    fn missing_timestamp_fails_deserialization() {
        let json = r#"{"bloodPressure":121.5}"#;
        assert!(serde_json::from_str::<SensorReading>(json).is_err());
    }
}

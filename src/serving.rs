//! Model Handle - Concurrent serving wrapper
//!
//! Wraps a trained [`SddSystem`] behind a read-write lock over an `Arc`
//! so request handlers share one immutable model while a background
//! retrain can swap in a replacement atomically. Readers clone the
//! `Arc` and release the lock before scoring, so inference never holds
//! the lock and an in-flight request keeps scoring against the model it
//! started with.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, SddError};
use crate::readings::{ReadingFrame, SensorReading};
use crate::system::{Prediction, PredictionReport, SddSystem};
use crate::validate::validate_rolling_window;

/// Shared handle to the currently served model.
pub struct ModelHandle {
    system: RwLock<Arc<SddSystem>>,
}

impl ModelHandle {
    /// Wrap an already trained (or loaded) system.
    pub fn new(system: SddSystem) -> Self {
        Self {
            system: RwLock::new(Arc::new(system)),
        }
    }

    /// Load artifacts from disk and wrap them for serving. Any artifact
    /// failure is returned as-is; callers treat it as fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let system = SddSystem::load_artifacts(path)?;
        Ok(Self::new(system))
    }

    /// Snapshot of the currently served system.
    pub fn current(&self) -> Arc<SddSystem> {
        Arc::clone(&self.system.read())
    }

    /// Replace the served system. In-flight requests finish against the
    /// snapshot they took; new requests see the replacement.
    pub fn swap(&self, system: SddSystem) {
        *self.system.write() = Arc::new(system);
        log::info!("served model swapped");
    }

    /// Validate a rolling window and score every reading in it.
    pub fn predict(&self, readings: &[SensorReading]) -> Result<PredictionReport> {
        let system = self.current();
        validate_rolling_window(readings, system.config().serving.min_window_hours)?;
        let frame = ReadingFrame::from_readings(readings).map_err(SddError::Validation)?;
        system.predict(&frame)
    }

    /// Validate, score, and return the payload for the latest reading.
    pub fn predict_latest(&self, readings: &[SensorReading]) -> Result<Prediction> {
        let report = self.predict(readings)?;
        report
            .latest()
            .ok_or(SddError::ModelNotReady("prediction produced no rows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AutoencoderConfig, FeatureConfig, IsolationConfig, SddConfig, ServingConfig};
    use crate::error::ValidationError;
    use chrono::NaiveDate;

    fn tiny_config() -> SddConfig {
        SddConfig {
            features: FeatureConfig {
                windows: vec![4, 8],
                correlation_window: 8,
            },
            isolation: IsolationConfig {
                n_estimators: 25,
                contamination: 0.05,
                max_samples: 64,
            },
            autoencoder: AutoencoderConfig {
                sequence_length: 6,
                latent_dim: 3,
                lstm_units: 4,
                epochs: 3,
                batch_size: 8,
                dropout: 0.0,
                ..AutoencoderConfig::default()
            },
            serving: ServingConfig {
                min_window_hours: 24.0,
            },
            ..SddConfig::default()
        }
    }

    fn hourly_readings(hours: usize) -> Vec<SensorReading> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..hours)
            .map(|h| {
                let phase = h as f64 * std::f64::consts::TAU / 24.0;
                SensorReading {
                    timestamp: start + chrono::Duration::hours(h as i64),
                    blood_pressure: Some(120.0 + 5.0 * phase.sin()),
                    blood_glucose: Some(95.0 + 8.0 * (phase + 1.0).sin()),
                    heart_rate: Some(70.0 + 6.0 * phase.cos()),
                    activity: Some(100.0 + 80.0 * phase.sin().max(0.0)),
                }
            })
            .collect()
    }

    fn trained_handle() -> ModelHandle {
        let mut system = SddSystem::new(tiny_config());
        let frame = ReadingFrame::from_readings(&hourly_readings(48)).unwrap();
        system.train(&frame).unwrap();
        ModelHandle::new(system)
    }

    #[test]
    fn short_window_is_rejected_before_scoring() {
        let handle = trained_handle();
        let err = handle.predict(&hourly_readings(10)).unwrap_err();
        assert!(matches!(
            err,
            SddError::Validation(ValidationError::InsufficientSpan { .. })
        ));
    }

    #[test]
    fn predict_latest_returns_the_final_reading() {
        let handle = trained_handle();
        let readings = hourly_readings(48);
        let prediction = handle.predict_latest(&readings).unwrap();
        assert_eq!(prediction.timestamp, readings[47].timestamp);
        assert!((0.0..=100.0).contains(&prediction.health_stability_score));
    }

    #[test]
    fn swap_replaces_the_served_system() {
        let handle = trained_handle();
        let before = handle.current();
        assert!(before.is_trained());

        handle.swap(SddSystem::new(tiny_config()));
        let after = handle.current();
        assert!(!after.is_trained());
        // The old snapshot survives the swap.
        assert!(before.is_trained());

        let err = handle.predict(&hourly_readings(48)).unwrap_err();
        assert!(matches!(err, SddError::ModelNotReady(_)));
    }

    #[test]
    fn readers_snapshot_does_not_hold_the_lock() {
        let handle = trained_handle();
        let snapshot = handle.current();
        // A write while a snapshot is alive must not deadlock.
        handle.swap(SddSystem::new(tiny_config()));
        assert!(snapshot.is_trained());
    }
}

//! Detection System - Pipeline orchestrator
//!
//! Owns the feature engineer, both detector layers, and the fusion
//! scorer. Training runs feature extraction once and fits both
//! detectors on the same matrix; prediction runs extraction, both
//! detectors, and fusion, producing one fused score per input reading.
//!
//! The system trains as a unit. There is no partial state: either both
//! detectors are fitted (trained or loaded from artifacts) or predict
//! refuses with `ModelNotReady`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::SddConfig;
use crate::error::{Result, SddError};
use crate::features::{FeatureMatrix, TemporalFeatureEngineer};
use crate::model::{IsolationForestDetector, LstmAutoencoder, SequenceScore};
use crate::readings::ReadingFrame;
use crate::scoring::{RiskCategory, StabilityScorer};

/// Outbound payload for the most recent reading. Field names follow the
/// inbound API convention (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub timestamp: NaiveDateTime,
    pub health_stability_score: f64,
    pub isolation_score: f64,
    pub lstm_score: f64,
    /// `None` when the reading had insufficient history for the
    /// long-horizon layer.
    pub reconstruction_error: Option<f64>,
    pub risk_category: RiskCategory,
}

/// Full per-reading prediction output.
#[derive(Debug, Clone)]
pub struct PredictionReport {
    timestamps: Vec<NaiveDateTime>,
    isolation_scores: Vec<f64>,
    sequence_scores: Vec<SequenceScore>,
    fused_scores: Vec<f64>,
    categories: Vec<RiskCategory>,
    features: FeatureMatrix,
}

impl PredictionReport {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn isolation_scores(&self) -> &[f64] {
        &self.isolation_scores
    }

    pub fn sequence_scores(&self) -> &[SequenceScore] {
        &self.sequence_scores
    }

    pub fn fused_scores(&self) -> &[f64] {
        &self.fused_scores
    }

    pub fn categories(&self) -> &[RiskCategory] {
        &self.categories
    }

    /// Features the scores were computed from.
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Outbound payload for the most recent reading.
    pub fn latest(&self) -> Option<Prediction> {
        let idx = self.timestamps.len().checked_sub(1)?;
        Some(Prediction {
            timestamp: self.timestamps[idx],
            health_stability_score: self.fused_scores[idx],
            isolation_score: self.isolation_scores[idx],
            lstm_score: self.sequence_scores[idx].stability_score(),
            reconstruction_error: self.sequence_scores[idx].reconstruction_error(),
            risk_category: self.categories[idx],
        })
    }
}

/// Dual-layer deterioration detection pipeline.
#[derive(Debug, Clone)]
pub struct SddSystem {
    config: SddConfig,
    engineer: TemporalFeatureEngineer,
    isolation: IsolationForestDetector,
    autoencoder: LstmAutoencoder,
    scorer: StabilityScorer,
}

impl SddSystem {
    pub fn new(config: SddConfig) -> Self {
        Self {
            engineer: TemporalFeatureEngineer::new(config.features.clone()),
            isolation: IsolationForestDetector::new(config.isolation.clone()),
            autoencoder: LstmAutoencoder::new(config.autoencoder.clone()),
            scorer: StabilityScorer::new(config.fusion.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SddConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.isolation.is_trained() && self.autoencoder.is_trained()
    }

    /// Long-horizon baseline error statistics, once trained.
    pub fn baseline_statistics(&self) -> Option<&crate::model::BaselineStatistics> {
        self.autoencoder.baseline()
    }

    pub(crate) fn isolation(&self) -> &IsolationForestDetector {
        &self.isolation
    }

    pub(crate) fn autoencoder(&self) -> &LstmAutoencoder {
        &self.autoencoder
    }

    pub(crate) fn from_parts(
        config: SddConfig,
        isolation: IsolationForestDetector,
        autoencoder: LstmAutoencoder,
    ) -> Self {
        Self {
            engineer: TemporalFeatureEngineer::new(config.features.clone()),
            scorer: StabilityScorer::new(config.fusion.clone()),
            isolation,
            autoencoder,
            config,
        }
    }

    /// Train both detector layers on a healthy-baseline frame.
    pub fn train(&mut self, frame: &ReadingFrame) -> Result<()> {
        log::info!(
            "training on {} readings ({} feature columns)",
            frame.len(),
            self.engineer.n_features()
        );

        let features = self.engineer.extract(frame);
        self.isolation.fit(features.data());
        self.autoencoder.fit(features.data())?;

        log::info!("training complete");
        Ok(())
    }

    /// Score every reading in the frame.
    pub fn predict(&self, frame: &ReadingFrame) -> Result<PredictionReport> {
        if !self.is_trained() {
            return Err(SddError::ModelNotReady("detection system is untrained"));
        }

        let features = self.engineer.extract(frame);
        let isolation_scores = self.isolation.score(features.data())?;
        let sequence_scores = self.autoencoder.score(features.data())?;

        let mut fused_scores = Vec::with_capacity(frame.len());
        let mut categories = Vec::with_capacity(frame.len());
        for (iso, seq) in isolation_scores.iter().zip(sequence_scores.iter()) {
            let (fused, category) = self.scorer.interpret(*iso, seq);
            fused_scores.push(fused);
            categories.push(category);
        }

        Ok(PredictionReport {
            timestamps: frame.timestamps().to_vec(),
            isolation_scores,
            sequence_scores,
            fused_scores,
            categories,
            features,
        })
    }
}

impl Default for SddSystem {
    fn default() -> Self {
        Self::new(SddConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AutoencoderConfig, FeatureConfig, IsolationConfig};
    use crate::readings::SensorReading;
    use chrono::NaiveDate;

    /// Shrunk configuration so the tests train in well under a second.
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

    #[test]
    fn untrained_system_refuses_to_predict() {
        let system = SddSystem::new(tiny_config());
        let frame = ReadingFrame::from_readings(&hourly_readings(30)).unwrap();
        let err = system.predict(&frame).unwrap_err();
        assert!(matches!(err, SddError::ModelNotReady(_)));
    }

    #[test]
    fn train_then_predict_produces_one_score_per_reading() {
        let mut system = SddSystem::new(tiny_config());
        let frame = ReadingFrame::from_readings(&hourly_readings(48)).unwrap();
        system.train(&frame).unwrap();
        assert!(system.is_trained());

        let report = system.predict(&frame).unwrap();
        assert_eq!(report.len(), 48);
        assert!(report
            .fused_scores()
            .iter()
            .all(|s| (0.0..=100.0).contains(s)));

        // First rows lack sequence history.
        assert!(matches!(
            report.sequence_scores()[0],
            SequenceScore::InsufficientHistory
        ));
        assert!(matches!(
            report.sequence_scores()[47],
            SequenceScore::Scored { .. }
        ));
    }

    #[test]
    fn latest_reflects_the_final_reading() {
        let mut system = SddSystem::new(tiny_config());
        let frame = ReadingFrame::from_readings(&hourly_readings(48)).unwrap();
        system.train(&frame).unwrap();

        let report = system.predict(&frame).unwrap();
        let latest = report.latest().unwrap();
        assert_eq!(latest.timestamp, *frame.timestamps().last().unwrap());
        assert_eq!(latest.health_stability_score, report.fused_scores()[47]);
        assert!(latest.reconstruction_error.is_some());
    }

    #[test]
    fn prediction_serializes_with_camel_case_fields() {
        let prediction = Prediction {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 8)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            health_stability_score: 84.2,
            isolation_score: 77.0,
            lstm_score: 89.0,
            reconstruction_error: Some(0.042),
            risk_category: RiskCategory::EarlyInstability,
        };
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("\"healthStabilityScore\":84.2"));
        assert!(json.contains("\"isolationScore\":77.0"));
        assert!(json.contains("\"lstmScore\":89.0"));
        assert!(json.contains("\"reconstructionError\":0.042"));
        assert!(json.contains("\"riskCategory\":\"early_instability\""));
    }
}

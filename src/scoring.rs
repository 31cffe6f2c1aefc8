//! Score Fusion - Combine detector outputs into one stability score
//!
//! Both detector scores live on [0, 100] with 100 = most stable. The
//! fused health stability score is a fixed-weight blend (40% short
//! horizon, 60% long horizon) mapped onto four risk tiers. Weights and
//! tier boundaries come from configuration; defaults match the
//! deployed calibration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::FusionConfig;
use crate::model::SequenceScore;

/// Risk tier for a fused stability score. Boundaries are half-open on
/// the low side: 90 is Stable, 89.99 is Early Instability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// [90, 100] - within normal physiological variation.
    Stable,
    /// [70, 90) - subtle drift worth watching.
    EarlyInstability,
    /// [50, 70) - persistent deviation from baseline.
    SustainedDeterioration,
    /// [0, 50) - pronounced multi-signal decline.
    HighRiskDecline,
}

impl RiskCategory {
    /// Tier for a fused score; out-of-range inputs are clipped first.
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        if score >= 90.0 {
            RiskCategory::Stable
        } else if score >= 70.0 {
            RiskCategory::EarlyInstability
        } else if score >= 50.0 {
            RiskCategory::SustainedDeterioration
        } else {
            RiskCategory::HighRiskDecline
        }
    }

    /// Display label used in outbound payloads and alerts.
    pub fn label(&self) -> &'static str {
        match self {
            RiskCategory::Stable => "Stable",
            RiskCategory::EarlyInstability => "Early Instability",
            RiskCategory::SustainedDeterioration => "Sustained Deterioration",
            RiskCategory::HighRiskDecline => "High-Risk Decline",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weighted fusion of the two detector layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityScorer {
    config: FusionConfig,
}

impl StabilityScorer {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse one isolation score with one sequence score. Inputs are
    /// clipped to [0, 100] before weighting, so a malformed detector
    /// output cannot push the fused score out of range. The sequence
    /// sentinel contributes its neutral value of 100.
    pub fn fuse(&self, isolation_score: f64, sequence_score: &SequenceScore) -> f64 {
        let isolation = isolation_score.clamp(0.0, 100.0);
        let lstm = sequence_score.stability_score().clamp(0.0, 100.0);
        self.config.isolation_weight * isolation + self.config.lstm_weight * lstm
    }

    /// Fused score plus its risk tier.
    pub fn interpret(&self, isolation_score: f64, sequence_score: &SequenceScore) -> (f64, RiskCategory) {
        let fused = self.fuse(isolation_score, sequence_score);
        (fused, RiskCategory::from_score(fused))
    }
}

impl Default for StabilityScorer {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

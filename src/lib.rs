//! Silent Deterioration Detector
//!
//! Dual-layer anomaly detection over streaming wearable physiological
//! data (blood pressure, glucose, heart rate, activity). Temporal
//! features feed two complementary detectors:
//!
//! - an isolation forest scoring each timestamp independently (short
//!   horizon, reacts within hours), and
//! - an LSTM autoencoder scoring trailing week-long sequences against a
//!   healthy reconstruction baseline (long horizon, catches slow
//!   drift).
//!
//! The two scores fuse into a single 0-100 health stability score with
//! four risk tiers. Training happens offline on healthy-baseline data;
//! serving validates a rolling window of readings, scores it, and
//! reports the latest reading's fused score.
//!
//! ```no_run
//! use sdd_core::{ModelHandle, SensorReading};
//!
//! # fn readings() -> Vec<SensorReading> { Vec::new() }
//! # fn main() -> Result<(), sdd_core::SddError> {
//! let handle = ModelHandle::load("model.sdd")?;
//! let prediction = handle.predict_latest(&readings())?;
//! println!("{}: {:.1}", prediction.risk_category, prediction.health_stability_score);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod model;
pub mod readings;
pub mod scoring;
pub mod serving;
pub mod system;
pub mod validate;

pub use artifacts::TrainedArtifacts;
pub use config::SddConfig;
pub use error::{ArtifactError, Result, SddError, ValidationError};
pub use features::{FeatureMatrix, TemporalFeatureEngineer};
pub use model::{BaselineStatistics, IsolationForestDetector, LstmAutoencoder, SequenceScore};
pub use readings::{ReadingFrame, SensorReading};
pub use scoring::{RiskCategory, StabilityScorer};
pub use serving::ModelHandle;
pub use system::{Prediction, PredictionReport, SddSystem};
pub use validate::validate_rolling_window;

//! Central Algorithm Constants
//!
//! Single source of truth for the fixed numeric constants of the
//! detection pipeline. Tunable values live in `config.rs`; the values
//! here are part of the algorithm definition and never change per
//! deployment.

/// Epsilon guard against divide-by-zero in coefficient-of-variation,
/// score normalization and z-score denominators.
pub const EPSILON: f64 = 1e-6;

/// Exponential decay constant for the long-horizon stability score:
/// `score = 100 * exp(-max(0, z) / DECAY)`.
pub const SCORE_DECAY: f64 = 2.0;

/// Stability score emitted while insufficient history exists for the
/// sequence detector (not anomalous, not yet assessable).
pub const SENTINEL_SCORE: f64 = 100.0;

/// Fixed training seed (reproducible ensemble + weight init).
pub const TRAINING_SEED: u64 = 42;

/// Sensor channels, in matrix column order.
pub const CHANNELS: [&str; 4] = ["blood_pressure", "blood_glucose", "heart_rate", "activity"];

/// Number of raw sensor channels.
pub const CHANNEL_COUNT: usize = CHANNELS.len();

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Features Module - Temporal feature engineering
//!
//! Converts raw multi-channel readings into per-timestamp stability
//! descriptors: rolling variability statistics per channel per window,
//! plus cross-channel correlations.

pub mod engineer;
pub mod rolling;

pub use engineer::{FeatureMatrix, TemporalFeatureEngineer};

//! Pipeline Configuration
//!
//! Full configuration surface of the detection pipeline. Defaults match
//! the calibrated production values; every knob here is safe to persist
//! alongside trained artifacts.

use serde::{Deserialize, Serialize};

/// Feature engineering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Rolling window sizes in hours (1d, 7d, 14d, 30d).
    pub windows: Vec<usize>,
    /// Window for the cross-channel correlation features.
    pub correlation_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            windows: vec![24, 168, 336, 720],
            correlation_window: 168,
        }
    }
}

/// Short-horizon ensemble detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Expected fraction of anomalous points in training data.
    pub contamination: f64,
    /// Sub-sample size per tree (capped at the training set size).
    pub max_samples: usize,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.05,
            max_samples: 256,
        }
    }
}

/// Long-horizon sequence autoencoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoencoderConfig {
    /// Length of input sequences (hours; 168 = 7 days).
    pub sequence_length: usize,
    /// Latent bottleneck width.
    pub latent_dim: usize,
    /// Recurrent unit width of the outer encoder/decoder layers.
    pub lstm_units: usize,
    /// Training epochs.
    pub epochs: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Fraction of training sequences held out for validation.
    pub validation_split: f64,
    /// Initial Adam learning rate.
    pub learning_rate: f64,
    /// Dropout rate between recurrent layers (training only).
    pub dropout: f64,
    /// Early stopping: epochs without validation improvement.
    pub early_stopping_patience: usize,
    /// Plateau LR reduction: epochs without improvement before halving.
    pub lr_plateau_patience: usize,
    /// Plateau LR reduction factor.
    pub lr_reduction_factor: f64,
    /// Learning rate floor.
    pub min_learning_rate: f64,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            sequence_length: 168,
            latent_dim: 32,
            lstm_units: 64,
            epochs: 50,
            batch_size: 32,
            validation_split: 0.1,
            learning_rate: 1e-3,
            dropout: 0.2,
            early_stopping_patience: 10,
            lr_plateau_patience: 5,
            lr_reduction_factor: 0.5,
            min_learning_rate: 1e-4,
        }
    }
}

/// Score fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight of the short-horizon (isolation) score.
    pub isolation_weight: f64,
    /// Weight of the long-horizon (sequence) score.
    pub lstm_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            isolation_weight: 0.4,
            lstm_weight: 0.6,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SddConfig {
    pub features: FeatureConfig,
    pub isolation: IsolationConfig,
    pub autoencoder: AutoencoderConfig,
    pub fusion: FusionConfig,
    pub serving: ServingConfig,
}

/// Serving gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Minimum rolling-window span (hours) accepted for inference.
    pub min_window_hours: f64,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            min_window_hours: 168.0,
        }
    }
}

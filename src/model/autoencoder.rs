//! LSTM Autoencoder - Long-horizon sequence detector
//!
//! Encoder-decoder recurrent network trained to reconstruct healthy
//! baseline feature windows; the anomaly signal is reconstruction error
//! normalized against baseline error statistics.
//!
//! Architecture (mirrored encoder/decoder):
//!   Encoder: input -> LSTM(units) -> LSTM(latent, last state)
//!   Decoder: latent repeated per timestep -> LSTM(latent) ->
//!            LSTM(units) -> time-distributed dense back to input width
//!
//! Training optimizes mean-squared reconstruction error with Adam,
//! early stopping on a held-out validation split (best weights restored
//! on stop) and learning-rate halving on validation plateau. After
//! training, reconstruction errors over all training sequences are
//! summarized into [`BaselineStatistics`]; inference is meaningless
//! without that calibration, so it is part of `fit`.
//!
//! The detector is a one-way state machine: Untrained -> Trained. No
//! online updates.

use ndarray::{s, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::lstm::{
    dropout_mask, Adam, AdamState, DenseGrads, DenseLayer, LstmGrads, LstmLayer,
};
use super::percentile;
use super::scaler::StandardScaler;
use crate::config::AutoencoderConfig;
use crate::constants::{EPSILON, SCORE_DECAY, SENTINEL_SCORE, TRAINING_SEED};
use crate::error::SddError;

/// Reconstruction-error statistics over the healthy training sequences.
/// Immutable after training; persisted with the network and scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStatistics {
    pub mean_error: f64,
    pub std_error: f64,
    pub p95_error: f64,
    pub p99_error: f64,
    pub sequence_length: usize,
}

/// Per-timestamp long-horizon result. An explicit tag replaces the
/// numeric 100/0 sentinel so callers cannot mistake "not yet
/// assessable" for a genuine measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceScore {
    Scored {
        /// Stability score in [0, 100].
        score: f64,
        /// Mean-squared reconstruction error.
        reconstruction_error: f64,
    },
    /// Fewer than `sequence_length - 1` prior rows exist.
    InsufficientHistory,
}

impl SequenceScore {
    /// Numeric stability score; the sentinel maps to 100 (not
    /// anomalous, not yet assessable).
    pub fn stability_score(&self) -> f64 {
        match self {
            SequenceScore::Scored { score, .. } => *score,
            SequenceScore::InsufficientHistory => SENTINEL_SCORE,
        }
    }

    /// Reconstruction error, `None` for the sentinel.
    pub fn reconstruction_error(&self) -> Option<f64> {
        match self {
            SequenceScore::Scored {
                reconstruction_error,
                ..
            } => Some(*reconstruction_error),
            SequenceScore::InsufficientHistory => None,
        }
    }
}

// ============================================================================
// NETWORK
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AutoencoderNetwork {
    enc1: LstmLayer,
    enc2: LstmLayer,
    dec1: LstmLayer,
    dec2: LstmLayer,
    output: DenseLayer,
}

struct ForwardPass {
    reconstruction: Array2<f64>,
    cache1: super::lstm::LstmCache,
    cache2: super::lstm::LstmCache,
    cache3: super::lstm::LstmCache,
    cache4: super::lstm::LstmCache,
    d2_dropped: Array2<f64>,
    mask1: Array2<f64>,
    mask_latent: Array2<f64>,
    mask3: Array2<f64>,
    mask4: Array2<f64>,
}

struct NetworkGrads {
    enc1: LstmGrads,
    enc2: LstmGrads,
    dec1: LstmGrads,
    dec2: LstmGrads,
    output: DenseGrads,
}

impl NetworkGrads {
    fn accumulate(&mut self, other: &Self) {
        self.enc1.accumulate(&other.enc1);
        self.enc2.accumulate(&other.enc2);
        self.dec1.accumulate(&other.dec1);
        self.dec2.accumulate(&other.dec2);
        self.output.accumulate(&other.output);
    }

    fn scale(&mut self, factor: f64) {
        self.enc1.scale(factor);
        self.enc2.scale(factor);
        self.dec1.scale(factor);
        self.dec2.scale(factor);
        self.output.scale(factor);
    }
}

impl AutoencoderNetwork {
    fn new(input_dim: usize, config: &AutoencoderConfig, rng: &mut StdRng) -> Self {
        Self {
            enc1: LstmLayer::new(input_dim, config.lstm_units, rng),
            enc2: LstmLayer::new(config.lstm_units, config.latent_dim, rng),
            dec1: LstmLayer::new(config.latent_dim, config.latent_dim, rng),
            dec2: LstmLayer::new(config.latent_dim, config.lstm_units, rng),
            output: DenseLayer::new(config.lstm_units, input_dim, rng),
        }
    }

    /// Inference-mode reconstruction (no dropout).
    pub(crate) fn reconstruct(&self, sequence: &Array2<f64>) -> Array2<f64> {
        let t_len = sequence.nrows();

        let (h1, _) = self.enc1.forward(sequence);
        let (h2, _) = self.enc2.forward(&h1);
        let latent = h2.row(t_len - 1);

        let mut repeated = Array2::zeros((t_len, latent.len()));
        for mut row in repeated.rows_mut() {
            row.assign(&latent);
        }

        let (d1, _) = self.dec1.forward(&repeated);
        let (d2, _) = self.dec2.forward(&d1);
        self.output.forward(&d2)
    }

    /// Training-mode forward with inverted dropout between layers.
    fn forward_training(
        &self,
        sequence: &Array2<f64>,
        dropout: f64,
        rng: &mut StdRng,
    ) -> ForwardPass {
        let t_len = sequence.nrows();
        let latent_dim = self.enc2.hidden_dim();

        let (h1, cache1) = self.enc1.forward(sequence);
        let mask1 = dropout_mask(h1.dim(), dropout, rng);
        let h1_dropped = &h1 * &mask1;

        let (h2, cache2) = self.enc2.forward(&h1_dropped);
        let mask_latent = dropout_mask((1, latent_dim), dropout, rng);
        let latent = &h2.row(t_len - 1) * &mask_latent.row(0);

        let mut repeated = Array2::zeros((t_len, latent_dim));
        for mut row in repeated.rows_mut() {
            row.assign(&latent);
        }

        let (d1, cache3) = self.dec1.forward(&repeated);
        let mask3 = dropout_mask(d1.dim(), dropout, rng);
        let d1_dropped = &d1 * &mask3;

        let (d2, cache4) = self.dec2.forward(&d1_dropped);
        let mask4 = dropout_mask(d2.dim(), dropout, rng);
        let d2_dropped = &d2 * &mask4;

        let reconstruction = self.output.forward(&d2_dropped);

        ForwardPass {
            reconstruction,
            cache1,
            cache2,
            cache3,
            cache4,
            d2_dropped,
            mask1,
            mask_latent,
            mask3,
            mask4,
        }
    }

    /// Backpropagate the mean-squared reconstruction loss.
    fn backward(&self, sequence: &Array2<f64>, pass: &ForwardPass) -> NetworkGrads {
        let t_len = sequence.nrows();
        let count = (sequence.len()) as f64;

        // dL/d(recon) for L = mean((recon - x)^2)
        let d_recon = (&pass.reconstruction - sequence) * (2.0 / count);

        let (d_d2_dropped, g_output) = self.output.backward(&pass.d2_dropped, &d_recon);
        let d_d2 = &d_d2_dropped * &pass.mask4;

        let (d_d1_dropped, g_dec2) = self.dec2.backward(&pass.cache4, &d_d2);
        let d_d1 = &d_d1_dropped * &pass.mask3;

        let (d_repeated, g_dec1) = self.dec1.backward(&pass.cache3, &d_d1);

        // The latent vector feeds every decoder timestep.
        let d_latent = d_repeated.sum_axis(Axis(0)) * &pass.mask_latent.row(0);

        let mut d_h2 = Array2::zeros((t_len, self.enc2.hidden_dim()));
        d_h2.row_mut(t_len - 1).assign(&d_latent);

        let (d_h1_dropped, g_enc2) = self.enc2.backward(&pass.cache2, &d_h2);
        let d_h1 = &d_h1_dropped * &pass.mask1;

        let (_, g_enc1) = self.enc1.backward(&pass.cache1, &d_h1);

        NetworkGrads {
            enc1: g_enc1,
            enc2: g_enc2,
            dec1: g_dec1,
            dec2: g_dec2,
            output: g_output,
        }
    }

    /// Mean-squared reconstruction error of one sequence.
    pub(crate) fn reconstruction_error(&self, sequence: &Array2<f64>) -> f64 {
        let recon = self.reconstruct(sequence);
        let diff = &recon - sequence;
        diff.iter().map(|v| v * v).sum::<f64>() / diff.len() as f64
    }

    pub(crate) fn input_dim(&self) -> usize {
        self.enc1.input_dim()
    }
}

// ============================================================================
// OPTIMIZER STATE
// ============================================================================

struct LayerOpt {
    w_ih: AdamState<ndarray::Ix2>,
    w_hh: AdamState<ndarray::Ix2>,
    b: AdamState<ndarray::Ix1>,
}

impl LayerOpt {
    fn new(layer: &mut LstmLayer) -> Self {
        let (w_ih, w_hh, b) = layer.params_mut();
        Self {
            w_ih: AdamState::zeros(w_ih.raw_dim()),
            w_hh: AdamState::zeros(w_hh.raw_dim()),
            b: AdamState::zeros(b.raw_dim()),
        }
    }

    fn update(&mut self, adam: &Adam, layer: &mut LstmLayer, grads: &LstmGrads) {
        let (w_ih, w_hh, b) = layer.params_mut();
        adam.update(w_ih, &grads.w_ih, &mut self.w_ih);
        adam.update(w_hh, &grads.w_hh, &mut self.w_hh);
        adam.update(b, &grads.b, &mut self.b);
    }
}

struct NetworkOpt {
    enc1: LayerOpt,
    enc2: LayerOpt,
    dec1: LayerOpt,
    dec2: LayerOpt,
    dense_w: AdamState<ndarray::Ix2>,
    dense_b: AdamState<ndarray::Ix1>,
}

impl NetworkOpt {
    fn new(network: &mut AutoencoderNetwork) -> Self {
        let (dense_w, dense_b) = network.output.params_mut();
        let dense_w = AdamState::zeros(dense_w.raw_dim());
        let dense_b = AdamState::zeros(dense_b.raw_dim());
        Self {
            enc1: LayerOpt::new(&mut network.enc1),
            enc2: LayerOpt::new(&mut network.enc2),
            dec1: LayerOpt::new(&mut network.dec1),
            dec2: LayerOpt::new(&mut network.dec2),
            dense_w,
            dense_b,
        }
    }

    fn update(&mut self, adam: &Adam, network: &mut AutoencoderNetwork, grads: &NetworkGrads) {
        self.enc1.update(adam, &mut network.enc1, &grads.enc1);
        self.enc2.update(adam, &mut network.enc2, &grads.enc2);
        self.dec1.update(adam, &mut network.dec1, &grads.dec1);
        self.dec2.update(adam, &mut network.dec2, &grads.dec2);
        let (dense_w, dense_b) = network.output.params_mut();
        adam.update(dense_w, &grads.output.w, &mut self.dense_w);
        adam.update(dense_b, &grads.output.b, &mut self.dense_b);
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

/// Trained long-horizon state; immutable after fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedAutoencoder {
    pub(crate) scaler: StandardScaler,
    pub(crate) network: AutoencoderNetwork,
    pub(crate) baseline: BaselineStatistics,
}

/// Long-horizon sequence autoencoder detector.
#[derive(Debug, Clone)]
pub struct LstmAutoencoder {
    config: AutoencoderConfig,
    fitted: Option<FittedAutoencoder>,
}

impl LstmAutoencoder {
    pub fn new(config: AutoencoderConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    /// Baseline error statistics, available after training.
    pub fn baseline(&self) -> Option<&BaselineStatistics> {
        self.fitted.as_ref().map(|f| &f.baseline)
    }

    pub(crate) fn fitted_state(&self) -> Option<&FittedAutoencoder> {
        self.fitted.as_ref()
    }

    pub(crate) fn from_fitted(config: AutoencoderConfig, fitted: FittedAutoencoder) -> Self {
        Self {
            config,
            fitted: Some(fitted),
        }
    }

    /// Train on healthy-baseline features and calibrate baseline error
    /// statistics. One-way transition: a second `fit` replaces the
    /// trained state wholesale.
    pub fn fit(&mut self, features: &Array2<f64>) -> Result<(), SddError> {
        let seq_len = self.config.sequence_length;
        if features.nrows() < seq_len {
            return Err(SddError::TrainingDataTooShort {
                required: seq_len,
                actual: features.nrows(),
            });
        }

        let (scaler, scaled) = StandardScaler::fit_transform(features);
        let n_sequences = scaled.nrows() - seq_len + 1;

        log::info!(
            "autoencoder training: {} sequences of {}x{}",
            n_sequences,
            seq_len,
            scaled.ncols()
        );

        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        let mut network = AutoencoderNetwork::new(scaled.ncols(), &self.config, &mut rng);
        let mut opt = NetworkOpt::new(&mut network);
        let mut adam = Adam::new(self.config.learning_rate);

        // Held-out tail for validation (no shuffle before the split).
        let val_start = ((n_sequences as f64) * (1.0 - self.config.validation_split)) as usize;
        let val_start = val_start.min(n_sequences);
        let train_indices: Vec<usize> = (0..val_start).collect();
        let val_indices: Vec<usize> = (val_start..n_sequences).collect();

        let sequence = |idx: usize| scaled.slice(s![idx..idx + seq_len, ..]).to_owned();

        let mut best_loss = f64::INFINITY;
        let mut best_weights: Option<AutoencoderNetwork> = None;
        let mut stop_wait = 0usize;
        let mut lr_wait = 0usize;
        let mut stopped_early = false;

        for epoch in 0..self.config.epochs {
            let mut order = train_indices.clone();
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in order.chunks(self.config.batch_size.max(1)) {
                let mut batch_grads: Option<NetworkGrads> = None;
                for &idx in batch {
                    let seq = sequence(idx);
                    let pass = network.forward_training(&seq, self.config.dropout, &mut rng);

                    let diff = &pass.reconstruction - &seq;
                    epoch_loss += diff.iter().map(|v| v * v).sum::<f64>() / diff.len() as f64;

                    let grads = network.backward(&seq, &pass);
                    match batch_grads.as_mut() {
                        Some(acc) => acc.accumulate(&grads),
                        None => batch_grads = Some(grads),
                    }
                }

                if let Some(mut grads) = batch_grads {
                    grads.scale(1.0 / batch.len() as f64);
                    adam.tick();
                    opt.update(&adam, &mut network, &grads);
                }
            }
            let train_loss = epoch_loss / train_indices.len().max(1) as f64;

            // Monitor validation loss; fall back to training loss when
            // the split is empty (very small training sets).
            let monitored = if val_indices.is_empty() {
                train_loss
            } else {
                val_indices
                    .iter()
                    .map(|&idx| network.reconstruction_error(&sequence(idx)))
                    .sum::<f64>()
                    / val_indices.len() as f64
            };

            log::debug!(
                "epoch {}/{}: loss {:.6}, val loss {:.6}, lr {:.2e}",
                epoch + 1,
                self.config.epochs,
                train_loss,
                monitored,
                adam.learning_rate
            );

            if monitored < best_loss {
                best_loss = monitored;
                best_weights = Some(network.clone());
                stop_wait = 0;
                lr_wait = 0;
            } else {
                stop_wait += 1;
                lr_wait += 1;

                if lr_wait >= self.config.lr_plateau_patience {
                    let reduced = (adam.learning_rate * self.config.lr_reduction_factor)
                        .max(self.config.min_learning_rate);
                    if reduced < adam.learning_rate {
                        log::info!("plateau: reducing learning rate to {reduced:.2e}");
                        adam.learning_rate = reduced;
                    }
                    lr_wait = 0;
                }

                if stop_wait >= self.config.early_stopping_patience {
                    log::info!(
                        "early stopping at epoch {} (best monitored loss {:.6})",
                        epoch + 1,
                        best_loss
                    );
                    stopped_early = true;
                    break;
                }
            }
        }

        if stopped_early {
            if let Some(best) = best_weights {
                network = best;
            }
        }

        // Baseline calibration over every training sequence.
        let errors: Vec<f64> = (0..n_sequences)
            .map(|idx| network.reconstruction_error(&sequence(idx)))
            .collect();

        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        let var = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / errors.len() as f64;
        let baseline = BaselineStatistics {
            mean_error: mean,
            std_error: var.sqrt(),
            p95_error: percentile(&errors, 95.0),
            p99_error: percentile(&errors, 99.0),
            sequence_length: seq_len,
        };

        log::info!(
            "baseline calibrated: mean {:.6}, std {:.6}, p95 {:.6}, p99 {:.6}",
            baseline.mean_error,
            baseline.std_error,
            baseline.p95_error,
            baseline.p99_error
        );

        self.fitted = Some(FittedAutoencoder {
            scaler,
            network,
            baseline,
        });
        Ok(())
    }

    /// Score every row of a feature matrix.
    ///
    /// Rows with fewer than `sequence_length - 1` prior rows yield
    /// [`SequenceScore::InsufficientHistory`]; for the rest, the
    /// trailing sequence ending at the row is reconstructed and its
    /// error mapped through `100 * exp(-max(0, z) / 2)` against the
    /// baseline distribution.
    pub fn score(&self, features: &Array2<f64>) -> Result<Vec<SequenceScore>, SddError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(SddError::ModelNotReady("autoencoder is untrained"))?;

        let seq_len = fitted.baseline.sequence_length;
        let scaled = fitted.scaler.transform(features);

        let mut out = Vec::with_capacity(scaled.nrows());
        for t in 0..scaled.nrows() {
            if t + 1 < seq_len {
                out.push(SequenceScore::InsufficientHistory);
                continue;
            }
            let window = scaled.slice(s![t + 1 - seq_len..=t, ..]).to_owned();
            let error = fitted.network.reconstruction_error(&window);

            let z = ((error - fitted.baseline.mean_error)
                / (fitted.baseline.std_error + EPSILON))
                .max(0.0);
            let score = (100.0 * (-z / SCORE_DECAY).exp()).clamp(0.0, 100.0);

            out.push(SequenceScore::Scored {
                score,
                reconstruction_error: error,
            });
        }
        Ok(out)
    }
}

impl Default for LstmAutoencoder {
    fn default() -> Self {
        Self::new(AutoencoderConfig::default())
    }
}

//! Temporal Feature Engineer
//!
//! For each channel and each configured window: rolling standard
//! deviation, rolling range, and rolling coefficient of variation
//! (std / (mean + eps)). Cross-channel correlations (blood pressure vs.
//! glucose, heart rate vs. activity) use the full correlation window and
//! stay undefined until it fills, after which early rows backfill.
//!
//! After all columns are computed, undefined cells resolve with
//! forward-fill, backward-fill, then zero, so the output matrix is fully
//! dense with exactly one row per input reading.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::rolling::{rolling_corr, rolling_mean, rolling_range, rolling_std};
use crate::config::FeatureConfig;
use crate::constants::{CHANNELS, EPSILON};
use crate::readings::ReadingFrame;

/// Dense per-timestamp feature matrix with named columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Converts a reading frame into stability descriptors.
#[derive(Debug, Clone)]
pub struct TemporalFeatureEngineer {
    config: FeatureConfig,
}

impl TemporalFeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Number of feature columns this configuration produces.
    pub fn n_features(&self) -> usize {
        CHANNELS.len() * self.config.windows.len() * 3 + 2
    }

    /// Extract the feature matrix. Pure function of the frame and the
    /// configured windows; one output row per input row.
    pub fn extract(&self, frame: &ReadingFrame) -> FeatureMatrix {
        let n = frame.len();
        let mut columns: Vec<String> = Vec::with_capacity(self.n_features());
        let mut raw: Vec<Vec<f64>> = Vec::with_capacity(self.n_features());

        for (ch_idx, channel) in CHANNELS.iter().enumerate() {
            let series = frame.channels().column(ch_idx).to_vec();

            for &window in &self.config.windows {
                let std = rolling_std(&series, window);
                let range = rolling_range(&series, window);
                let mean = rolling_mean(&series, window);
                let cv: Vec<f64> = std
                    .iter()
                    .zip(mean.iter())
                    .map(|(&s, &m)| s / (m + EPSILON))
                    .collect();

                columns.push(format!("{channel}_std_{window}h"));
                raw.push(std);
                columns.push(format!("{channel}_range_{window}h"));
                raw.push(range);
                columns.push(format!("{channel}_cv_{window}h"));
                raw.push(cv);
            }
        }

        let w = self.config.correlation_window;
        let bp = frame.channels().column(0).to_vec();
        let glucose = frame.channels().column(1).to_vec();
        let hr = frame.channels().column(2).to_vec();
        let activity = frame.channels().column(3).to_vec();

        columns.push(format!("bp_glucose_corr_{w}h"));
        raw.push(rolling_corr(&bp, &glucose, w));
        columns.push(format!("hr_activity_corr_{w}h"));
        raw.push(rolling_corr(&hr, &activity, w));

        let mut data = Array2::<f64>::zeros((n, columns.len()));
        for (col, series) in raw.into_iter().enumerate() {
            let dense = densify(series);
            for (row, value) in dense.into_iter().enumerate() {
                data[[row, col]] = value;
            }
        }

        FeatureMatrix { columns, data }
    }
}

impl Default for TemporalFeatureEngineer {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

/// Resolve undefined cells: forward-fill, backward-fill, then zero.
fn densify(mut values: Vec<f64>) -> Vec<f64> {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }

    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }

    for v in values.iter_mut() {
        if v.is_nan() {
            *v = 0.0;
        }
    }
    values
}

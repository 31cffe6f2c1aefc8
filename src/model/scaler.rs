//! Standard Scaler
//!
//! Per-column zero-mean/unit-variance standardization. Parameters are
//! fit once on training data and reused unchanged at inference.
//! Zero-variance columns scale by 1 so constant features transform to
//! zero instead of NaN.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit scaling parameters on training data (population std).
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mean = data.sum_axis(ndarray::Axis(0)) / n;

        let mut scale = Array1::<f64>::zeros(data.ncols());
        for col in 0..data.ncols() {
            let m = mean[col];
            let var: f64 = data.column(col).iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            scale[col] = if std == 0.0 { 1.0 } else { std };
        }

        Self { mean, scale }
    }

    /// Standardize a matrix with the fitted parameters.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data.clone();
        for mut row in out.rows_mut() {
            row -= &self.mean;
            row /= &self.scale;
        }
        out
    }

    pub fn fit_transform(data: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let transformed = scaler.transform(data);
        (scaler, transformed)
    }

    /// Number of feature columns the scaler was fit on.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

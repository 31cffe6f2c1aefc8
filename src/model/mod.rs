//! Model Module - Dual-layer anomaly detectors
//!
//! - `isolation`: short-horizon ensemble detector, stateless per call
//! - `lstm` / `autoencoder`: long-horizon sequence detector with
//!   baseline calibration
//! - `scaler`: feature standardization fit once at training

pub mod autoencoder;
pub mod isolation;
pub mod lstm;
pub mod scaler;

pub use autoencoder::{BaselineStatistics, LstmAutoencoder, SequenceScore};
pub use isolation::IsolationForestDetector;
pub use scaler::StandardScaler;

/// Linear-interpolation percentile over an unsorted sample (numpy
/// `percentile` semantics). `q` in [0, 100].
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (sorted.len() - 1) as f64 * q / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::percentile;

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 95.0) - 3.85).abs() < 1e-12);
    }
}

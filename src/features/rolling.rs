//! Rolling-Window Statistics Primitives
//!
//! Trailing-window statistics with partial-window semantics: a window
//! may contain fewer than `w` samples near the start of the series and
//! still produces a value from whatever history exists (minimum 1
//! sample). Sample standard deviation is undefined below 2 samples and
//! yields NaN there; correlation requires the full window. NaN cells
//! are an intermediate state, resolved during feature densification.

/// Trailing-window mean, defined from the first sample.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |slice| {
        slice.iter().sum::<f64>() / slice.len() as f64
    })
}

/// Trailing-window sample standard deviation (ddof = 1).
///
/// NaN while fewer than 2 samples are in the window.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |slice| {
        let n = slice.len();
        if n < 2 {
            return f64::NAN;
        }
        let mean = slice.iter().sum::<f64>() / n as f64;
        let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    })
}

/// Trailing-window range (max - min), defined from the first sample.
pub fn rolling_range(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |slice| {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in slice {
            min = min.min(v);
            max = max.max(v);
        }
        max - min
    })
}

/// Trailing-window Pearson correlation between two series.
///
/// Requires the full window: NaN until `window` samples accumulate, and
/// NaN when either series is constant within the window.
pub fn rolling_corr(a: &[f64], b: &[f64], window: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let mut out = vec![f64::NAN; n];

    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        let start = i + 1 - window;
        out[i] = pearson(&a[start..=i], &b[start..=i]);
    }
    out
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

fn trailing<F: Fn(&[f64]) -> f64>(values: &[f64], window: usize, stat: F) -> Vec<f64> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let start = (i + 1).saturating_sub(window);
        out.push(stat(&values[start..=i]));
    }
    out
}

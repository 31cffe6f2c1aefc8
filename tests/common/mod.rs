//! Shared test fixtures: a wearable-data simulator and a shrunk
//! pipeline configuration that trains in well under a second.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sdd_core::config::{
    AutoencoderConfig, FeatureConfig, IsolationConfig, SddConfig, ServingConfig,
};
use sdd_core::SensorReading;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn gaussian(rng: &mut StdRng) -> f64 {
    // Box-Muller
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Hourly readings for a healthy subject: circadian baselines plus
/// gaussian sensor noise, deterministic per seed.
pub fn healthy_readings(hours: usize, seed: u64) -> Vec<SensorReading> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = start_time();

    (0..hours)
        .map(|h| {
            let phase = (h % 24) as f64 * std::f64::consts::TAU / 24.0;
            // Daytime activity peaks early afternoon, near-zero at night.
            let awake = (phase - 1.8).sin().max(0.0);

            SensorReading {
                timestamp: start + chrono::Duration::hours(h as i64),
                blood_pressure: Some(118.0 + 6.0 * awake + 2.0 * gaussian(&mut rng)),
                blood_glucose: Some(92.0 + 10.0 * awake + 4.0 * gaussian(&mut rng)),
                heart_rate: Some(64.0 + 14.0 * awake + 2.5 * gaussian(&mut rng)),
                activity: Some((40.0 + 260.0 * awake + 25.0 * gaussian(&mut rng)).max(0.0)),
            }
        })
        .collect()
}

/// Overlay a gradual deterioration starting at `onset_hour`: blood
/// pressure, glucose and resting heart rate drift upward while activity
/// collapses, each ramping linearly to full severity over `ramp_hours`.
pub fn inject_deterioration(readings: &mut [SensorReading], onset_hour: usize, ramp_hours: usize) {
    for (h, reading) in readings.iter_mut().enumerate() {
        if h < onset_hour {
            continue;
        }
        let severity = ((h - onset_hour) as f64 / ramp_hours.max(1) as f64).min(1.0);

        if let Some(bp) = reading.blood_pressure.as_mut() {
            *bp += 25.0 * severity;
        }
        if let Some(glucose) = reading.blood_glucose.as_mut() {
            *glucose += 45.0 * severity;
        }
        if let Some(hr) = reading.heart_rate.as_mut() {
            *hr += 20.0 * severity;
        }
        if let Some(activity) = reading.activity.as_mut() {
            *activity *= 1.0 - 0.7 * severity;
        }
    }
}

/// Shrunk configuration for fast integration tests: short windows, a
/// small forest, and a one-day autoencoder sequence.
pub fn tiny_config() -> SddConfig {
    SddConfig {
        features: FeatureConfig {
            windows: vec![6, 24],
            correlation_window: 24,
        },
        isolation: IsolationConfig {
            n_estimators: 30,
            contamination: 0.05,
            max_samples: 64,
        },
        autoencoder: AutoencoderConfig {
            sequence_length: 24,
            latent_dim: 4,
            lstm_units: 6,
            epochs: 5,
            batch_size: 16,
            dropout: 0.0,
            ..AutoencoderConfig::default()
        },
        serving: ServingConfig {
            min_window_hours: 48.0,
        },
        ..SddConfig::default()
    }
}

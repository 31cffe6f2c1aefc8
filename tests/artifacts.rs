//! Artifact persistence tests: save/load round-trips, corruption
//! detection, and load-time shape validation.

mod common;

use common::{healthy_readings, tiny_config};
use sdd_core::{ArtifactError, ReadingFrame, SddSystem, TrainedArtifacts};

fn trained_system() -> SddSystem {
    common::init_logging();
    let frame = ReadingFrame::from_readings(&healthy_readings(120, 7)).unwrap();
    let mut system = SddSystem::new(tiny_config());
    system.train(&frame).unwrap();
    system
}

#[test]
fn save_load_round_trip_preserves_scores() {
    let system = trained_system();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.sdd");

    system.save_artifacts(&path).unwrap();
    let loaded = SddSystem::load_artifacts(&path).unwrap();
    assert!(loaded.is_trained());

    let frame = ReadingFrame::from_readings(&healthy_readings(72, 19)).unwrap();
    let original = system.predict(&frame).unwrap();
    let restored = loaded.predict(&frame).unwrap();

    for (a, b) in original
        .fused_scores()
        .iter()
        .zip(restored.fused_scores().iter())
    {
        assert!((a - b).abs() < 1e-9, "scores diverged: {a} vs {b}");
    }
    assert_eq!(original.categories(), restored.categories());
}

#[test]
fn baseline_statistics_survive_the_round_trip() {
    let system = trained_system();
    let artifacts = TrainedArtifacts::from_system(&system).unwrap();
    let bytes = artifacts.to_bytes().unwrap();
    let restored = TrainedArtifacts::from_bytes(&bytes).unwrap();

    let loaded = restored.into_system().unwrap();
    assert_eq!(
        loaded.config().autoencoder.sequence_length,
        system.config().autoencoder.sequence_length
    );
    assert_eq!(
        loaded.baseline_statistics().unwrap(),
        system.baseline_statistics().unwrap()
    );
}

#[test]
fn corrupted_artifact_fails_the_checksum() {
    let system = trained_system();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.sdd");
    system.save_artifacts(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x08;
    std::fs::write(&path, &bytes).unwrap();

    let err = SddSystem::load_artifacts(&path).unwrap_err();
    assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));
}

#[test]
fn truncated_artifact_is_rejected() {
    let system = trained_system();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.sdd");
    system.save_artifacts(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 3]).unwrap();

    let err = SddSystem::load_artifacts(&path).unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::ChecksumMismatch { .. } | ArtifactError::Incomplete(_)
    ));
}

#[test]
fn mismatched_feature_config_is_rejected_at_load() {
    let system = trained_system();
    let mut artifacts = TrainedArtifacts::from_system(&system).unwrap();

    // An extra window changes the feature width the engineer produces.
    artifacts.config.features.windows.push(48);

    let err = artifacts.into_system().unwrap_err();
    assert!(matches!(err, ArtifactError::ShapeMismatch(_)));
}

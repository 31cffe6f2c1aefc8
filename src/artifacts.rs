//! Trained Artifacts - Persistence with integrity checking
//!
//! A trained system serializes to a single JSON document (config, both
//! fitted detectors, baseline statistics) followed by a 4-byte
//! little-endian CRC32 trailer over the JSON bytes. Loading verifies
//! the trailer before parsing and validates cross-component shapes
//! before constructing a system, so a corrupt or mismatched artifact
//! fails fast at startup instead of producing silent garbage scores.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SddConfig;
use crate::constants::VERSION;
use crate::error::ArtifactError;
use crate::features::TemporalFeatureEngineer;
use crate::model::autoencoder::FittedAutoencoder;
use crate::model::isolation::FittedForest;
use crate::model::{IsolationForestDetector, LstmAutoencoder};
use crate::system::SddSystem;

const CHECKSUM_LEN: usize = 4;

/// Everything needed to reconstruct a trained system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifacts {
    /// Library version that produced the artifact.
    pub version: String,
    pub config: SddConfig,
    pub isolation: FittedForest,
    pub autoencoder: FittedAutoencoder,
}

impl TrainedArtifacts {
    /// Capture the fitted state of a trained system.
    pub fn from_system(system: &SddSystem) -> Result<Self, ArtifactError> {
        let isolation = system
            .isolation()
            .fitted_state()
            .ok_or(ArtifactError::Incomplete("isolation forest is untrained"))?
            .clone();
        let autoencoder = system
            .autoencoder()
            .fitted_state()
            .ok_or(ArtifactError::Incomplete("autoencoder is untrained"))?
            .clone();

        Ok(Self {
            version: VERSION.to_string(),
            config: system.config().clone(),
            isolation,
            autoencoder,
        })
    }

    /// Validated factory: checks cross-component shape agreement before
    /// handing out a working system.
    pub fn into_system(self) -> Result<SddSystem, ArtifactError> {
        if self.version != VERSION {
            log::warn!(
                "artifact produced by version {}, running {}",
                self.version,
                VERSION
            );
        }

        let expected = TemporalFeatureEngineer::new(self.config.features.clone()).n_features();
        if self.isolation.n_features() != expected {
            return Err(ArtifactError::ShapeMismatch(format!(
                "isolation forest expects {} features, configuration produces {}",
                self.isolation.n_features(),
                expected
            )));
        }
        if self.autoencoder.network.input_dim() != expected {
            return Err(ArtifactError::ShapeMismatch(format!(
                "autoencoder expects {} features, configuration produces {}",
                self.autoencoder.network.input_dim(),
                expected
            )));
        }
        if self.autoencoder.baseline.sequence_length != self.config.autoencoder.sequence_length {
            return Err(ArtifactError::ShapeMismatch(format!(
                "baseline calibrated for sequence length {}, configuration says {}",
                self.autoencoder.baseline.sequence_length,
                self.config.autoencoder.sequence_length
            )));
        }

        let isolation =
            IsolationForestDetector::from_fitted(self.config.isolation.clone(), self.isolation);
        let autoencoder =
            LstmAutoencoder::from_fitted(self.config.autoencoder.clone(), self.autoencoder);

        Ok(SddSystem::from_parts(self.config, isolation, autoencoder))
    }

    /// Serialize to JSON followed by the CRC32 trailer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut bytes = serde_json::to_vec(self)
            .map_err(|e| ArtifactError::Corrupt(format!("serialization failed: {e}")))?;
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Parse bytes produced by [`Self::to_bytes`], verifying the
    /// checksum first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < CHECKSUM_LEN {
            return Err(ArtifactError::Incomplete(
                "artifact shorter than its checksum trailer",
            ));
        }
        let (payload, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);

        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(ArtifactError::ChecksumMismatch { expected, actual });
        }

        serde_json::from_slice(payload)
            .map_err(|e| ArtifactError::Corrupt(format!("deserialization failed: {e}")))
    }
}

impl SddSystem {
    /// Persist the trained state to disk.
    pub fn save_artifacts<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let artifacts = TrainedArtifacts::from_system(self)?;
        let bytes = artifacts.to_bytes()?;
        fs::write(path.as_ref(), &bytes)?;
        log::info!(
            "saved artifacts to {} ({} bytes)",
            path.as_ref().display(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a trained system from disk. Any failure here is fatal to
    /// serving; callers must not fall back to an untrained system.
    pub fn load_artifacts<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(path.display().to_string())
            } else {
                ArtifactError::Io(e)
            }
        })?;

        let artifacts = TrainedArtifacts::from_bytes(&bytes)?;
        log::info!(
            "loaded artifacts from {} (version {})",
            path.display(),
            artifacts.version
        );
        artifacts.into_system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SddConfig;

    #[test]
    fn untrained_system_cannot_be_captured() {
        let system = SddSystem::new(SddConfig::default());
        let err = TrainedArtifacts::from_system(&system).unwrap_err();
        assert!(matches!(err, ArtifactError::Incomplete(_)));
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let err = TrainedArtifacts::from_bytes(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, ArtifactError::Incomplete(_)));
    }

    #[test]
    fn flipped_bit_fails_the_checksum() {
        // Hand-build a payload with a valid trailer, then corrupt it.
        let payload = b"{\"not\":\"an artifact\"}".to_vec();
        let mut bytes = payload.clone();
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        let mut corrupted = bytes.clone();
        corrupted[3] ^= 0x40;
        let err = TrainedArtifacts::from_bytes(&corrupted).unwrap_err();
        assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));

        // Intact checksum but wrong schema parses the trailer fine and
        // fails as corrupt instead.
        let err = TrainedArtifacts::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt(_)));
    }

    #[test]
    fn missing_file_reports_not_found() {
        let err = SddSystem::load_artifacts("/nonexistent/model.sdd").unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }
}

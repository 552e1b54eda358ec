//! # Cardiorisk
//!
//! Heart-disease risk scoring from thirteen routine clinical measurements.
//!
//! This crate provides:
//! - Input validation against the clinical domain of each measurement
//! - An offline trainer: synthetic augmentation, z-score scaling,
//!   gradient-boosted trees and sigmoid calibration
//! - Paired, hash-verified (optionally signed) scaler/model artifacts
//! - Inference: calibrated probability, banded rescaling and recommendations
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Feature schema, validation, rescaler, recommendations, metrics
//! - `ports`: Trait definitions for the model and the artifact store
//! - `adapters`: Scaler, boosting, calibration, artifact files, CSV datasets
//! - `application`: Augmentation, training and scoring use cases
//! - `config`, `logging`: Environment/JSON configuration and tracing setup

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;

pub use application::{AssessmentService, RiskScorer, Trainer, TrainingOutcome};
pub use domain::{FeatureRecord, PartialFeatureRecord, RiskAssessment, RiskLevel};

use adapters::{ArtifactError, DatasetError, ScalerError};
use ports::ModelError;

/// Result type for Cardiorisk operations
pub type Result<T> = std::result::Result<T, CardioError>;

/// Main error type for Cardiorisk
#[derive(Debug, thiserror::Error)]
pub enum CardioError {
    #[error("Invalid input for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("Artifact not available: {which}")]
    ArtifactMissing { which: String },

    #[error("Cannot transform input: {detail}")]
    TransformError { detail: String },

    #[error("Model error: {detail}")]
    ModelError { detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Artifact integrity check failed: {0}")]
    Integrity(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<domain::ValidationError> for CardioError {
    fn from(e: domain::ValidationError) -> Self {
        Self::ValidationFailed {
            field: e.feature().name().to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<ScalerError> for CardioError {
    fn from(e: ScalerError) -> Self {
        match e {
            ScalerError::EmptyMatrix | ScalerError::NonFinite { .. } => Self::ModelError {
                detail: e.to_string(),
            },
            _ => Self::TransformError {
                detail: e.to_string(),
            },
        }
    }
}

impl From<ModelError> for CardioError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::UnsupportedVersion(_)
            | ModelError::FeatureOrder { .. }
            | ModelError::Malformed(_) => {
                Self::TransformError {
                    detail: e.to_string(),
                }
            }
            _ => Self::ModelError {
                detail: e.to_string(),
            },
        }
    }
}

impl From<ArtifactError> for CardioError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::Missing { which } => Self::ArtifactMissing { which },
            ArtifactError::Pairing(_) | ArtifactError::Layout(_) => Self::TransformError {
                detail: e.to_string(),
            },
            ArtifactError::Io { source, .. } => Self::Io(source),
            ArtifactError::Serialization(msg) => Self::Serialization(msg),
            ArtifactError::HashMismatch { .. } | ArtifactError::Signature(_) => {
                Self::Integrity(e.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for CardioError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feature, ValidationError};

    #[test]
    fn test_validation_error_keeps_field_name() {
        let err: CardioError = ValidationError::InvalidCategory {
            feature: Feature::Cp,
        }
        .into();
        match err {
            CardioError::ValidationFailed { field, reason } => {
                assert_eq!(field, "cp");
                assert_eq!(reason, "Invalid value for Cp");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_artifact_errors_map_to_taxonomy() {
        let missing: CardioError = ArtifactError::Missing {
            which: "model.bin".into(),
        }
        .into();
        assert!(matches!(missing, CardioError::ArtifactMissing { which } if which == "model.bin"));

        let pairing: CardioError = ArtifactError::Pairing("different runs".into()).into();
        assert!(matches!(pairing, CardioError::TransformError { .. }));

        let tampered: CardioError = ArtifactError::HashMismatch {
            file: "scaler.bin".into(),
        }
        .into();
        assert!(matches!(tampered, CardioError::Integrity(_)));
    }

    #[test]
    fn test_model_errors_map_to_taxonomy() {
        let nan: CardioError = ModelError::NonFinite("NaN".into()).into();
        assert!(matches!(nan, CardioError::ModelError { .. }));
        let malformed: CardioError = ModelError::Malformed("tree 0".into()).into();
        assert!(matches!(malformed, CardioError::TransformError { .. }));
        let order: CardioError = ScalerError::FeatureOrder {
            position: 0,
            found: "sex".into(),
            expected: "age".into(),
        }
        .into();
        assert!(matches!(order, CardioError::TransformError { .. }));
    }
}

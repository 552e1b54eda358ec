//! Input validation against declared feature domains.
//!
//! Checks run in [`Feature::ALL`] order, so the first reported violation is
//! deterministic for a given input. Absent fields of a partial record are skipped.

use serde::{Deserialize, Serialize};

use super::features::{Feature, FeatureDomain, FeatureRecord, PartialFeatureRecord};

/// Why a feature value was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{feature} must be between {min} and {max}")]
    OutOfRange {
        feature: Feature,
        min: String,
        max: String,
    },

    #[error("Invalid value for {feature}")]
    InvalidCategory { feature: Feature },

    #[error("{feature} is required")]
    Missing { feature: Feature },
}

impl ValidationError {
    /// The offending feature.
    #[must_use]
    pub fn feature(&self) -> Feature {
        match self {
            Self::OutOfRange { feature, .. }
            | Self::InvalidCategory { feature }
            | Self::Missing { feature } => *feature,
        }
    }
}

/// Outcome of validating a record, in the form presentation layers display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
}

impl ValidationReport {
    const OK_MESSAGE: &'static str = "All inputs are valid";

    fn from_result(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                message: Self::OK_MESSAGE.to_string(),
            },
            Err(e) => Self {
                valid: false,
                message: e.to_string(),
            },
        }
    }
}

/// Check a single raw value against its feature's domain.
///
/// # Errors
/// `OutOfRange` for numeric features, `InvalidCategory` for categorical ones.
pub fn check_value(feature: Feature, value: f64) -> Result<(), ValidationError> {
    let domain = feature.domain();
    if domain.contains(value) {
        return Ok(());
    }
    match domain {
        FeatureDomain::Categorical(_) => Err(ValidationError::InvalidCategory { feature }),
        FeatureDomain::Integer { .. } | FeatureDomain::Real { .. } => {
            let (min, max) = domain.bounds_display().unwrap_or_default();
            Err(ValidationError::OutOfRange { feature, min, max })
        }
    }
}

/// Validate a possibly incomplete record.
///
/// Absent fields are not checked.
#[must_use]
pub fn validate(record: &PartialFeatureRecord) -> ValidationReport {
    let first = Feature::ALL
        .into_iter()
        .filter_map(|f| record.value(f).map(|v| (f, v)))
        .try_for_each(|(f, v)| check_value(f, v));
    ValidationReport::from_result(first)
}

impl FeatureRecord {
    /// Validate every field, stopping at the first violation.
    ///
    /// # Errors
    /// Returns the first violation in feature order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Feature::ALL
            .into_iter()
            .try_for_each(|f| check_value(f, self.value(f)))
    }

    /// Every violation in feature order (empty when valid).
    #[must_use]
    pub fn violations(&self) -> Vec<ValidationError> {
        Feature::ALL
            .into_iter()
            .filter_map(|f| check_value(f, self.value(f)).err())
            .collect()
    }
}

impl PartialFeatureRecord {
    /// Validate present fields and require all of them to be present.
    ///
    /// # Errors
    /// A domain violation on a present field takes precedence over a missing one.
    pub fn validate_complete(&self) -> Result<FeatureRecord, ValidationError> {
        Feature::ALL
            .into_iter()
            .filter_map(|f| self.value(f).map(|v| (f, v)))
            .try_for_each(|(f, v)| check_value(f, v))?;
        self.complete()
            .map_err(|feature| ValidationError::Missing { feature })
    }
}

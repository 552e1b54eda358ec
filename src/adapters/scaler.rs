//! Z-score feature scaler.
//!
//! Fit on the training partition only, then persisted next to the model it
//! was fit alongside. `transform` refuses artifacts whose feature order or
//! arity differ from [`Feature::ALL`].

use serde::{Deserialize, Serialize};

use crate::domain::{Feature, FeatureRecord, FEATURE_COUNT};

/// Bumped whenever the serialized layout changes.
pub const SCALER_FORMAT_VERSION: u32 = 1;

/// Errors raised while fitting or applying the scaler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit scaler on an empty matrix")]
    EmptyMatrix,

    #[error("Non-finite value in column {column} of the training matrix")]
    NonFinite { column: String },

    #[error("Unsupported scaler format version {0}")]
    UnsupportedVersion(u32),

    #[error("Scaler arity mismatch: {names} names, {means} means, {std_devs} std devs (expected {expected})")]
    Arity {
        names: usize,
        means: usize,
        std_devs: usize,
        expected: usize,
    },

    #[error("Scaler feature order mismatch at position {position}: artifact has {found:?}, model expects {expected:?}")]
    FeatureOrder {
        position: usize,
        found: String,
        expected: String,
    },

    #[error("Degenerate std dev {value} for feature {feature}")]
    DegenerateStdDev { feature: String, value: f64 },
}

/// Fitted per-feature standardization statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub format_version: u32,
    /// Column names in the order the statistics were computed
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    /// Population standard deviation; zero-variance columns are stored as 1.0
    pub std_dev: Vec<f64>,
    /// Fingerprint shared with the paired model artifact
    pub pairing_id: String,
}

impl ScalerArtifact {
    /// Fit mean and population standard deviation per column.
    ///
    /// A zero-variance column gets a unit scale so it maps to 0 instead of
    /// dividing by zero.
    ///
    /// # Errors
    /// Returns error on an empty matrix or non-finite values.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Result<Self, ScalerError> {
        if rows.is_empty() {
            return Err(ScalerError::EmptyMatrix);
        }
        let n = rows.len() as f64;

        let mut mean = vec![0.0; FEATURE_COUNT];
        let mut std_dev = vec![0.0; FEATURE_COUNT];

        for feature in Feature::ALL {
            let j = feature.index();
            if rows.iter().any(|r| !r[j].is_finite()) {
                return Err(ScalerError::NonFinite {
                    column: feature.name().to_string(),
                });
            }

            let m = rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[j] - m).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();

            mean[j] = m;
            std_dev[j] = if sd > f64::EPSILON {
                sd
            } else {
                tracing::warn!("Feature {} has zero variance; using unit scale", feature.name());
                1.0
            };
        }

        Ok(Self {
            format_version: SCALER_FORMAT_VERSION,
            feature_names: Feature::ordered_names(),
            mean,
            std_dev,
            pairing_id: String::new(),
        })
    }

    /// Check that this artifact matches the compiled-in feature order.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn verify_layout(&self) -> Result<(), ScalerError> {
        if self.format_version != SCALER_FORMAT_VERSION {
            return Err(ScalerError::UnsupportedVersion(self.format_version));
        }
        if self.feature_names.len() != FEATURE_COUNT
            || self.mean.len() != FEATURE_COUNT
            || self.std_dev.len() != FEATURE_COUNT
        {
            return Err(ScalerError::Arity {
                names: self.feature_names.len(),
                means: self.mean.len(),
                std_devs: self.std_dev.len(),
                expected: FEATURE_COUNT,
            });
        }
        for (position, (found, feature)) in self.feature_names.iter().zip(Feature::ALL).enumerate() {
            if found != feature.name() {
                return Err(ScalerError::FeatureOrder {
                    position,
                    found: found.clone(),
                    expected: feature.name().to_string(),
                });
            }
        }
        for (name, &sd) in self.feature_names.iter().zip(&self.std_dev) {
            if !sd.is_finite() || sd <= 0.0 {
                return Err(ScalerError::DegenerateStdDev {
                    feature: name.clone(),
                    value: sd,
                });
            }
        }
        Ok(())
    }

    /// Standardize a raw vector already in [`Feature::ALL`] order.
    ///
    /// # Errors
    /// Returns error if the artifact layout is inconsistent.
    pub fn transform_vector(
        &self,
        raw: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; FEATURE_COUNT], ScalerError> {
        self.verify_layout()?;
        let mut out = [0.0; FEATURE_COUNT];
        for (j, x) in raw.iter().enumerate() {
            out[j] = (x - self.mean[j]) / self.std_dev[j];
        }
        Ok(out)
    }

    /// Standardize a validated feature record.
    ///
    /// # Errors
    /// Returns error if the artifact layout is inconsistent.
    pub fn transform(&self, record: &FeatureRecord) -> Result<[f64; FEATURE_COUNT], ScalerError> {
        self.transform_vector(&record.to_vector())
    }
}

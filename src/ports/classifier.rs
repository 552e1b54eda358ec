//! Classifier port: Trait for calibrated probability models.
//!
//! The scorer only needs a probability for a scaled feature vector and the
//! feature order the model was fit with; the gradient-boosted implementation
//! lives in `adapters`.

use crate::domain::FEATURE_COUNT;

/// Errors raised while fitting or querying a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Training data is empty")]
    EmptyTrainingSet,

    #[error("Training data has {features} rows but {labels} labels")]
    LabelCount { features: usize, labels: usize },

    #[error("Label {0} is not binary")]
    NonBinaryLabel(u8),

    #[error("Class {class} has {count} samples, need at least {needed}")]
    TooFewSamples {
        class: u8,
        count: usize,
        needed: usize,
    },

    #[error("Invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error("Non-finite model output: {0}")]
    NonFinite(String),

    #[error("Model has no calibrated members")]
    Empty,

    #[error("Malformed model: {0}")]
    Malformed(String),

    #[error("Unsupported model format version {0}")]
    UnsupportedVersion(u32),

    #[error("Model feature order {found:?} does not match expected {expected:?}")]
    FeatureOrder {
        found: Vec<String>,
        expected: Vec<String>,
    },
}

/// A binary classifier producing calibrated `P(label = 1)`.
pub trait ProbabilityModel: Send + Sync {
    /// Feature names in the order the model expects its input.
    fn feature_names(&self) -> &[String];

    /// Fingerprint of the scaler this model was trained against.
    fn pairing_id(&self) -> &str;

    /// Probability of the positive class for a standardized feature vector.
    ///
    /// # Errors
    /// Returns `ModelError::NonFinite` if the computation is numerically unstable.
    fn predict_proba(&self, scaled: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError>;
}

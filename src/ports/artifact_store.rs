//! Artifact store port: Trait for persisting the scaler/model pair.
//!
//! The two artifacts are always saved and loaded together; a store never
//! hands out one without the other.

use crate::domain::EvaluationMetrics;

/// Scaler and model fit in the same training run.
#[derive(Debug, Clone)]
pub struct ArtifactBundle<S, M> {
    pub scaler: S,
    pub model: M,
    /// Held-out metrics from training, if recorded
    pub metrics: Option<EvaluationMetrics>,
}

/// Trait for artifact persistence.
pub trait ArtifactStore: Send + Sync {
    /// Fitted feature scaler type.
    type Scaler;

    /// Fitted model type.
    type Model;

    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist both artifacts and their manifest.
    ///
    /// # Errors
    /// Returns error if any artifact cannot be written.
    fn save(&self, bundle: &ArtifactBundle<Self::Scaler, Self::Model>) -> Result<(), Self::Error>;

    /// Load and verify both artifacts.
    ///
    /// # Errors
    /// Returns error if an artifact is missing, corrupt or unpaired.
    fn load(&self) -> Result<ArtifactBundle<Self::Scaler, Self::Model>, Self::Error>;

    /// Whether a complete artifact set is present.
    fn exists(&self) -> bool;
}

//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O: the feature schema, input validation, the
//! clinical rescaler and the recommendation engine.

mod assessment;
mod evaluation;
mod features;
pub mod recommendation;
pub mod rescale;
mod validation;

pub use assessment::{Recommendation, RecommendationKind, RiskAssessment, RiskLevel};
pub use evaluation::{accuracy, brier_score, roc_auc, ClassMetrics, EvaluationMetrics};
pub use features::{
    reference, Feature, FeatureDomain, FeatureRecord, LabeledRecord, PartialFeatureRecord,
    FEATURE_COUNT,
};
pub use recommendation::recommend;
pub use rescale::rescale;
pub use validation::{check_value, validate, ValidationError, ValidationReport};

//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases: offline training and online risk assessment.

mod augment;
mod scoring;
mod training;

pub use augment::DataAugmentor;
pub use scoring::{AssessmentService, RiskScorer};
pub use training::{stratified_split, ReferenceScore, Trainer, TrainingOutcome};

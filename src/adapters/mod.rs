//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the numeric and I/O machinery:
//! - `scaler`: z-score standardization fit on the training partition
//! - `boosting`: gradient-boosted regression trees (logistic objective)
//! - `calibration`: Platt sigmoid calibration over cross-validated boosters
//! - `artifacts`: filesystem store with SHA-256 manifest and Ed25519 signature
//! - `dataset`: CSV loader for labeled training data

pub mod artifacts;
pub mod boosting;
pub mod calibration;
pub mod dataset;
pub mod scaler;

pub use artifacts::{ArtifactError, FsArtifactStore, ModelBundle};
pub use boosting::{BoosterParams, GradientBoostedTrees};
pub use calibration::{CalibratedModel, PlattScaling};
pub use dataset::DatasetError;
pub use scaler::{ScalerArtifact, ScalerError};

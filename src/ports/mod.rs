//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and its model and persistence backends.

mod artifact_store;
mod classifier;

pub use artifact_store::{ArtifactBundle, ArtifactStore};
pub use classifier::{ModelError, ProbabilityModel};

//! Runtime and training configuration.
//!
//! Runtime settings come from `CARDIORISK_*` environment variables; training
//! settings from an optional JSON file with defaults for every field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapters::BoosterParams;
use crate::CardioError;

pub const ARTIFACT_DIR_ENV: &str = "CARDIORISK_ARTIFACT_DIR";
pub const REQUIRE_SIGNED_ENV: &str = "CARDIORISK_REQUIRE_SIGNED_ARTIFACTS";
pub const PUBKEY_FILE_ENV: &str = "CARDIORISK_ARTIFACT_PUBKEY_B64_FILE";
pub const LOG_MODE_ENV: &str = "CARDIORISK_LOG_MODE";
pub const LOG_FILE_ENV: &str = "CARDIORISK_LOG_FILE";

const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
const DEFAULT_LOG_FILE: &str = "cardiorisk.log";

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// stderr, so stdout stays clean for command output
    Auto,
    File,
    Stdout,
}

impl LogMode {
    fn parse(v: &str) -> Self {
        match v.trim() {
            "file" => Self::File,
            "stdout" => Self::Stdout,
            _ => Self::Auto,
        }
    }
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub artifact_dir: PathBuf,
    pub require_signed_artifacts: bool,
    /// File holding the base64 Ed25519 verifying key
    pub pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            require_signed_artifacts: false,
            pubkey_file: None,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl RuntimeConfig {
    /// Read every `CARDIORISK_*` variable, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            artifact_dir: non_empty(ARTIFACT_DIR_ENV).map_or(defaults.artifact_dir, PathBuf::from),
            require_signed_artifacts: get(REQUIRE_SIGNED_ENV).is_some_and(|v| parse_bool(&v)),
            pubkey_file: non_empty(PUBKEY_FILE_ENV).map(PathBuf::from),
            log_mode: get(LOG_MODE_ENV).map_or(LogMode::Auto, |v| LogMode::parse(&v)),
            log_file: non_empty(LOG_FILE_ENV).map_or(defaults.log_file, PathBuf::from),
        }
    }
}

/// Settings for one offline training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seeds augmentation, the split and every booster
    pub seed: u64,
    pub test_fraction: f64,
    /// Synthetic records generated per risk tier
    pub synthetic_per_tier: usize,
    pub calibration_folds: usize,
    pub booster: BoosterParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            synthetic_per_tier: 50,
            calibration_folds: 5,
            booster: BoosterParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Load from a JSON file; absent fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or holds invalid values.
    pub fn from_json_file(path: &Path) -> Result<Self, CardioError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| CardioError::Config(format!("Invalid training config {path:?}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot produce a model.
    ///
    /// # Errors
    /// Returns `CardioError::Config` naming the bad setting.
    pub fn validate(&self) -> Result<(), CardioError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CardioError::Config("test_fraction must be in (0, 1)".into()));
        }
        if self.calibration_folds < 2 {
            return Err(CardioError::Config("calibration_folds must be >= 2".into()));
        }
        self.booster
            .validate()
            .map_err(|e| CardioError::Config(e.to_string()))
    }
}

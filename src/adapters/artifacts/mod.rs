//! Filesystem artifact store: Implementation of ArtifactStore.
//!
//! Layout of an artifact directory:
//!
//! - `scaler.bin`: bincode-encoded [`ScalerArtifact`]
//! - `model.bin`: bincode-encoded [`CalibratedModel`]
//! - `manifest.json`: SHA-256 of both files, pairing id, feature order, metrics
//! - `artifacts.sig` (optional): Ed25519 signature over the exact manifest bytes
//!
//! # Security
//!
//! - Every file named in the manifest is re-hashed on load
//! - Scaler and model must carry the same pairing fingerprint, and that
//!   fingerprint must match their contents
//! - With `require_signature` set, an unsigned directory is refused

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CalibratedModel, ScalerArtifact};
use crate::config::RuntimeConfig;
use crate::domain::EvaluationMetrics;
use crate::ports::{ArtifactBundle, ArtifactStore};

pub const SCALER_FILE: &str = "scaler.bin";
pub const MODEL_FILE: &str = "model.bin";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "artifacts.sig";

const MANIFEST_VERSION: u32 = 1;

/// The scaler/model pair this store persists.
pub type ModelBundle = ArtifactBundle<ScalerArtifact, CalibratedModel>;
const PAIRING_DOMAIN: &[u8] = b"cardiorisk-pairing-v1";

/// Error type for artifact operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {which}")]
    Missing { which: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("File hash mismatch for {file}")]
    HashMismatch { file: String },

    #[error("Signature check failed: {0}")]
    Signature(String),

    #[error("Scaler and model are not paired: {0}")]
    Pairing(String),

    #[error("Incompatible artifact layout: {0}")]
    Layout(String),
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub pairing_id: String,
    pub created_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    /// File name to lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: Option<EvaluationMetrics>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex_bytes(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Fingerprint binding a scaler to the model trained on its output.
///
/// Covers the scaler statistics and every model member; the pairing ids
/// stored in the artifacts themselves are excluded.
///
/// # Errors
/// Returns error if the model cannot be serialized.
pub fn pairing_fingerprint(
    scaler: &ScalerArtifact,
    model: &CalibratedModel,
) -> Result<String, ArtifactError> {
    let mut hasher = Sha256::new();
    hasher.update(PAIRING_DOMAIN);
    for name in &scaler.feature_names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    for v in scaler.mean.iter().chain(&scaler.std_dev) {
        hasher.update(v.to_le_bytes());
    }
    let members = bincode::serialize(&model.members)
        .map_err(|e| ArtifactError::Serialization(format!("Failed to encode model: {e}")))?;
    hasher.update(&members);
    Ok(to_hex(&hasher.finalize()))
}

/// Compute the pairing fingerprint and write it into both artifacts.
///
/// # Errors
/// Returns error if the model cannot be serialized.
pub fn stamp_pairing(
    scaler: &mut ScalerArtifact,
    model: &mut CalibratedModel,
) -> Result<String, ArtifactError> {
    let id = pairing_fingerprint(scaler, model)?;
    scaler.pairing_id = id.clone();
    model.pairing_id = id.clone();
    Ok(id)
}

/// Check that both artifacts carry the same, correct pairing fingerprint.
///
/// # Errors
/// Returns `ArtifactError::Pairing` on any mismatch.
pub fn verify_pairing(scaler: &ScalerArtifact, model: &CalibratedModel) -> Result<(), ArtifactError> {
    if scaler.pairing_id.is_empty() || model.pairing_id.is_empty() {
        return Err(ArtifactError::Pairing("artifact has no pairing id".into()));
    }
    if !constant_time_eq_str(&scaler.pairing_id, &model.pairing_id) {
        return Err(ArtifactError::Pairing(
            "scaler and model were produced by different training runs".into(),
        ));
    }
    let expected = pairing_fingerprint(scaler, model)?;
    if !constant_time_eq_str(&expected, &scaler.pairing_id) {
        return Err(ArtifactError::Pairing(
            "pairing id does not match artifact contents".into(),
        ));
    }
    Ok(())
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns error on bad base64 or a key that is not 32 valid bytes.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("Invalid public key base64".into()))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("Invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&pubkey)
        .map_err(|_| ArtifactError::Signature("Invalid verifying key".into()))
}

/// Sign `manifest.json` in `dir`, writing `artifacts.sig` next to it.
///
/// # Errors
/// Returns error if the manifest cannot be read or the signature written.
pub fn sign_manifest(dir: &Path, signing_key: &SigningKey) -> Result<PathBuf, ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(ArtifactError::Missing {
            which: MANIFEST_FILE.into(),
        });
    }
    let manifest_bytes = fs::read(&manifest_path).map_err(io_err(&manifest_path))?;
    let signature: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, signature.to_bytes()).map_err(io_err(&sig_path))?;
    tracing::info!("Wrote artifact signature to {:?}", sig_path);
    Ok(sig_path)
}

/// Artifact store backed by a directory.
pub struct FsArtifactStore {
    dir: PathBuf,
    verifying_key: Option<VerifyingKey>,
    require_signature: bool,
}

impl FsArtifactStore {
    /// Create a store rooted at `dir`. Signatures are checked only if a key is set.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            verifying_key: None,
            require_signature: false,
        }
    }

    /// Build a store from runtime settings, loading the verifying key file if set.
    ///
    /// # Errors
    /// Returns error if the key file cannot be read or decoded.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ArtifactError> {
        let mut store = Self::new(config.artifact_dir.clone())
            .require_signature(config.require_signed_artifacts);
        if let Some(path) = &config.pubkey_file {
            let b64 = fs::read_to_string(path).map_err(io_err(path))?;
            store = store.with_verifying_key(verifying_key_from_b64(&b64)?);
        }
        Ok(store)
    }

    /// Verify `artifacts.sig` against this key when present.
    #[must_use]
    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Refuse to load a directory without a valid signature.
    #[must_use]
    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Directory this store reads and writes.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_required(&self, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(ArtifactError::Missing { which: name.into() });
        }
        fs::read(&path).map_err(io_err(&path))
    }

    fn verify_signature(&self, manifest_bytes: &[u8]) -> Result<(), ArtifactError> {
        let sig_path = self.dir.join(SIGNATURE_FILE);
        if !sig_path.exists() {
            if self.require_signature {
                tracing::error!("Artifact signature not found at {:?}", sig_path);
                return Err(ArtifactError::Signature(format!(
                    "{SIGNATURE_FILE} required but not present"
                )));
            }
            tracing::debug!("Loading unsigned artifacts from {:?}", self.dir);
            return Ok(());
        }

        let Some(key) = self.verifying_key.as_ref() else {
            if self.require_signature {
                return Err(ArtifactError::Signature(
                    "signature required but no verifying key configured".into(),
                ));
            }
            tracing::warn!("{SIGNATURE_FILE} present but no verifying key configured; skipping check");
            return Ok(());
        };

        let sig_bytes = fs::read(&sig_path).map_err(io_err(&sig_path))?;
        let sig: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ArtifactError::Signature("Invalid signature length (expected 64 bytes)".into()))?;
        key.verify(manifest_bytes, &Signature::from_bytes(&sig))
            .map_err(|_| ArtifactError::Signature("Invalid artifact signature".into()))?;
        tracing::info!("Artifact signature verified");
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    type Scaler = ScalerArtifact;
    type Model = CalibratedModel;
    type Error = ArtifactError;

    fn save(&self, bundle: &ModelBundle) -> Result<(), ArtifactError> {
        verify_pairing(&bundle.scaler, &bundle.model)?;
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let scaler_bytes = bincode::serialize(&bundle.scaler)
            .map_err(|e| ArtifactError::Serialization(format!("Failed to encode scaler: {e}")))?;
        let model_bytes = bincode::serialize(&bundle.model)
            .map_err(|e| ArtifactError::Serialization(format!("Failed to encode model: {e}")))?;

        let mut files = BTreeMap::new();
        for (name, bytes) in [(SCALER_FILE, &scaler_bytes), (MODEL_FILE, &model_bytes)] {
            let path = self.dir.join(name);
            fs::write(&path, bytes).map_err(io_err(&path))?;
            files.insert(name.to_string(), sha256_hex_bytes(bytes));
        }

        let manifest = ArtifactManifest {
            version: MANIFEST_VERSION,
            pairing_id: bundle.model.pairing_id.clone(),
            created_at: Utc::now(),
            feature_names: bundle.scaler.feature_names.clone(),
            files,
            metrics: bundle.metrics.clone(),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| ArtifactError::Serialization(format!("Failed to encode manifest: {e}")))?;
        let manifest_path = self.dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, manifest_bytes).map_err(io_err(&manifest_path))?;

        // An old signature no longer covers the new manifest.
        let sig_path = self.dir.join(SIGNATURE_FILE);
        if sig_path.exists() {
            tracing::warn!("Removing stale {SIGNATURE_FILE}; re-sign the new artifacts");
            fs::remove_file(&sig_path).map_err(io_err(&sig_path))?;
        }

        tracing::info!(
            "Saved artifacts to {:?} (pairing_id={}, members={})",
            self.dir,
            &manifest.pairing_id[..12.min(manifest.pairing_id.len())],
            bundle.model.members.len()
        );
        Ok(())
    }

    fn load(&self) -> Result<ModelBundle, ArtifactError> {
        let scaler_bytes = self.read_required(SCALER_FILE)?;
        let model_bytes = self.read_required(MODEL_FILE)?;
        let manifest_bytes = self.read_required(MANIFEST_FILE)?;

        self.verify_signature(&manifest_bytes)?;

        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| ArtifactError::Serialization(format!("Invalid manifest.json format: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Layout(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }

        for (name, bytes) in [(SCALER_FILE, &scaler_bytes), (MODEL_FILE, &model_bytes)] {
            let expected = manifest.files.get(name).ok_or_else(|| {
                ArtifactError::Serialization(format!("manifest.json does not bind {name}"))
            })?;
            if !constant_time_eq_str(&sha256_hex_bytes(bytes), expected) {
                return Err(ArtifactError::HashMismatch { file: name.into() });
            }
        }

        let scaler: ScalerArtifact = bincode::deserialize(&scaler_bytes)
            .map_err(|e| ArtifactError::Serialization(format!("Failed to decode scaler: {e}")))?;
        let model: CalibratedModel = bincode::deserialize(&model_bytes)
            .map_err(|e| ArtifactError::Serialization(format!("Failed to decode model: {e}")))?;

        scaler
            .verify_layout()
            .map_err(|e| ArtifactError::Layout(e.to_string()))?;
        model
            .verify_layout()
            .map_err(|e| ArtifactError::Layout(e.to_string()))?;
        verify_pairing(&scaler, &model)?;
        if !constant_time_eq_str(&manifest.pairing_id, &model.pairing_id) {
            return Err(ArtifactError::Pairing(
                "manifest pairing id differs from artifacts".into(),
            ));
        }

        tracing::info!(
            "Loaded artifacts from {:?} (created_at={}, members={})",
            self.dir,
            manifest.created_at,
            model.members.len()
        );
        Ok(ArtifactBundle {
            scaler,
            model,
            metrics: manifest.metrics,
        })
    }

    fn exists(&self) -> bool {
        [SCALER_FILE, MODEL_FILE, MANIFEST_FILE]
            .iter()
            .all(|name| self.dir.join(name).is_file())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::boosting::Node;
    use crate::adapters::BoosterParams;
    use crate::domain::reference::{high_risk_case, low_risk_case};
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;
    use tempfile::tempdir;

    /// Small paired bundle trained on jittered reference cases.
    pub(crate) fn sample_bundle() -> ModelBundle {
        let mut raw = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            let mut hi = high_risk_case();
            let mut lo = low_risk_case();
            hi.age += i;
            hi.chol += 3 * i;
            lo.age += i;
            lo.thalach -= i;
            raw.push(hi.to_vector());
            labels.push(1);
            raw.push(lo.to_vector());
            labels.push(0);
        }
        let mut scaler = ScalerArtifact::fit(&raw).expect("fit scaler");
        let rows: Vec<_> = raw
            .iter()
            .map(|r| scaler.transform_vector(r).expect("transform"))
            .collect();
        let params = BoosterParams {
            n_estimators: 8,
            learning_rate: 0.3,
            max_depth: 2,
            min_child_weight: 1.0,
            ..BoosterParams::default()
        };
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut model = CalibratedModel::fit_cv(&rows, &labels, &params, 3, &mut rng).expect("fit");
        stamp_pairing(&mut scaler, &mut model).expect("stamp");
        ArtifactBundle {
            scaler,
            model,
            metrics: None,
        }
    }

    fn signing_key() -> SigningKey {
        let mut sk = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut sk);
        SigningKey::from_bytes(&sk)
    }

    #[test]
    fn test_save_then_load_returns_same_artifacts() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        assert!(!store.exists());

        let bundle = sample_bundle();
        store.save(&bundle).expect("save");
        assert!(store.exists());

        let loaded = store.load().expect("load");
        assert_eq!(loaded.scaler, bundle.scaler);
        assert_eq!(loaded.model, bundle.model);

        let manifest: ArtifactManifest = serde_json::from_slice(
            &fs::read(temp.path().join(MANIFEST_FILE)).expect("read manifest"),
        )
        .expect("parse manifest");
        assert_eq!(manifest.pairing_id, bundle.model.pairing_id);
        assert!(manifest.files.contains_key(SCALER_FILE));
        assert!(manifest.files.contains_key(MODEL_FILE));
    }

    #[test]
    fn test_missing_scaler_is_reported() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_bundle()).expect("save");
        fs::remove_file(temp.path().join(SCALER_FILE)).expect("remove");

        assert!(!store.exists());
        match store.load() {
            Err(ArtifactError::Missing { which }) => assert_eq!(which, SCALER_FILE),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_tampered_model_fails_hash_check() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_bundle()).expect("save");

        let path = temp.path().join(MODEL_FILE);
        let mut bytes = fs::read(&path).expect("read");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).expect("write");

        assert!(matches!(
            store.load(),
            Err(ArtifactError::HashMismatch { file }) if file == MODEL_FILE
        ));
    }

    /// Paired and hash-consistent, but the first tree splits on a feature
    /// index past the end of the input vector.
    pub(crate) fn malformed_bundle() -> ModelBundle {
        let mut bundle = sample_bundle();
        bundle.model.members[0].booster.trees[0].nodes = vec![
            Node::Split {
                feature: 99,
                threshold: 0.0,
                left: 1,
                right: 1,
            },
            Node::Leaf { value: 0.0 },
        ];
        stamp_pairing(&mut bundle.scaler, &mut bundle.model).expect("stamp");
        bundle
    }

    #[test]
    fn test_malformed_tree_is_rejected_on_load() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&malformed_bundle()).expect("save");

        match store.load() {
            Err(ArtifactError::Layout(detail)) => {
                assert!(detail.contains("feature 99"), "{detail}");
            }
            other => panic!("expected Layout, got {other:?}"),
        }
    }

    #[test]
    fn test_scaler_from_other_run_is_rejected() {
        let bundle = sample_bundle();
        let mut other = bundle.clone();
        other.scaler.mean[0] += 1.0;
        assert!(matches!(
            verify_pairing(&other.scaler, &other.model),
            Err(ArtifactError::Pairing(_))
        ));

        other.scaler.pairing_id = "0".repeat(64);
        assert!(matches!(
            verify_pairing(&other.scaler, &other.model),
            Err(ArtifactError::Pairing(_))
        ));

        let mut unstamped = bundle;
        unstamped.scaler.pairing_id.clear();
        let temp = tempdir().expect("tempdir");
        assert!(matches!(
            FsArtifactStore::new(temp.path()).save(&unstamped),
            Err(ArtifactError::Pairing(_))
        ));
    }

    #[test]
    fn test_signed_artifacts_verify() {
        let temp = tempdir().expect("tempdir");
        let key = signing_key();
        let store = FsArtifactStore::new(temp.path())
            .with_verifying_key(key.verifying_key())
            .require_signature(true);
        store.save(&sample_bundle()).expect("save");

        assert!(matches!(store.load(), Err(ArtifactError::Signature(_))));

        sign_manifest(temp.path(), &key).expect("sign");
        store.load().expect("load signed");
    }

    #[test]
    fn test_signature_from_wrong_key_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path()).with_verifying_key(signing_key().verifying_key());
        store.save(&sample_bundle()).expect("save");
        sign_manifest(temp.path(), &signing_key()).expect("sign");

        assert!(matches!(store.load(), Err(ArtifactError::Signature(_))));
    }

    #[test]
    fn test_resave_drops_stale_signature() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_bundle()).expect("save");
        sign_manifest(temp.path(), &signing_key()).expect("sign");
        store.save(&sample_bundle()).expect("save again");
        assert!(!temp.path().join(SIGNATURE_FILE).exists());
    }

    #[test]
    fn test_verifying_key_from_b64_checks_length() {
        let key = signing_key().verifying_key();
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        assert_eq!(verifying_key_from_b64(&b64).expect("decode"), key);
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 8]);
        assert!(verifying_key_from_b64(&short).is_err());
    }
}

//! Training service: Offline fit of the scaler/model pair.
//!
//! One run is fully determined by its [`TrainingConfig`]: augmentation, the
//! stratified split, booster subsampling and calibration folds all draw from
//! a single `ChaCha20Rng` seeded from `config.seed`.

use std::path::Path;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::augment::DataAugmentor;
use super::scoring::RiskScorer;
use crate::adapters::artifacts::stamp_pairing;
use crate::adapters::{dataset, CalibratedModel, ModelBundle, ScalerArtifact};
use crate::config::TrainingConfig;
use crate::domain::{reference, rescale, EvaluationMetrics, LabeledRecord, FEATURE_COUNT};
use crate::ports::{ArtifactBundle, ArtifactStore, ProbabilityModel};
use crate::CardioError;

/// Reference case scored after training.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceScore {
    pub name: &'static str,
    pub raw_probability: f64,
    /// Rescaled risk in `[0, 1]`
    pub risk: f64,
}

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub metrics: EvaluationMetrics,
    pub train_size: usize,
    pub test_size: usize,
    pub reference_scores: Vec<ReferenceScore>,
}

/// Split indices into `(train, test)`, drawing the test share from each class
/// separately so both partitions keep the class ratio.
///
/// A class with at least two samples always leaves one on each side.
pub fn stratified_split<R: Rng + ?Sized>(
    labels: &[u8],
    test_fraction: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [0u8, 1] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        let n = members.len();
        if n == 0 {
            continue;
        }
        members.shuffle(rng);
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Offline trainer.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Create a trainer for `config`.
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// The configuration this trainer runs with.
    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load a CSV dataset and train on it.
    ///
    /// # Errors
    /// Returns error if the dataset cannot be read or training fails.
    pub fn train(&self, dataset_path: &Path) -> Result<TrainingOutcome, CardioError> {
        let records = dataset::load_records(dataset_path)?;
        self.train_records(records)
    }

    /// Train, then persist the artifact pair into `store`.
    ///
    /// # Errors
    /// Returns error if training or saving fails.
    pub fn train_into<S>(&self, dataset_path: &Path, store: &S) -> Result<TrainingOutcome, CardioError>
    where
        S: ArtifactStore<Scaler = ScalerArtifact, Model = CalibratedModel>,
        S::Error: Into<CardioError>,
    {
        let outcome = self.train(dataset_path)?;
        store
            .save(&outcome.bundle)
            .map_err(Into::<CardioError>::into)?;
        Ok(outcome)
    }

    /// Run the full pipeline on in-memory records (synthetic records are appended).
    ///
    /// # Errors
    /// Returns error on invalid configuration, a single-class dataset, or a
    /// model fitting failure.
    pub fn train_records(&self, records: Vec<LabeledRecord>) -> Result<TrainingOutcome, CardioError> {
        self.config.validate()?;
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);

        let records = DataAugmentor::new(self.config.synthetic_per_tier).augment(records, &mut rng);
        let labels: Vec<u8> = records.iter().map(|r| r.target).collect();
        let raw: Vec<[f64; FEATURE_COUNT]> = records.iter().map(|r| r.features.to_vector()).collect();

        let positives = labels.iter().filter(|&&y| y == 1).count();
        if positives == 0 || positives == labels.len() {
            return Err(CardioError::ModelError {
                detail: "training data must contain both classes".into(),
            });
        }

        let (train_idx, test_idx) = stratified_split(&labels, self.config.test_fraction, &mut rng);
        tracing::info!(
            "Split {} records: train={}, test={}",
            records.len(),
            train_idx.len(),
            test_idx.len()
        );

        let train_raw: Vec<_> = train_idx.iter().map(|&i| raw[i]).collect();
        let train_y: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
        let test_y: Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();

        let mut scaler = ScalerArtifact::fit(&train_raw)?;
        let train_x = train_raw
            .iter()
            .map(|r| scaler.transform_vector(r))
            .collect::<Result<Vec<_>, _>>()?;
        let test_x = test_idx
            .iter()
            .map(|&i| scaler.transform_vector(&raw[i]))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Fitting {} calibrated members ({} trees each)...",
            self.config.calibration_folds,
            self.config.booster.n_estimators
        );
        let mut model = CalibratedModel::fit_cv(
            &train_x,
            &train_y,
            &self.config.booster,
            self.config.calibration_folds,
            &mut rng,
        )?;
        let pairing_id = stamp_pairing(&mut scaler, &mut model)?;
        tracing::debug!("Stamped pairing id {}", pairing_id);

        let test_p = test_x
            .iter()
            .map(|x| model.predict_proba(x))
            .collect::<Result<Vec<_>, _>>()?;
        let metrics =
            EvaluationMetrics::compute(&test_y, &test_p).ok_or_else(|| CardioError::ModelError {
                detail: "test partition is empty".into(),
            })?;
        log_metrics(&metrics);

        let scorer = RiskScorer::new(Arc::new(scaler.clone()), Arc::new(model.clone()))?;
        let reference_scores = score_reference_cases(&scorer)?;

        Ok(TrainingOutcome {
            bundle: ArtifactBundle {
                scaler,
                model,
                metrics: Some(metrics.clone()),
            },
            metrics,
            train_size: train_idx.len(),
            test_size: test_idx.len(),
            reference_scores,
        })
    }
}

fn log_metrics(metrics: &EvaluationMetrics) {
    let auc = metrics
        .roc_auc
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
    tracing::info!(
        "Model performance: accuracy={:.3}, roc_auc={}, brier={:.3}",
        metrics.accuracy,
        auc,
        metrics.brier_score
    );
    for class in &metrics.per_class {
        tracing::info!(
            "  class {}: precision={:.2} recall={:.2} f1={:.2} support={}",
            class.label,
            class.precision,
            class.recall,
            class.f1,
            class.support
        );
    }
}

fn score_reference_cases<M: ProbabilityModel>(
    scorer: &RiskScorer<M>,
) -> Result<Vec<ReferenceScore>, CardioError> {
    reference::cases()
        .into_iter()
        .map(|(name, record)| {
            let raw_probability = scorer.score(&record)?;
            let risk = rescale(raw_probability);
            tracing::info!(
                "{}: raw model score {:.1}%, final risk score {:.1}%",
                name,
                raw_probability * 100.0,
                risk * 100.0
            );
            Ok(ReferenceScore {
                name,
                raw_probability,
                risk,
            })
        })
        .collect()
}

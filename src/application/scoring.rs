//! Scoring service: Validated inference and risk assessment.
//!
//! The scorer holds the loaded scaler and model behind `Arc`s; it is cheap to
//! clone and safe to share across threads. Nothing is loaded lazily: a scorer
//! exists only once a consistent artifact pair has been handed to it.

use std::sync::Arc;

use crate::adapters::artifacts::verify_pairing;
use crate::adapters::{CalibratedModel, ModelBundle, ScalerArtifact};
use crate::domain::{recommend, rescale, FeatureRecord, RiskAssessment, RiskLevel};
use crate::ports::{ArtifactStore, ProbabilityModel};
use crate::CardioError;

/// Turns a validated feature record into a calibrated probability.
pub struct RiskScorer<M = CalibratedModel>
where
    M: ProbabilityModel,
{
    scaler: Arc<ScalerArtifact>,
    model: Arc<M>,
}

impl<M: ProbabilityModel> Clone for RiskScorer<M> {
    fn clone(&self) -> Self {
        Self {
            scaler: Arc::clone(&self.scaler),
            model: Arc::clone(&self.model),
        }
    }
}

impl<M> RiskScorer<M>
where
    M: ProbabilityModel,
{
    /// Pair a scaler with a model after checking they belong together.
    ///
    /// # Errors
    /// Returns `TransformError` if the layouts or pairing ids disagree.
    pub fn new(scaler: Arc<ScalerArtifact>, model: Arc<M>) -> Result<Self, CardioError> {
        scaler.verify_layout()?;
        if model.feature_names() != scaler.feature_names.as_slice() {
            return Err(CardioError::TransformError {
                detail: format!(
                    "model feature order {:?} differs from scaler {:?}",
                    model.feature_names(),
                    scaler.feature_names
                ),
            });
        }
        if scaler.pairing_id.is_empty() || scaler.pairing_id != model.pairing_id() {
            return Err(CardioError::TransformError {
                detail: "scaler and model were not produced by the same training run".into(),
            });
        }
        Ok(Self { scaler, model })
    }

    /// Calibrated probability of heart disease for one record.
    ///
    /// # Errors
    /// `ValidationFailed` for out-of-domain input, `TransformError` for an
    /// inconsistent scaler, `ModelError` for non-finite output.
    pub fn score(&self, record: &FeatureRecord) -> Result<f64, CardioError> {
        record.validate()?;
        let scaled = self.scaler.transform(record)?;
        let probability = self.model.predict_proba(&scaled)?;
        tracing::debug!("Scored record: probability={:.4}", probability);
        Ok(probability)
    }
}

impl RiskScorer<CalibratedModel> {
    /// Build from a loaded bundle, re-checking the full pairing fingerprint.
    ///
    /// # Errors
    /// Returns `TransformError` if the artifacts are not a verified pair.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self, CardioError> {
        verify_pairing(&bundle.scaler, &bundle.model)?;
        bundle.model.verify_layout()?;
        Self::new(Arc::new(bundle.scaler), Arc::new(bundle.model))
    }
}

/// Scores records and explains the result.
pub struct AssessmentService<M = CalibratedModel>
where
    M: ProbabilityModel,
{
    scorer: RiskScorer<M>,
}

impl<M: ProbabilityModel> Clone for AssessmentService<M> {
    fn clone(&self) -> Self {
        Self {
            scorer: self.scorer.clone(),
        }
    }
}

impl AssessmentService<CalibratedModel> {
    /// Load the artifact pair from a store.
    ///
    /// # Errors
    /// `ArtifactMissing` if either artifact is absent; integrity and pairing
    /// failures otherwise.
    pub fn load<S>(store: &S) -> Result<Self, CardioError>
    where
        S: ArtifactStore<Scaler = ScalerArtifact, Model = CalibratedModel>,
        S::Error: Into<CardioError>,
    {
        let bundle = store.load().map_err(Into::<CardioError>::into)?;
        Ok(Self::new(RiskScorer::from_bundle(bundle)?))
    }
}

impl<M> AssessmentService<M>
where
    M: ProbabilityModel,
{
    /// Create a service around an existing scorer.
    pub fn new(scorer: RiskScorer<M>) -> Self {
        Self { scorer }
    }

    /// The underlying scorer.
    #[must_use]
    pub fn scorer(&self) -> &RiskScorer<M> {
        &self.scorer
    }

    /// Score a record, rescale the probability and attach recommendations.
    ///
    /// # Errors
    /// Any error from [`RiskScorer::score`]; no fallback score is substituted.
    pub fn score_and_recommend(&self, record: &FeatureRecord) -> Result<RiskAssessment, CardioError> {
        let raw_probability = self.scorer.score(record)?;
        let fraction = rescale(raw_probability);
        let risk_score = fraction * 100.0;
        let risk_level = RiskLevel::from_score(risk_score);

        tracing::info!(
            "Assessment complete: raw={:.1}%, risk={:.1}%, level={}",
            raw_probability * 100.0,
            risk_score,
            risk_level
        );

        Ok(RiskAssessment {
            raw_probability,
            risk_score,
            risk_level,
            recommendations: recommend(record, fraction),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BoosterParams;
    use crate::application::Trainer;
    use crate::config::TrainingConfig;
    use crate::domain::reference::{high_risk_case, low_risk_case};
    use crate::domain::{Feature, RecommendationKind};
    use crate::ports::ModelError;

    fn trained(seed: u64) -> ModelBundle {
        let config = TrainingConfig {
            seed,
            synthetic_per_tier: 40,
            calibration_folds: 3,
            booster: BoosterParams {
                n_estimators: 20,
                learning_rate: 0.3,
                max_depth: 3,
                min_child_weight: 1.0,
                ..BoosterParams::default()
            },
            ..TrainingConfig::default()
        };
        Trainer::new(config)
            .train_records(Vec::new())
            .expect("train")
            .bundle
    }

    fn service() -> AssessmentService {
        AssessmentService::new(RiskScorer::from_bundle(trained(42)).expect("scorer"))
    }

    #[test]
    fn test_high_risk_case_is_urgent() {
        let assessment = service()
            .score_and_recommend(&high_risk_case())
            .expect("assess");
        assert!(assessment.risk_score > 50.0, "score={}", assessment.risk_score);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.recommendations.len(), 4);
        assert_eq!(
            assessment.recommendations[0].kind,
            RecommendationKind::UrgentActions
        );
    }

    #[test]
    fn test_low_risk_case_gets_preventive_advice() {
        let assessment = service()
            .score_and_recommend(&low_risk_case())
            .expect("assess");
        assert!(assessment.risk_score < 20.0, "score={}", assessment.risk_score);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(
            assessment.recommendations[0].kind,
            RecommendationKind::PreventiveMeasures
        );
        let lifestyle = &assessment.recommendations[1];
        assert_eq!(lifestyle.kind, RecommendationKind::Lifestyle);
        assert_eq!(lifestyle.steps.len(), 4);
    }

    #[test]
    fn test_score_matches_rescaled_assessment() {
        let service = service();
        let raw = service.scorer().score(&high_risk_case()).expect("score");
        let assessment = service
            .score_and_recommend(&high_risk_case())
            .expect("assess");
        assert!((assessment.raw_probability - raw).abs() < 1e-15);
        assert!((assessment.risk_score - rescale(raw) * 100.0).abs() < 1e-12);
        assert!((0.0..=100.0).contains(&assessment.risk_score));
    }

    #[test]
    fn test_invalid_record_is_rejected_before_scoring() {
        let mut record = high_risk_case();
        record.chol = 50;
        match service().score_and_recommend(&record) {
            Err(CardioError::ValidationFailed { field, reason }) => {
                assert_eq!(field, "chol");
                assert_eq!(reason, "Chol must be between 100 and 600");
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_unpaired_artifacts_are_rejected() {
        let a = trained(42);
        let b = trained(7);
        assert!(matches!(
            RiskScorer::new(Arc::new(a.scaler.clone()), Arc::new(b.model.clone())),
            Err(CardioError::TransformError { .. })
        ));

        let mut swapped = a;
        swapped.scaler.feature_names.swap(0, 1);
        assert!(matches!(
            RiskScorer::from_bundle(swapped),
            Err(CardioError::TransformError { .. })
        ));
    }

    #[test]
    fn test_load_from_empty_store_reports_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = crate::adapters::FsArtifactStore::new(temp.path());
        assert!(matches!(
            AssessmentService::load(&store),
            Err(CardioError::ArtifactMissing { .. })
        ));
    }

    #[test]
    fn test_malformed_model_is_refused_before_scoring() {
        use crate::adapters::artifacts::tests::malformed_bundle;

        let temp = tempfile::tempdir().expect("tempdir");
        let store = crate::adapters::FsArtifactStore::new(temp.path());
        store.save(&malformed_bundle()).expect("save");
        assert!(matches!(
            AssessmentService::load(&store),
            Err(CardioError::TransformError { .. })
        ));
        assert!(matches!(
            RiskScorer::from_bundle(malformed_bundle()),
            Err(CardioError::TransformError { .. })
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let service = service();
        let expected = service.scorer().score(&high_risk_case()).expect("score");
        std::thread::scope(|s| {
            for _ in 0..4 {
                let local = service.clone();
                s.spawn(move || {
                    let p = local.scorer().score(&high_risk_case()).expect("score");
                    assert!((p - expected).abs() < 1e-15);
                });
            }
        });
    }

    struct NanModel {
        names: Vec<String>,
        pairing_id: String,
    }

    impl ProbabilityModel for NanModel {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn pairing_id(&self) -> &str {
            &self.pairing_id
        }

        fn predict_proba(&self, _: &[f64; crate::domain::FEATURE_COUNT]) -> Result<f64, ModelError> {
            Err(ModelError::NonFinite("NaN".into()))
        }
    }

    #[test]
    fn test_non_finite_model_output_is_model_error() {
        let bundle = trained(42);
        let model = NanModel {
            names: Feature::ordered_names(),
            pairing_id: bundle.scaler.pairing_id.clone(),
        };
        let scorer = RiskScorer::new(Arc::new(bundle.scaler), Arc::new(model)).expect("scorer");
        assert!(matches!(
            AssessmentService::new(scorer).score_and_recommend(&high_risk_case()),
            Err(CardioError::ModelError { .. })
        ));
    }
}

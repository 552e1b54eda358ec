//! Sigmoid (Platt) probability calibration over cross-validated boosters.
//!
//! For each of k stratified folds a booster is fit on the remaining folds and a
//! sigmoid `1 / (1 + exp(a*s + b))` is fit on its held-out scores. The
//! calibrated probability is the mean over the k members.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::boosting::{check_training_set, BoosterParams, GradientBoostedTrees};
use crate::domain::{Feature, FEATURE_COUNT};
use crate::ports::{ModelError, ProbabilityModel};

/// Bumped whenever the serialized layout changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

const PLATT_MAX_ITER: usize = 100;
const PLATT_MIN_STEP: f64 = 1e-10;
const PLATT_SIGMA: f64 = 1e-12;
const PLATT_EPS: f64 = 1e-5;

/// Fitted sigmoid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Fit by regularized maximum likelihood with smoothed targets
    /// (Newton's method with backtracking line search).
    ///
    /// # Errors
    /// Returns error if inputs are empty, mismatched, or single-class.
    pub fn fit(scores: &[f64], labels: &[u8]) -> Result<Self, ModelError> {
        if scores.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if scores.len() != labels.len() {
            return Err(ModelError::LabelCount {
                features: scores.len(),
                labels: labels.len(),
            });
        }

        let prior1 = labels.iter().filter(|&&y| y == 1).count() as f64;
        let prior0 = labels.len() as f64 - prior1;
        let hi = (prior1 + 1.0) / (prior1 + 2.0);
        let lo = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = labels.iter().map(|&y| if y == 1 { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            scores
                .iter()
                .zip(&targets)
                .map(|(&s, &t)| {
                    let f = s * a + b;
                    if f >= 0.0 {
                        t * f + (-f).exp().ln_1p()
                    } else {
                        (t - 1.0) * f + f.exp().ln_1p()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..PLATT_MAX_ITER {
            let (mut h11, mut h22, mut h21) = (PLATT_SIGMA, PLATT_SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (&s, &t) in scores.iter().zip(&targets) {
                let f = s * a + b;
                let (p, q) = if f >= 0.0 {
                    let e = (-f).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += s * s * d2;
                h22 += d2;
                h21 += s * d2;
                let d1 = t - p;
                g1 += s * d1;
                g2 += d1;
            }
            if g1.abs() < PLATT_EPS && g2.abs() < PLATT_EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            let mut accepted = false;
            while step >= PLATT_MIN_STEP {
                let (na, nb) = (a + step * da, b + step * db);
                let nf = objective(na, nb);
                if nf < fval + 1e-4 * step * gd {
                    a = na;
                    b = nb;
                    fval = nf;
                    accepted = true;
                    break;
                }
                step /= 2.0;
            }
            if !accepted {
                tracing::debug!("Platt line search stalled at a={a:.4}, b={b:.4}");
                break;
            }
        }

        if !(a.is_finite() && b.is_finite()) {
            return Err(ModelError::NonFinite(format!("sigmoid parameters a={a}, b={b}")));
        }
        Ok(Self { a, b })
    }

    /// Calibrated probability for a raw score.
    #[must_use]
    pub fn apply(&self, score: f64) -> f64 {
        let f = self.a * score + self.b;
        if f >= 0.0 {
            let e = (-f).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f.exp())
        }
    }
}

/// Assign each sample to one of `k` folds, round-robin within each class.
///
/// # Errors
/// Returns `ModelError::TooFewSamples` if a class has fewer than `k` samples.
pub fn stratified_folds(labels: &[u8], k: usize) -> Result<Vec<usize>, ModelError> {
    if k < 2 {
        return Err(ModelError::InvalidParameter(
            "calibration folds must be >= 2".into(),
        ));
    }
    let mut folds = vec![0; labels.len()];
    for class in [0u8, 1] {
        let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.len() < k {
            return Err(ModelError::TooFewSamples {
                class,
                count: members.len(),
                needed: k,
            });
        }
        for (pos, &i) in members.iter().enumerate() {
            folds[i] = pos % k;
        }
    }
    Ok(folds)
}

/// One cross-validation member: a booster and the sigmoid fit on its held-out fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedMember {
    pub booster: GradientBoostedTrees,
    pub sigmoid: PlattScaling,
}

/// Probability-calibrated gradient-boosted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedModel {
    pub format_version: u32,
    /// Input column order the boosters were fit with
    pub feature_names: Vec<String>,
    /// Fingerprint shared with the paired scaler artifact
    pub pairing_id: String,
    pub members: Vec<CalibratedMember>,
}

impl CalibratedModel {
    /// Fit `folds` calibrated members by stratified cross-validation.
    ///
    /// # Errors
    /// Returns error on invalid data, parameters, or too few samples per class.
    pub fn fit_cv<R: Rng + ?Sized>(
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[u8],
        params: &BoosterParams,
        folds: usize,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        params.validate()?;
        check_training_set(rows, labels)?;
        let assignment = stratified_folds(labels, folds)?;

        let mut members = Vec::with_capacity(folds);
        for fold in 0..folds {
            let (mut train_x, mut train_y) = (Vec::new(), Vec::new());
            let (mut held_x, mut held_y) = (Vec::new(), Vec::new());
            for (i, row) in rows.iter().enumerate() {
                if assignment[i] == fold {
                    held_x.push(*row);
                    held_y.push(labels[i]);
                } else {
                    train_x.push(*row);
                    train_y.push(labels[i]);
                }
            }

            let booster = GradientBoostedTrees::fit(&train_x, &train_y, params, rng)?;
            let scores: Vec<f64> = held_x.iter().map(|x| booster.predict_proba(x)).collect();
            let sigmoid = PlattScaling::fit(&scores, &held_y)?;
            tracing::debug!(
                "Calibrated fold {}/{}: train={}, held_out={}, a={:.4}, b={:.4}",
                fold + 1,
                folds,
                train_y.len(),
                held_y.len(),
                sigmoid.a,
                sigmoid.b
            );
            members.push(CalibratedMember { booster, sigmoid });
        }

        Ok(Self {
            format_version: MODEL_FORMAT_VERSION,
            feature_names: Feature::ordered_names(),
            pairing_id: String::new(),
            members,
        })
    }

    /// Check version, member count and feature order against the compiled-in
    /// layout, then the sigmoid parameters and tree structure of every member.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn verify_layout(&self) -> Result<(), ModelError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(self.format_version));
        }
        if self.members.is_empty() {
            return Err(ModelError::Empty);
        }
        let expected = Feature::ordered_names();
        if self.feature_names != expected {
            return Err(ModelError::FeatureOrder {
                found: self.feature_names.clone(),
                expected,
            });
        }
        for (i, member) in self.members.iter().enumerate() {
            let PlattScaling { a, b } = member.sigmoid;
            if !a.is_finite() || !b.is_finite() {
                return Err(ModelError::Malformed(format!(
                    "member {i} has sigmoid a={a}, b={b}"
                )));
            }
            member.booster.verify().map_err(|e| match e {
                ModelError::Malformed(detail) => {
                    ModelError::Malformed(format!("member {i}: {detail}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl ProbabilityModel for CalibratedModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn pairing_id(&self) -> &str {
        &self.pairing_id
    }

    fn predict_proba(&self, scaled: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        if self.members.is_empty() {
            return Err(ModelError::Empty);
        }
        let sum: f64 = self
            .members
            .iter()
            .map(|m| m.sigmoid.apply(m.booster.predict_proba(scaled)))
            .sum();
        let p = sum / self.members.len() as f64;
        if !p.is_finite() {
            return Err(ModelError::NonFinite(format!("calibrated probability {p}")));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn blobs(n_per_class: usize) -> (Vec<[f64; FEATURE_COUNT]>, Vec<u8>) {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..n_per_class {
            let mut neg = [0.0; FEATURE_COUNT];
            let mut pos = [0.0; FEATURE_COUNT];
            for j in 0..FEATURE_COUNT {
                neg[j] = rng.gen_range(-2.0..0.2);
                pos[j] = rng.gen_range(-0.2..2.0);
            }
            rows.push(neg);
            labels.push(0);
            rows.push(pos);
            labels.push(1);
        }
        (rows, labels)
    }

    fn fast_params() -> BoosterParams {
        BoosterParams {
            n_estimators: 20,
            learning_rate: 0.3,
            max_depth: 3,
            min_child_weight: 1.0,
            ..BoosterParams::default()
        }
    }

    #[test]
    fn test_platt_is_monotone_increasing_for_informative_scores() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9];
        let labels = [0, 0, 0, 1, 0, 1, 1, 1];
        let platt = PlattScaling::fit(&scores, &labels).expect("fit");
        assert!(platt.a < 0.0);
        let mut prev = 0.0;
        for s in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = platt.apply(s);
            assert!((0.0..=1.0).contains(&p));
            assert!(p > prev);
            prev = p;
        }
    }

    #[test]
    fn test_platt_uninformative_scores_give_prior() {
        let scores = [0.5; 10];
        let labels = [0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
        let platt = PlattScaling::fit(&scores, &labels).expect("fit");
        assert!((platt.apply(0.5) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_platt_rejects_mismatched_input() {
        assert_eq!(
            PlattScaling::fit(&[0.1, 0.2], &[1]),
            Err(ModelError::LabelCount {
                features: 2,
                labels: 1
            })
        );
        assert_eq!(PlattScaling::fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i % 5 == 0)).collect();
        let folds = stratified_folds(&labels, 5).expect("folds");
        for fold in 0..5 {
            let pos = (0..50).filter(|&i| folds[i] == fold && labels[i] == 1).count();
            let neg = (0..50).filter(|&i| folds[i] == fold && labels[i] == 0).count();
            assert_eq!(pos, 2);
            assert_eq!(neg, 8);
        }
    }

    #[test]
    fn test_stratified_folds_need_enough_samples() {
        assert_eq!(
            stratified_folds(&[0, 0, 0, 0, 0, 1, 1], 5),
            Err(ModelError::TooFewSamples {
                class: 1,
                count: 2,
                needed: 5
            })
        );
    }

    #[test]
    fn test_calibrated_model_separates_classes() {
        let (rows, labels) = blobs(30);
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let model =
            CalibratedModel::fit_cv(&rows, &labels, &fast_params(), 5, &mut rng).expect("fit");
        assert_eq!(model.members.len(), 5);
        assert_eq!(model.feature_names, Feature::ordered_names());

        let hi = model.predict_proba(&[1.5; FEATURE_COUNT]).expect("predict");
        let lo = model.predict_proba(&[-1.5; FEATURE_COUNT]).expect("predict");
        assert!(hi > 0.7, "hi={hi}");
        assert!(lo < 0.3, "lo={lo}");
    }

    #[test]
    fn test_verify_layout_rejects_reordered_features() {
        let (rows, labels) = blobs(10);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut model =
            CalibratedModel::fit_cv(&rows, &labels, &fast_params(), 2, &mut rng).expect("fit");
        assert!(model.verify_layout().is_ok());
        model.feature_names.swap(0, 1);
        assert!(matches!(
            model.verify_layout(),
            Err(ModelError::FeatureOrder { .. })
        ));
        model.format_version = 99;
        assert_eq!(model.verify_layout(), Err(ModelError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_verify_layout_rejects_malformed_members() {
        use crate::adapters::boosting::Node;

        let (rows, labels) = blobs(10);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let fitted =
            CalibratedModel::fit_cv(&rows, &labels, &fast_params(), 2, &mut rng).expect("fit");

        let mut bad_sigmoid = fitted.clone();
        bad_sigmoid.members[1].sigmoid.a = f64::NAN;
        assert!(matches!(
            bad_sigmoid.verify_layout(),
            Err(ModelError::Malformed(_))
        ));

        let mut bad_tree = fitted;
        bad_tree.members[0].booster.trees[0].nodes = vec![
            Node::Split {
                feature: 99,
                threshold: 0.0,
                left: 1,
                right: 1,
            },
            Node::Leaf { value: 0.0 },
        ];
        match bad_tree.verify_layout() {
            Err(ModelError::Malformed(detail)) => {
                assert!(detail.starts_with("member 0: tree 0:"), "{detail}");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_model_errors() {
        let model = CalibratedModel {
            format_version: MODEL_FORMAT_VERSION,
            feature_names: Feature::ordered_names(),
            pairing_id: String::new(),
            members: Vec::new(),
        };
        assert_eq!(
            model.predict_proba(&[0.0; FEATURE_COUNT]),
            Err(ModelError::Empty)
        );
    }
}

//! Gradient-boosted decision trees with a logistic objective.
//!
//! Trees are fit to the first and second derivatives of the weighted log
//! loss, with row subsampling and per-tree column subsampling drawn from a
//! caller-supplied RNG. The same seed and data yield the same ensemble.

mod tree;

pub use tree::{Node, RegressionTree};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::FEATURE_COUNT;
use crate::ports::ModelError;
use tree::{GradientView, GrowthParams};

/// Booster hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    /// Minimum loss reduction to keep a split
    pub gamma: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Fraction of rows drawn per tree
    pub subsample: f64,
    /// Fraction of columns drawn per tree
    pub colsample_bytree: f64,
    /// Weight applied to positive samples
    pub scale_pos_weight: f64,
    /// Initial prediction as a probability
    pub base_score: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.03,
            max_depth: 6,
            min_child_weight: 3.0,
            gamma: 0.2,
            lambda: 1.0,
            subsample: 0.8,
            colsample_bytree: 0.8,
            scale_pos_weight: 1.2,
            base_score: 0.5,
        }
    }
}

impl BoosterParams {
    /// Reject values that would make training meaningless.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidParameter` naming the offending field.
    pub fn validate(&self) -> Result<(), ModelError> {
        let bad = |what: &str| Err(ModelError::InvalidParameter(what.to_string()));
        if self.n_estimators == 0 {
            return bad("n_estimators must be > 0");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return bad("learning_rate must be in (0, 1]");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return bad("subsample must be in (0, 1]");
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return bad("colsample_bytree must be in (0, 1]");
        }
        if !(self.base_score > 0.0 && self.base_score < 1.0) {
            return bad("base_score must be in (0, 1)");
        }
        if self.min_child_weight < 0.0 || self.gamma < 0.0 || self.lambda < 0.0 {
            return bad("min_child_weight, gamma and lambda must be >= 0");
        }
        if self.scale_pos_weight <= 0.0 {
            return bad("scale_pos_weight must be > 0");
        }
        Ok(())
    }

    fn growth(&self) -> GrowthParams {
        GrowthParams {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            gamma: self.gamma,
            lambda: self.lambda,
            learning_rate: self.learning_rate,
        }
    }
}

/// A fitted boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_margin: f64,
    pub(crate) trees: Vec<RegressionTree>,
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Ensure labels are binary and match the row count.
pub(crate) fn check_training_set(
    rows: &[[f64; FEATURE_COUNT]],
    labels: &[u8],
) -> Result<(), ModelError> {
    if rows.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if rows.len() != labels.len() {
        return Err(ModelError::LabelCount {
            features: rows.len(),
            labels: labels.len(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&y| y > 1) {
        return Err(ModelError::NonBinaryLabel(bad));
    }
    Ok(())
}

impl GradientBoostedTrees {
    /// Fit the ensemble.
    ///
    /// # Errors
    /// Returns error on invalid parameters or training data.
    pub fn fit<R: Rng + ?Sized>(
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[u8],
        params: &BoosterParams,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        params.validate()?;
        check_training_set(rows, labels)?;

        let n = rows.len();
        let base_margin = (params.base_score / (1.0 - params.base_score)).ln();
        let weights: Vec<f64> = labels
            .iter()
            .map(|&y| if y == 1 { params.scale_pos_weight } else { 1.0 })
            .collect();

        let n_rows = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let n_cols =
            ((FEATURE_COUNT as f64 * params.colsample_bytree).round() as usize).clamp(1, FEATURE_COUNT);

        let growth = params.growth();
        let mut margins = vec![base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut all_rows: Vec<usize> = (0..n).collect();
        let mut all_cols: Vec<usize> = (0..FEATURE_COUNT).collect();
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                let w = weights[i];
                grad[i] = w * (p - f64::from(labels[i]));
                hess[i] = (w * p * (1.0 - p)).max(1e-16);
            }

            all_rows.shuffle(rng);
            let mut sample = all_rows[..n_rows].to_vec();
            sample.sort_unstable();

            all_cols.shuffle(rng);
            let mut cols = all_cols[..n_cols].to_vec();
            cols.sort_unstable();

            let view = GradientView {
                rows,
                grad: &grad,
                hess: &hess,
            };
            let tree = RegressionTree::grow(&view, &sample, &cols, &growth);

            for (m, row) in margins.iter_mut().zip(rows) {
                *m += tree.predict(row);
            }
            tracing::trace!(round, leaves = tree.leaf_count(), "Fitted boosting round");
            trees.push(tree);
        }

        Ok(Self { base_margin, trees })
    }

    /// Raw additive score (log-odds).
    #[must_use]
    pub fn margin(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    /// Uncalibrated positive-class probability.
    #[must_use]
    pub fn predict_proba(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        sigmoid(self.margin(x))
    }

    /// Check the base margin and the structure of every tree.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` naming the first bad tree.
    pub fn verify(&self) -> Result<(), ModelError> {
        if !self.base_margin.is_finite() {
            return Err(ModelError::Malformed(format!(
                "base margin {}",
                self.base_margin
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.verify().map_err(|e| match e {
                ModelError::Malformed(detail) => ModelError::Malformed(format!("tree {i}: {detail}")),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn separable(n_per_class: usize) -> (Vec<[f64; FEATURE_COUNT]>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = i as f64 / n_per_class as f64;
            let mut neg = [0.0; FEATURE_COUNT];
            let mut pos = [0.0; FEATURE_COUNT];
            for j in 0..FEATURE_COUNT {
                neg[j] = -1.0 - jitter;
                pos[j] = 1.0 + jitter;
            }
            rows.push(neg);
            labels.push(0);
            rows.push(pos);
            labels.push(1);
        }
        (rows, labels)
    }

    fn small_params() -> BoosterParams {
        BoosterParams {
            n_estimators: 30,
            learning_rate: 0.3,
            max_depth: 3,
            min_child_weight: 1.0,
            ..BoosterParams::default()
        }
    }

    #[test]
    fn test_learns_separable_data() {
        let (rows, labels) = separable(20);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let model = GradientBoostedTrees::fit(&rows, &labels, &small_params(), &mut rng)
            .expect("fit");
        assert_eq!(model.n_trees(), 30);
        assert!(model.predict_proba(&[1.5; FEATURE_COUNT]) > 0.8);
        assert!(model.predict_proba(&[-1.5; FEATURE_COUNT]) < 0.2);
    }

    #[test]
    fn test_fit_is_reproducible_for_seed() {
        let (rows, labels) = separable(15);
        let a = GradientBoostedTrees::fit(
            &rows,
            &labels,
            &small_params(),
            &mut ChaCha20Rng::seed_from_u64(42),
        )
        .expect("fit");
        let b = GradientBoostedTrees::fit(
            &rows,
            &labels,
            &small_params(),
            &mut ChaCha20Rng::seed_from_u64(42),
        )
        .expect("fit");
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (rows, labels) = separable(3);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(
            GradientBoostedTrees::fit(&rows, &labels[..2], &small_params(), &mut rng),
            Err(ModelError::LabelCount {
                features: 6,
                labels: 2
            })
        );
        let mut bad = labels.clone();
        bad[0] = 2;
        assert_eq!(
            GradientBoostedTrees::fit(&rows, &bad, &small_params(), &mut rng),
            Err(ModelError::NonBinaryLabel(2))
        );
        let params = BoosterParams {
            subsample: 0.0,
            ..small_params()
        };
        assert!(matches!(
            GradientBoostedTrees::fit(&rows, &labels, &params, &mut rng),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_sigmoid_stable_at_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }
}

//! Second-order regression trees for gradient boosting.
//!
//! Trees are grown greedily with exact split search on the gradient and
//! hessian statistics of the logistic loss. Samples with `x[feature] < threshold`
//! go left.

use serde::{Deserialize, Serialize};

use crate::domain::FEATURE_COUNT;
use crate::ports::ModelError;

/// A tree node. Children are indices into [`RegressionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A fitted regression tree; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthParams {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub gamma: f64,
    pub lambda: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Per-sample gradient statistics shared by every node of one tree.
pub(crate) struct GradientView<'a> {
    pub rows: &'a [[f64; FEATURE_COUNT]],
    pub grad: &'a [f64],
    pub hess: &'a [f64],
}

impl RegressionTree {
    /// Evaluate the tree on one scaled feature vector.
    #[must_use]
    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if x[*feature] < *threshold { *left } else { *right };
                }
                Some(Node::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    /// Check that every split reads a known feature and points forward to
    /// existing nodes, and that all thresholds and leaf values are finite.
    ///
    /// Trees grown by [`RegressionTree::grow`] always satisfy this; a tree
    /// decoded from disk may not, and `predict` assumes it.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` describing the first bad node.
    pub fn verify(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Malformed("tree has no nodes".into()));
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(ModelError::Malformed(format!(
                            "node {i} splits on feature {feature} (have {FEATURE_COUNT})"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Malformed(format!(
                            "node {i} has threshold {threshold}"
                        )));
                    }
                    for child in [left, right] {
                        if child <= i || child >= len {
                            return Err(ModelError::Malformed(format!(
                                "node {i} points to child {child} outside {}..{len}",
                                i + 1
                            )));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ModelError::Malformed(format!(
                            "leaf {i} has value {value}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Grow a tree over `samples` considering only `features`.
    pub(crate) fn grow(
        view: &GradientView<'_>,
        samples: &[usize],
        features: &[usize],
        params: &GrowthParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(view, samples.to_vec(), features, params, 0);
        tree
    }

    fn grow_node(
        &mut self,
        view: &GradientView<'_>,
        samples: Vec<usize>,
        features: &[usize],
        params: &GrowthParams,
        depth: usize,
    ) -> usize {
        let idx = self.nodes.len();
        let (g, h) = sums(view, &samples);
        self.nodes.push(Node::Leaf {
            value: leaf_weight(g, h, params),
        });

        if depth >= params.max_depth || samples.len() < 2 {
            return idx;
        }
        let Some(split) = best_split(view, &samples, features, params, g, h) else {
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| view.rows[i][split.feature] < split.threshold);

        let left = self.grow_node(view, left_samples, features, params, depth + 1);
        let right = self.grow_node(view, right_samples, features, params, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }
}

fn sums(view: &GradientView<'_>, samples: &[usize]) -> (f64, f64) {
    samples
        .iter()
        .fold((0.0, 0.0), |(g, h), &i| (g + view.grad[i], h + view.hess[i]))
}

fn leaf_weight(g: f64, h: f64, params: &GrowthParams) -> f64 {
    -g / (h + params.lambda) * params.learning_rate
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

/// Exact greedy search; ties keep the earliest feature and lowest threshold.
fn best_split(
    view: &GradientView<'_>,
    samples: &[usize],
    features: &[usize],
    params: &GrowthParams,
    g_total: f64,
    h_total: f64,
) -> Option<SplitCandidate> {
    let parent = score(g_total, h_total, params.lambda);
    let mut best: Option<SplitCandidate> = None;
    let mut sorted: Vec<(f64, f64, f64)> = Vec::with_capacity(samples.len());

    for &feature in features {
        sorted.clear();
        sorted.extend(
            samples
                .iter()
                .map(|&i| (view.rows[i][feature], view.grad[i], view.hess[i])),
        );
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (mut gl, mut hl) = (0.0, 0.0);
        for k in 0..sorted.len() - 1 {
            gl += sorted[k].1;
            hl += sorted[k].2;
            let (x, next) = (sorted[k].0, sorted[k + 1].0);
            if x == next {
                continue;
            }
            let (gr, hr) = (g_total - gl, h_total - hl);
            if hl < params.min_child_weight || hr < params.min_child_weight {
                continue;
            }
            let gain = 0.5
                * (score(gl, hl, params.lambda) + score(gr, hr, params.lambda) - parent)
                - params.gamma;
            if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: x + (next - x) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

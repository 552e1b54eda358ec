//! Held-out evaluation metrics.
//!
//! Reporting only: none of these gate whether artifacts are written.

use serde::{Deserialize, Serialize};

/// Decision threshold used for accuracy and the per-class report.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Precision/recall summary for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Metrics computed on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// `None` when the test partition holds a single class
    pub roc_auc: Option<f64>,
    pub brier_score: f64,
    /// Report for label 0 then label 1
    pub per_class: Vec<ClassMetrics>,
    pub test_size: usize,
}

impl EvaluationMetrics {
    /// Compute every metric from labels and positive-class probabilities.
    ///
    /// Returns `None` when the inputs are empty or of different lengths.
    #[must_use]
    pub fn compute(labels: &[u8], probabilities: &[f64]) -> Option<Self> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return None;
        }
        let predicted: Vec<u8> = probabilities
            .iter()
            .map(|&p| u8::from(p >= DECISION_THRESHOLD))
            .collect();

        Some(Self {
            accuracy: accuracy(labels, &predicted),
            roc_auc: roc_auc(labels, probabilities),
            brier_score: brier_score(labels, probabilities),
            per_class: [0u8, 1].map(|c| class_metrics(c, labels, &predicted)).to_vec(),
            test_size: labels.len(),
        })
    }
}

/// Fraction of exact label matches.
#[must_use]
pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = labels.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / labels.len() as f64
}

/// Mean squared error between probability and outcome.
#[must_use]
pub fn brier_score(labels: &[u8], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let sum: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| (p - f64::from(y)).powi(2))
        .sum();
    sum / labels.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic; ties count one half.
///
/// `None` if only one class is present.
#[must_use]
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average 1-based ranks over tied groups.
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&y, _)| y == 1)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

fn class_metrics(class: u8, labels: &[u8], predicted: &[u8]) -> ClassMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&y, &p) in labels.iter().zip(predicted) {
        match (y == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics {
        label: class,
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

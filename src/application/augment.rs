//! Synthetic record generation for the extremes of the risk spectrum.
//!
//! Public heart-disease datasets under-represent both very healthy young
//! patients and patients with many co-occurring risk factors. The augmentor
//! appends a fixed number of clearly-labeled records from each tier before the
//! train/test split.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{FeatureRecord, LabeledRecord};

/// Generates labeled synthetic records for the two risk tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAugmentor {
    per_tier: usize,
}

impl Default for DataAugmentor {
    fn default() -> Self {
        Self::new(50)
    }
}

fn choose<R: Rng + ?Sized>(rng: &mut R, options: &[i32]) -> i32 {
    options.choose(rng).copied().unwrap_or_default()
}

impl DataAugmentor {
    /// Augmentor emitting `per_tier` records for each tier.
    #[must_use]
    pub fn new(per_tier: usize) -> Self {
        Self { per_tier }
    }

    /// Records generated per tier.
    #[must_use]
    pub fn per_tier(&self) -> usize {
        self.per_tier
    }

    /// One young, healthy record (label 0).
    pub fn low_risk_record<R: Rng + ?Sized>(rng: &mut R) -> LabeledRecord {
        LabeledRecord {
            features: FeatureRecord {
                age: rng.gen_range(25..35),
                sex: choose(rng, &[0, 1]),
                cp: 0,
                trestbps: rng.gen_range(110..120),
                chol: rng.gen_range(150..180),
                fbs: 0,
                restecg: 0,
                thalach: rng.gen_range(160..180),
                exang: 0,
                oldpeak: rng.gen_range(0.0..0.2),
                slope: 0,
                ca: 0,
                thal: 1,
            },
            target: 0,
        }
    }

    /// One record with many co-occurring risk factors (label 1).
    pub fn high_risk_record<R: Rng + ?Sized>(rng: &mut R) -> LabeledRecord {
        LabeledRecord {
            features: FeatureRecord {
                age: rng.gen_range(55..70),
                sex: 1,
                cp: choose(rng, &[1, 2, 3]),
                trestbps: rng.gen_range(140..180),
                chol: rng.gen_range(250..350),
                fbs: 1,
                restecg: choose(rng, &[1, 2]),
                thalach: rng.gen_range(100..130),
                exang: 1,
                oldpeak: rng.gen_range(2.0..4.0),
                slope: choose(rng, &[1, 2]),
                ca: choose(rng, &[2, 3]),
                thal: 3,
            },
            target: 1,
        }
    }

    /// All synthetic records: the low-risk tier followed by the high-risk tier.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<LabeledRecord> {
        let mut out = Vec::with_capacity(self.per_tier * 2);
        out.extend((0..self.per_tier).map(|_| Self::low_risk_record(rng)));
        out.extend((0..self.per_tier).map(|_| Self::high_risk_record(rng)));
        out
    }

    /// Append the synthetic records to `base`.
    pub fn augment<R: Rng + ?Sized>(
        &self,
        mut base: Vec<LabeledRecord>,
        rng: &mut R,
    ) -> Vec<LabeledRecord> {
        let before = base.len();
        base.extend(self.generate(rng));
        tracing::info!(
            "Augmented dataset: {} original + {} synthetic records",
            before,
            base.len() - before
        );
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_generates_per_tier_counts_in_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let records = DataAugmentor::new(10).generate(&mut rng);
        assert_eq!(records.len(), 20);
        assert!(records[..10].iter().all(|r| r.target == 0));
        assert!(records[10..].iter().all(|r| r.target == 1));
    }

    #[test]
    fn test_synthetic_records_stay_in_tier_ranges() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        for _ in 0..200 {
            let lo = DataAugmentor::low_risk_record(&mut rng).features;
            assert!((25..35).contains(&lo.age));
            assert!((110..120).contains(&lo.trestbps));
            assert!((150..180).contains(&lo.chol));
            assert!((160..180).contains(&lo.thalach));
            assert!((0.0..0.2).contains(&lo.oldpeak));
            assert!(lo.sex <= 1);
            assert_eq!((lo.cp, lo.ca, lo.thal), (0, 0, 1));

            let hi = DataAugmentor::high_risk_record(&mut rng).features;
            assert!((55..70).contains(&hi.age));
            assert!((140..180).contains(&hi.trestbps));
            assert!((250..350).contains(&hi.chol));
            assert!((100..130).contains(&hi.thalach));
            assert!((2.0..4.0).contains(&hi.oldpeak));
            assert!((1..=3).contains(&hi.cp));
            assert!((1..=2).contains(&hi.restecg));
            assert!((1..=2).contains(&hi.slope));
            assert!((2..=3).contains(&hi.ca));
            assert_eq!((hi.sex, hi.fbs, hi.exang, hi.thal), (1, 1, 1, 3));
        }
    }

    #[test]
    fn test_synthetic_records_pass_validation() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for record in DataAugmentor::new(100).generate(&mut rng) {
            assert_eq!(record.features.validate(), Ok(()));
        }
    }

    #[test]
    fn test_augment_is_reproducible_for_seed() {
        let augmentor = DataAugmentor::default();
        let a = augmentor.augment(Vec::new(), &mut ChaCha20Rng::seed_from_u64(42));
        let b = augmentor.augment(Vec::new(), &mut ChaCha20Rng::seed_from_u64(42));
        assert_eq!(a.len(), 100);
        assert_eq!(a, b);
    }
}

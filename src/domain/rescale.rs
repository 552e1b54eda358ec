//! Clinical risk rescaling.
//!
//! Piecewise-linear stretch applied to the calibrated probability. The
//! calibrator compresses both tails; this remap widens the gap between the
//! moderate and high tiers. It is a heuristic and breaks strict calibration.

/// Lower bound and multiplier of each segment, in ascending order.
const SEGMENTS: [(f64, f64); 5] = [(0.0, 0.8), (0.2, 1.0), (0.4, 1.2), (0.6, 1.3), (0.8, 1.4)];

/// Remap a calibrated probability to a clinical risk fraction in `[0, 1]`.
///
/// Input is clamped to `[0, 1]` first. NaN maps to NaN; callers reject
/// non-finite probabilities before rescaling.
#[must_use]
pub fn rescale(probability: f64) -> f64 {
    if probability.is_nan() {
        return probability;
    }
    let p = probability.clamp(0.0, 1.0);
    let factor = SEGMENTS
        .iter()
        .rev()
        .find(|(lower, _)| p >= *lower)
        .map_or(SEGMENTS[0].1, |&(_, factor)| factor);
    (p * factor).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_reference_values() {
        assert!((rescale(0.1) - 0.08).abs() < TOL);
        assert!((rescale(0.3) - 0.3).abs() < TOL);
        assert!((rescale(0.5) - 0.6).abs() < TOL);
        assert!((rescale(0.7) - 0.91).abs() < TOL);
        assert!((rescale(0.9) - 1.0).abs() < TOL);
    }

    #[test]
    fn test_segment_lower_bounds_are_inclusive() {
        assert!((rescale(0.2) - 0.2).abs() < TOL);
        assert!((rescale(0.4) - 0.48).abs() < TOL);
        assert!((rescale(0.6) - 0.78).abs() < TOL);
        assert!((rescale(0.8) - 1.0).abs() < TOL);
    }

    #[test]
    fn test_clamped_range() {
        assert_eq!(rescale(0.0), 0.0);
        assert_eq!(rescale(1.0), 1.0);
        assert_eq!(rescale(-0.5), 0.0);
        assert_eq!(rescale(3.0), 1.0);
        assert!(rescale(f64::NAN).is_nan());
    }

    #[test]
    fn test_monotone_within_segments() {
        for &(lower, _) in &SEGMENTS {
            let upper = (lower + 0.2).min(1.0);
            let mut prev = rescale(lower);
            let mut p = lower;
            while p < upper - 1e-9 {
                let r = rescale(p);
                assert!(r >= prev, "rescale not monotone at {p}");
                prev = r;
                p += 0.001;
            }
        }
    }

    #[test]
    fn test_boundary_jumps_are_upward() {
        // Every boundary jump is upward: 0.16->0.2, 0.4->0.48, 0.72->0.78, 1.04->1.0 (capped).
        for boundary in [0.2, 0.4, 0.6, 0.8] {
            let below = rescale(boundary - 1e-9);
            let at = rescale(boundary);
            assert!(at >= below - 1e-6, "drop at {boundary}: {below} -> {at}");
        }
    }

    #[test]
    fn test_globally_non_decreasing() {
        let mut prev = 0.0;
        for i in 0..=1000 {
            let r = rescale(f64::from(i) / 1000.0);
            assert!(r >= prev - 1e-12);
            prev = r;
        }
    }
}

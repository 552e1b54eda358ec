//! Risk assessment result types.
//!
//! A [`RiskAssessment`] is the single value handed to presentation layers
//! (gauge chart, PDF report, narrated audio).

use serde::{Deserialize, Serialize};

/// Risk band shown on the gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Below 20%
    Low,
    /// 20% to 40%
    Moderate,
    /// 40% and above
    High,
}

impl RiskLevel {
    /// Band for a risk score on the 0-100 scale.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            Self::Low
        } else if score < 40.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Which section of the report a recommendation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    UrgentActions,
    PreventiveMeasures,
    Lifestyle,
    Diet,
    PhysicalActivity,
}

/// One categorized block of advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub category: String,
    pub advice: String,
    pub steps: Vec<String>,
}

impl Recommendation {
    pub(crate) fn new(
        kind: RecommendationKind,
        category: &str,
        advice: &str,
        steps: &[&str],
    ) -> Self {
        Self {
            kind,
            category: category.to_string(),
            advice: advice.to_string(),
            steps: steps.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Scored and explained result for one feature record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Calibrated model probability in `[0, 1]`
    pub raw_probability: f64,

    /// Rescaled clinical risk in `[0, 100]`
    pub risk_score: f64,

    /// Gauge band for `risk_score`
    pub risk_level: RiskLevel,

    /// Ordered recommendation blocks
    pub recommendations: Vec<Recommendation>,
}

impl RiskAssessment {
    /// Risk score as a fraction in `[0, 1]`.
    #[must_use]
    pub fn risk_fraction(&self) -> f64 {
        self.risk_score / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(39.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(55.0).to_string(), "HIGH");
    }

    #[test]
    fn test_assessment_serializes() {
        let a = RiskAssessment {
            raw_probability: 0.5,
            risk_score: 60.0,
            risk_level: RiskLevel::High,
            recommendations: vec![Recommendation::new(
                RecommendationKind::Diet,
                "Dietary Guidelines",
                "Eat well.",
                &["Vegetables"],
            )],
        };
        let json = serde_json::to_string(&a).expect("serialize");
        assert!(json.contains("\"risk_level\":\"High\""));
        assert!(json.contains("\"kind\":\"diet\""));
        assert!((a.risk_fraction() - 0.6).abs() < 1e-12);
    }
}

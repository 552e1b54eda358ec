//! Personalized recommendation engine.
//!
//! Always yields four blocks in a fixed order: risk-tier actions, lifestyle
//! modifications, dietary guidelines, physical activity plan.

use super::assessment::{Recommendation, RecommendationKind};
use super::features::FeatureRecord;

/// Risk fraction above which the urgent branches are chosen.
pub const URGENT_RISK_THRESHOLD: f64 = 0.5;

/// Resting blood pressure above which sodium/DASH advice is added.
pub const BP_THRESHOLD: i32 = 130;

/// Cholesterol above which lipid advice is added.
pub const CHOL_THRESHOLD: i32 = 200;

/// Max heart rate below which graduated-exercise advice is added.
pub const THALACH_THRESHOLD: i32 = 150;

const URGENT_STEPS: &[&str] = &[
    "Schedule an appointment with a cardiologist within the next week",
    "Begin monitoring your blood pressure daily and keep a log",
    "Start keeping a detailed health diary of any symptoms",
    "Review your current medications with your doctor",
    "Consider scheduling a stress test evaluation",
    "Have an emergency contact plan ready",
];

const PREVENTIVE_STEPS: &[&str] = &[
    "Schedule regular check-ups with your primary care physician",
    "Maintain a consistent exercise routine",
    "Keep tracking your blood pressure periodically",
    "Focus on heart-healthy dietary choices",
    "Stay up to date with your health screenings",
];

const BLOOD_PRESSURE_STEPS: &[&str] = &[
    "Reduce sodium intake to less than 2,300mg daily (about 1 teaspoon of salt)",
    "Practice stress-reduction techniques like deep breathing or meditation",
    "Consider following the DASH diet approach for blood pressure control",
    "Limit alcohol consumption to moderate levels",
];

const CHOLESTEROL_STEPS: &[&str] = &[
    "Increase consumption of omega-3 rich foods like fatty fish",
    "Reduce saturated fat intake from red meat and dairy",
    "Add more fiber to your diet through whole grains and vegetables",
    "Consider adding plant sterols to your diet",
];

const HEART_RATE_STEPS: &[&str] = &[
    "Start a graduated exercise program approved by your doctor",
    "Consider cardiac rehabilitation if recommended",
    "Focus on aerobic exercises like walking, swimming, or cycling",
    "Build up your exercise tolerance gradually",
];

const EXERCISE_ANGINA_STEPS: &[&str] = &[
    "Work with a physical therapist for safe exercise planning",
    "Learn to recognize exercise-related warning signs",
    "Keep nitroglycerin handy if prescribed by your doctor",
    "Avoid exercising in extreme temperatures",
];

const GENERAL_LIFESTYLE_STEPS: &[&str] = &[
    "Aim for 7-8 hours of quality sleep each night",
    "Practice stress management techniques regularly",
    "Maintain a healthy weight through balanced diet and exercise",
    "Avoid smoking and limit exposure to secondhand smoke",
];

const DIET_STEPS: &[&str] = &[
    "Eat a variety of colorful fruits and vegetables daily (aim for 5-7 servings)",
    "Choose whole grains over refined grains (brown rice, whole wheat bread)",
    "Select lean proteins like fish, chicken, and plant-based options",
    "Limit processed foods and added sugars",
    "Stay hydrated with water throughout the day (aim for 8 glasses)",
    "Use healthy cooking methods like grilling, baking, or steaming",
];

const SUPERVISED_ACTIVITY_STEPS: &[&str] = &[
    "Begin with supervised exercise sessions under medical guidance",
    "Start with short, low-intensity walks (5-10 minutes)",
    "Gradually increase activity as approved by your doctor",
    "Monitor your heart rate during exercise",
    "Stop activity immediately if you experience chest pain or shortness of breath",
    "Consider joining a cardiac rehabilitation program",
];

const GENERAL_ACTIVITY_STEPS: &[&str] = &[
    "Aim for 150 minutes of moderate activity weekly (30 minutes, 5 days/week)",
    "Include both cardio and strength training in your routine",
    "Try activities like brisk walking, swimming, or cycling",
    "Exercise with a partner when possible for motivation and safety",
    "Track your progress with a fitness app or journal",
    "Make exercise a fun part of your daily routine",
];

/// Build the recommendation set for a record and its risk fraction (`0..=1`).
#[must_use]
pub fn recommend(record: &FeatureRecord, risk_score: f64) -> Vec<Recommendation> {
    let urgent = risk_score > URGENT_RISK_THRESHOLD;

    vec![
        risk_tier_actions(urgent),
        lifestyle_modifications(record),
        Recommendation::new(
            RecommendationKind::Diet,
            "Dietary Guidelines",
            "Your diet plays a crucial role in heart health. Here are some simple guidelines:",
            DIET_STEPS,
        ),
        Recommendation::new(
            RecommendationKind::PhysicalActivity,
            "Physical Activity Plan",
            "Regular physical activity is essential for heart health. Here's a plan for you:",
            if urgent {
                SUPERVISED_ACTIVITY_STEPS
            } else {
                GENERAL_ACTIVITY_STEPS
            },
        ),
    ]
}

fn risk_tier_actions(urgent: bool) -> Recommendation {
    if urgent {
        Recommendation::new(
            RecommendationKind::UrgentActions,
            "Immediate Actions Required",
            "Please take these steps as soon as possible to protect your heart health:",
            URGENT_STEPS,
        )
    } else {
        Recommendation::new(
            RecommendationKind::PreventiveMeasures,
            "Preventive Measures",
            "Great job! Here are some steps to keep your heart healthy:",
            PREVENTIVE_STEPS,
        )
    }
}

fn lifestyle_modifications(record: &FeatureRecord) -> Recommendation {
    let triggered: [(bool, &[&str]); 4] = [
        (record.trestbps > BP_THRESHOLD, BLOOD_PRESSURE_STEPS),
        (record.chol > CHOL_THRESHOLD, CHOLESTEROL_STEPS),
        (record.thalach < THALACH_THRESHOLD, HEART_RATE_STEPS),
        (record.exang == 1, EXERCISE_ANGINA_STEPS),
    ];

    let mut steps: Vec<&str> = triggered
        .iter()
        .filter(|(hit, _)| *hit)
        .flat_map(|(_, items)| items.iter().copied())
        .collect();
    if steps.is_empty() {
        steps.extend_from_slice(GENERAL_LIFESTYLE_STEPS);
    }

    Recommendation::new(
        RecommendationKind::Lifestyle,
        "Lifestyle Modifications",
        "Here are some lifestyle changes that can make a big difference:",
        &steps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::{high_risk_case, low_risk_case};

    fn kinds(recs: &[Recommendation]) -> Vec<RecommendationKind> {
        recs.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_four_categories_in_order() {
        for score in [0.0, 0.3, 0.5, 0.51, 1.0] {
            for record in [high_risk_case(), low_risk_case()] {
                let recs = recommend(&record, score);
                assert_eq!(recs.len(), 4);
                assert_eq!(recs[1].kind, RecommendationKind::Lifestyle);
                assert_eq!(recs[2].kind, RecommendationKind::Diet);
                assert_eq!(recs[3].kind, RecommendationKind::PhysicalActivity);
                assert!(recs.iter().all(|r| !r.steps.is_empty()));
            }
        }
    }

    #[test]
    fn test_urgent_branch_strictly_above_half() {
        let at = recommend(&low_risk_case(), 0.5);
        assert_eq!(at[0].kind, RecommendationKind::PreventiveMeasures);
        assert_eq!(at[0].steps.len(), 5);
        assert_eq!(at[3].steps, GENERAL_ACTIVITY_STEPS);

        let above = recommend(&low_risk_case(), 0.500_001);
        assert_eq!(above[0].kind, RecommendationKind::UrgentActions);
        assert_eq!(above[0].category, "Immediate Actions Required");
        assert_eq!(above[0].steps.len(), 6);
        assert_eq!(above[3].steps, SUPERVISED_ACTIVITY_STEPS);
    }

    #[test]
    fn test_high_risk_case_triggers_every_lifestyle_block() {
        let recs = recommend(&high_risk_case(), 0.9);
        assert_eq!(recs[0].kind, RecommendationKind::UrgentActions);

        let lifestyle = &recs[1].steps;
        assert_eq!(lifestyle.len(), 16);
        assert_eq!(lifestyle[0], BLOOD_PRESSURE_STEPS[0]);
        assert!(lifestyle[0].starts_with("Reduce sodium"));
        assert_eq!(lifestyle[4], CHOLESTEROL_STEPS[0]);
        assert!(lifestyle[4].contains("omega-3"));
        assert_eq!(lifestyle[8], HEART_RATE_STEPS[0]);
        assert!(lifestyle[8].contains("graduated exercise"));
        assert_eq!(lifestyle[12], EXERCISE_ANGINA_STEPS[0]);
    }

    #[test]
    fn test_low_risk_case_uses_fallback() {
        let recs = recommend(&low_risk_case(), 0.05);
        assert_eq!(recs[0].kind, RecommendationKind::PreventiveMeasures);
        assert_eq!(recs[1].steps, GENERAL_LIFESTYLE_STEPS);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let mut r = low_risk_case();
        r.trestbps = 130;
        r.chol = 200;
        r.thalach = 150;
        assert_eq!(recommend(&r, 0.1)[1].steps, GENERAL_LIFESTYLE_STEPS);

        r.chol = 201;
        assert_eq!(recommend(&r, 0.1)[1].steps, CHOLESTEROL_STEPS);
    }

    #[test]
    fn test_diet_block_is_unconditional() {
        let a = recommend(&high_risk_case(), 0.9);
        let b = recommend(&low_risk_case(), 0.1);
        assert_eq!(a[2], b[2]);
        assert_eq!(a[2].steps.len(), 6);
    }

    #[test]
    fn test_deterministic() {
        let r = high_risk_case();
        assert_eq!(recommend(&r, 0.7), recommend(&r, 0.7));
        assert_eq!(
            kinds(&recommend(&r, 0.7)),
            vec![
                RecommendationKind::UrgentActions,
                RecommendationKind::Lifestyle,
                RecommendationKind::Diet,
                RecommendationKind::PhysicalActivity,
            ]
        );
    }
}

//! Clinical feature schema for heart-disease risk prediction.
//!
//! Thirteen measurements from the Cleveland heart-disease dataset. The order of
//! [`Feature::ALL`] is the column order every scaler and model is fit with; it is
//! a compile-time contract rather than a map iteration order.

use serde::{Deserialize, Serialize};

/// Number of model input features.
pub const FEATURE_COUNT: usize = 13;

/// One model input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Age in years
    Age,
    /// 0 = female, 1 = male
    Sex,
    /// Chest pain type (0 typical angina .. 3 asymptomatic)
    Cp,
    /// Resting blood pressure in mmHg
    Trestbps,
    /// Serum cholesterol in mg/dL
    Chol,
    /// Fasting blood sugar > 120 mg/dL
    Fbs,
    /// Resting ECG result
    Restecg,
    /// Maximum heart rate achieved
    Thalach,
    /// Exercise induced angina
    Exang,
    /// ST depression induced by exercise relative to rest
    Oldpeak,
    /// Slope of the peak exercise ST segment
    Slope,
    /// Number of major vessels colored by fluoroscopy
    Ca,
    /// Thalassemia code
    Thal,
}

/// Declared valid domain of a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureDomain {
    /// Closed integer interval.
    Integer { min: i64, max: i64 },
    /// Closed real interval.
    Real { min: f64, max: f64 },
    /// Finite set of codes.
    Categorical(&'static [u8]),
}

impl FeatureDomain {
    /// Whether `value` lies inside the domain.
    ///
    /// NaN and infinities are never contained.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match *self {
            Self::Integer { min, max } => (min as f64..=max as f64).contains(&value),
            Self::Real { min, max } => (min..=max).contains(&value),
            Self::Categorical(codes) => {
                value.fract() == 0.0 && codes.iter().any(|&c| f64::from(c) == value)
            }
        }
    }

    /// Bounds rendered for messages, `None` for categorical domains.
    #[must_use]
    pub fn bounds_display(&self) -> Option<(String, String)> {
        match *self {
            Self::Integer { min, max } => Some((min.to_string(), max.to_string())),
            Self::Real { min, max } => Some((format!("{min:.1}"), format!("{max:.1}"))),
            Self::Categorical(_) => None,
        }
    }
}

impl Feature {
    /// All features in model column order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Age,
        Feature::Sex,
        Feature::Cp,
        Feature::Trestbps,
        Feature::Chol,
        Feature::Fbs,
        Feature::Restecg,
        Feature::Thalach,
        Feature::Exang,
        Feature::Oldpeak,
        Feature::Slope,
        Feature::Ca,
        Feature::Thal,
    ];

    /// Column name as it appears in datasets and artifacts.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Cp => "cp",
            Self::Trestbps => "trestbps",
            Self::Chol => "chol",
            Self::Fbs => "fbs",
            Self::Restecg => "restecg",
            Self::Thalach => "thalach",
            Self::Exang => "exang",
            Self::Oldpeak => "oldpeak",
            Self::Slope => "slope",
            Self::Ca => "ca",
            Self::Thal => "thal",
        }
    }

    /// Capitalized name used in user-facing messages.
    #[must_use]
    pub fn label(self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    /// Position of this feature in the model input vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Valid domain for this feature.
    #[must_use]
    pub fn domain(self) -> FeatureDomain {
        match self {
            Self::Age => FeatureDomain::Integer { min: 20, max: 100 },
            Self::Trestbps => FeatureDomain::Integer { min: 80, max: 200 },
            Self::Chol => FeatureDomain::Integer { min: 100, max: 600 },
            Self::Thalach => FeatureDomain::Integer { min: 60, max: 220 },
            Self::Oldpeak => FeatureDomain::Real { min: 0.0, max: 10.0 },
            Self::Ca => FeatureDomain::Integer { min: 0, max: 3 },
            Self::Sex | Self::Fbs | Self::Exang => FeatureDomain::Categorical(&[0, 1]),
            Self::Cp => FeatureDomain::Categorical(&[0, 1, 2, 3]),
            Self::Restecg | Self::Slope => FeatureDomain::Categorical(&[0, 1, 2]),
            // Dataset encoding: 1 normal, 2 fixed defect, 3 reversible defect; 0 = unrecorded.
            Self::Thal => FeatureDomain::Categorical(&[0, 1, 2, 3]),
        }
    }

    /// Column names in model order, as stored in artifacts.
    #[must_use]
    pub fn ordered_names() -> Vec<String> {
        Self::ALL.iter().map(|f| f.name().to_string()).collect()
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// A complete set of the thirteen clinical measurements.
///
/// Fields hold raw, unvalidated values. Every integer field, categorical codes
/// included, is `i32` so that out-of-domain input such as `sex = -1` can be
/// represented and rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub age: i32,
    pub sex: i32,
    pub cp: i32,
    pub trestbps: i32,
    pub chol: i32,
    pub fbs: i32,
    pub restecg: i32,
    pub thalach: i32,
    pub exang: i32,
    pub oldpeak: f64,
    pub slope: i32,
    pub ca: i32,
    pub thal: i32,
}

impl FeatureRecord {
    /// Raw value of one feature.
    #[must_use]
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Age => f64::from(self.age),
            Feature::Sex => f64::from(self.sex),
            Feature::Cp => f64::from(self.cp),
            Feature::Trestbps => f64::from(self.trestbps),
            Feature::Chol => f64::from(self.chol),
            Feature::Fbs => f64::from(self.fbs),
            Feature::Restecg => f64::from(self.restecg),
            Feature::Thalach => f64::from(self.thalach),
            Feature::Exang => f64::from(self.exang),
            Feature::Oldpeak => self.oldpeak,
            Feature::Slope => f64::from(self.slope),
            Feature::Ca => f64::from(self.ca),
            Feature::Thal => f64::from(self.thal),
        }
    }

    /// Convert to a model input vector in [`Feature::ALL`] order.
    #[must_use]
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|f| self.value(f))
    }
}

/// A feature record where any field may be absent.
///
/// Validation skips absent fields; scoring requires [`PartialFeatureRecord::complete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialFeatureRecord {
    pub age: Option<i32>,
    pub sex: Option<i32>,
    pub cp: Option<i32>,
    pub trestbps: Option<i32>,
    pub chol: Option<i32>,
    pub fbs: Option<i32>,
    pub restecg: Option<i32>,
    pub thalach: Option<i32>,
    pub exang: Option<i32>,
    pub oldpeak: Option<f64>,
    pub slope: Option<i32>,
    pub ca: Option<i32>,
    pub thal: Option<i32>,
}

impl PartialFeatureRecord {
    /// Raw value of one feature, if present.
    #[must_use]
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Age => self.age.map(f64::from),
            Feature::Sex => self.sex.map(f64::from),
            Feature::Cp => self.cp.map(f64::from),
            Feature::Trestbps => self.trestbps.map(f64::from),
            Feature::Chol => self.chol.map(f64::from),
            Feature::Fbs => self.fbs.map(f64::from),
            Feature::Restecg => self.restecg.map(f64::from),
            Feature::Thalach => self.thalach.map(f64::from),
            Feature::Exang => self.exang.map(f64::from),
            Feature::Oldpeak => self.oldpeak,
            Feature::Slope => self.slope.map(f64::from),
            Feature::Ca => self.ca.map(f64::from),
            Feature::Thal => self.thal.map(f64::from),
        }
    }

    /// Features that are not set, in model order.
    #[must_use]
    pub fn missing(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|&f| self.value(f).is_none())
            .collect()
    }

    /// Promote to a complete record.
    ///
    /// # Errors
    /// Returns the first absent feature in model order.
    pub fn complete(&self) -> Result<FeatureRecord, Feature> {
        fn req<T>(v: Option<T>, feature: Feature) -> Result<T, Feature> {
            v.ok_or(feature)
        }

        Ok(FeatureRecord {
            age: req(self.age, Feature::Age)?,
            sex: req(self.sex, Feature::Sex)?,
            cp: req(self.cp, Feature::Cp)?,
            trestbps: req(self.trestbps, Feature::Trestbps)?,
            chol: req(self.chol, Feature::Chol)?,
            fbs: req(self.fbs, Feature::Fbs)?,
            restecg: req(self.restecg, Feature::Restecg)?,
            thalach: req(self.thalach, Feature::Thalach)?,
            exang: req(self.exang, Feature::Exang)?,
            oldpeak: req(self.oldpeak, Feature::Oldpeak)?,
            slope: req(self.slope, Feature::Slope)?,
            ca: req(self.ca, Feature::Ca)?,
            thal: req(self.thal, Feature::Thal)?,
        })
    }
}

impl From<FeatureRecord> for PartialFeatureRecord {
    fn from(r: FeatureRecord) -> Self {
        Self {
            age: Some(r.age),
            sex: Some(r.sex),
            cp: Some(r.cp),
            trestbps: Some(r.trestbps),
            chol: Some(r.chol),
            fbs: Some(r.fbs),
            restecg: Some(r.restecg),
            thalach: Some(r.thalach),
            exang: Some(r.exang),
            oldpeak: Some(r.oldpeak),
            slope: Some(r.slope),
            ca: Some(r.ca),
            thal: Some(r.thal),
        }
    }
}

/// A feature record with its binary disease label, as used for training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub features: FeatureRecord,
    /// 1 = heart disease present
    pub target: u8,
}

/// The two reference patients scored after every training run.
pub mod reference {
    use super::FeatureRecord;

    /// Named reference cases, high risk first.
    #[must_use]
    pub fn cases() -> [(&'static str, FeatureRecord); 2] {
        [
            ("High Risk Case", high_risk_case()),
            ("Low Risk Case", low_risk_case()),
        ]
    }

    /// Older male with several risk factors.
    #[must_use]
    pub fn high_risk_case() -> FeatureRecord {
        FeatureRecord {
            age: 58,
            sex: 1,
            cp: 1,
            trestbps: 144,
            chol: 256,
            fbs: 1,
            restecg: 1,
            thalach: 115,
            exang: 1,
            oldpeak: 1.5,
            slope: 1,
            ca: 1,
            thal: 3,
        }
    }

    /// Young female with no threshold breaches.
    #[must_use]
    pub fn low_risk_case() -> FeatureRecord {
        FeatureRecord {
            age: 32,
            sex: 0,
            cp: 0,
            trestbps: 115,
            chol: 170,
            fbs: 0,
            restecg: 0,
            thalach: 165,
            exang: 0,
            oldpeak: 0.1,
            slope: 0,
            ca: 0,
            thal: 1,
        }
    }
}

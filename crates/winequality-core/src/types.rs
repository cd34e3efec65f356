//! Core types for WineQuality

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of physicochemical measurements the model consumes
pub const FEATURE_COUNT: usize = 11;

/// Inclusive range accepted for one input field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    /// Field name as it appears on the wire
    pub name: &'static str,

    /// Smallest accepted value
    pub min: f64,

    /// Largest accepted value
    pub max: f64,
}

impl FieldBounds {
    const fn new(name: &'static str, min: f64, max: f64) -> Self {
        Self { name, min, max }
    }

    /// Check a single value against this range
    pub fn check(&self, value: f64) -> Option<FieldViolation> {
        let kind = if !value.is_finite() {
            ViolationKind::NotFinite
        } else if value < self.min {
            ViolationKind::BelowMinimum { min: self.min }
        } else if value > self.max {
            ViolationKind::AboveMaximum { max: self.max }
        } else {
            return None;
        };

        Some(FieldViolation {
            field: self.name,
            value,
            kind,
        })
    }
}

/// Accepted range of every field, in model feature order.
///
/// The position of each entry is the column the value occupies in the
/// feature matrix. The trained model depends on this order; reordering it
/// silently produces wrong predictions.
pub const FEATURE_BOUNDS: [FieldBounds; FEATURE_COUNT] = [
    FieldBounds::new("fixed_acidity", 7.0, 8.0),
    FieldBounds::new("volatile_acidity", 0.4, 0.7),
    FieldBounds::new("citric_acid", 0.0, 0.1),
    FieldBounds::new("residual_sugar", 1.0, 2.5),
    FieldBounds::new("chlorides", 0.085, 0.15),
    FieldBounds::new("free_sulfur_dioxide", 0.0, 15.0),
    FieldBounds::new("total_sulfur_dioxide", 0.0, 30.0),
    FieldBounds::new("density", 0.996, 0.998),
    FieldBounds::new("pH", 3.2, 3.4),
    FieldBounds::new("sulphates", 0.50, 0.75),
    FieldBounds::new("alcohol", 9.0, 10.0),
];

/// Feature names in model column order
pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURE_BOUNDS.iter().map(|b| b.name)
}

/// Physicochemical measurements of one wine sample, as received
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WineSample {
    pub fixed_acidity: f64,
    pub volatile_acidity: f64,
    pub citric_acid: f64,
    pub residual_sugar: f64,
    pub chlorides: f64,
    pub free_sulfur_dioxide: f64,
    pub total_sulfur_dioxide: f64,
    pub density: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub sulphates: f64,
    pub alcohol: f64,
}

impl WineSample {
    /// Field values in model feature order
    fn ordered_values(&self) -> [f64; FEATURE_COUNT] {
        [
            self.fixed_acidity,
            self.volatile_acidity,
            self.citric_acid,
            self.residual_sugar,
            self.chlorides,
            self.free_sulfur_dioxide,
            self.total_sulfur_dioxide,
            self.density,
            self.ph,
            self.sulphates,
            self.alcohol,
        ]
    }

    /// Check every field against [`FEATURE_BOUNDS`].
    ///
    /// All violations are reported, not only the first one.
    pub fn validate(self) -> std::result::Result<ValidatedSample, Vec<FieldViolation>> {
        let violations: Vec<_> = FEATURE_BOUNDS
            .iter()
            .zip(self.ordered_values())
            .filter_map(|(bounds, value)| bounds.check(value))
            .collect();

        if violations.is_empty() {
            Ok(ValidatedSample(self))
        } else {
            Err(violations)
        }
    }
}

/// A [`WineSample`] whose fields are all within bounds.
///
/// Only obtainable through [`WineSample::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedSample(WineSample);

impl ValidatedSample {
    /// Borrow the underlying sample
    pub fn sample(&self) -> &WineSample {
        &self.0
    }

    /// Build the ordered feature vector for inference
    pub fn features(&self) -> FeatureVector {
        FeatureVector(self.0.ordered_values())
    }
}

/// Ordered numeric encoding of a sample fed to the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Values in model column order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// How a field failed validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViolationKind {
    /// Value is smaller than the inclusive minimum
    BelowMinimum { min: f64 },
    /// Value is larger than the inclusive maximum
    AboveMaximum { max: f64 },
    /// NaN or infinite
    NotFinite,
}

impl ViolationKind {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BelowMinimum { .. } => "greater_than_equal",
            Self::AboveMaximum { .. } => "less_than_equal",
            Self::NotFinite => "finite_number",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            Self::BelowMinimum { min } => format!("Input should be greater than or equal to {min}"),
            Self::AboveMaximum { max } => format!("Input should be less than or equal to {max}"),
            Self::NotFinite => "Input should be a finite number".to_string(),
        }
    }
}

/// A single field that failed validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldViolation {
    /// Wire name of the offending field
    pub field: &'static str,

    /// The rejected value
    pub value: f64,

    /// Which bound was violated
    pub kind: ViolationKind,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}: {}", self.field, self.value, self.kind.message())
    }
}

/// Integer quality score returned to callers.
///
/// Always 5 or 6: the raw regression output is rounded to the nearest
/// integer and then clamped into [`QualityScore::MIN`, `QualityScore::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QualityScore(u8);

impl QualityScore {
    pub const MIN: u8 = 5;
    pub const MAX: u8 = 6;

    /// Round then clamp a raw model output.
    ///
    /// Rounds half away from zero. Fails on NaN or infinite outputs.
    pub fn from_raw(raw: f64) -> Result<Self> {
        if !raw.is_finite() {
            return Err(Error::inference(format!(
                "cannot convert non-finite prediction {raw} to a quality score"
            )));
        }

        let rounded = raw.round().clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        Ok(Self(rounded as u8))
    }

    /// The score as an integer
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

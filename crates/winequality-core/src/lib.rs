//! WineQuality Core
//!
//! Core types and error handling shared across WineQuality components.
//!
//! This crate provides:
//! - The wine sample input record and its field bounds
//! - Validation that collects every out-of-range field
//! - The ordered feature vector fed to the model
//! - The clamped integer quality score
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    feature_names, FeatureVector, FieldBounds, FieldViolation, QualityScore, ValidatedSample,
    ViolationKind, WineSample, FEATURE_BOUNDS, FEATURE_COUNT,
};

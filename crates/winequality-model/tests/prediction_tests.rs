//! End-to-end prediction tests against the bundled LightGBM fixture
//!
//! The fixture is a three-tree regression ensemble split on alcohol,
//! volatile acidity, sulphates, total sulfur dioxide and fixed acidity.

use proptest::prelude::*;
use std::path::PathBuf;
use winequality_core::WineSample;
use winequality_model::{
    model_info, predict_quality, GbdtModel, LinearModel, ModelConfig, ModelFormat, ModelHandle,
    ModelStatus,
};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wine_lgbm.txt")
}

fn fixture_handle() -> ModelHandle {
    let handle = ModelHandle::load(&ModelConfig::from_local(fixture_path()));
    assert!(handle.is_loaded(), "fixture model failed to load");
    handle
}

fn sample(
    fixed_acidity: f64,
    volatile_acidity: f64,
    total_sulfur_dioxide: f64,
    sulphates: f64,
    alcohol: f64,
) -> WineSample {
    WineSample {
        fixed_acidity,
        volatile_acidity,
        citric_acid: 0.04,
        residual_sugar: 1.9,
        chlorides: 0.092,
        free_sulfur_dioxide: 9.0,
        total_sulfur_dioxide,
        density: 0.9968,
        ph: 3.3,
        sulphates,
        alcohol,
    }
}

#[test]
fn test_fixture_metadata() {
    let model = GbdtModel::from_file(fixture_path()).unwrap();

    assert_eq!(model.num_trees(), 3);
    assert_eq!(model.objective().name(), "regression");
    assert_eq!(model.feature_names().len(), 11);
    assert_eq!(model.feature_names()[8], "pH");
}

#[test]
fn test_auto_detects_lightgbm() {
    let handle = fixture_handle();
    assert_eq!(handle.model().unwrap().format(), Some(ModelFormat::LightGbm));
}

#[test]
fn test_low_quality_wine() {
    // 5.25 - 0.12 - 0.03 = 5.10
    let wine = sample(7.2, 0.65, 25.0, 0.55, 9.2).validate().unwrap();
    assert_eq!(predict_quality(&fixture_handle(), &wine).unwrap().value(), 5);
}

#[test]
fn test_high_quality_wine() {
    // 5.85 + 0.14 + 0.04 = 6.03
    let wine = sample(7.8, 0.5, 12.0, 0.7, 9.8).validate().unwrap();
    assert_eq!(predict_quality(&fixture_handle(), &wine).unwrap().value(), 6);
}

#[test]
fn test_boundary_minimum_sample_is_scored() {
    let wine = WineSample {
        fixed_acidity: 7.0,
        volatile_acidity: 0.4,
        citric_acid: 0.0,
        residual_sugar: 1.0,
        chlorides: 0.085,
        free_sulfur_dioxide: 0.0,
        total_sulfur_dioxide: 0.0,
        density: 0.996,
        ph: 3.2,
        sulphates: 0.50,
        alcohol: 9.0,
    }
    .validate()
    .expect("minimum boundary must pass validation");

    let quality = predict_quality(&fixture_handle(), &wine).unwrap().value();
    assert!(quality == 5 || quality == 6);
}

#[test]
fn test_explicit_format_mismatch_yields_absent() {
    let config = ModelConfig::from_local(fixture_path()).with_format(ModelFormat::SafeTensors);
    let handle = ModelHandle::load(&config);

    assert!(!handle.is_loaded());
    assert_eq!(model_info(&handle).status, ModelStatus::NotLoaded);
}

#[test]
fn test_model_info_for_fixture() {
    let info = model_info(&fixture_handle());

    assert_eq!(info.status, ModelStatus::Loaded);
    assert_eq!(
        info.model_type.as_deref(),
        Some("winequality_model::gbdt::GbdtModel")
    );
    assert!(info
        .model_attributes
        .unwrap()
        .contains(&"predict".to_string()));
}

#[test]
fn test_linear_artifact_round_trip_through_handle() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("wine.safetensors");

    // quality ~= 0.6 * alcohol
    let mut coefficients = [0.0; 11];
    coefficients[10] = 0.6;
    LinearModel::from_coefficients(&coefficients, 0.0)
        .unwrap()
        .save(&path)
        .unwrap();

    let handle = ModelHandle::load(&ModelConfig::from_local(&path));
    let wine = sample(7.5, 0.5, 10.0, 0.6, 9.0).validate().unwrap();
    // 5.4 rounds to 5
    assert_eq!(predict_quality(&handle, &wine).unwrap().value(), 5);

    let wine = sample(7.5, 0.5, 10.0, 0.6, 10.0).validate().unwrap();
    assert_eq!(predict_quality(&handle, &wine).unwrap().value(), 6);
}

fn valid_sample() -> impl Strategy<Value = WineSample> {
    (
        (7.0..=8.0f64, 0.4..=0.7f64, 0.0..=0.1f64, 1.0..=2.5f64),
        (0.085..=0.15f64, 0.0..=15.0f64, 0.0..=30.0f64, 0.996..=0.998f64),
        (3.2..=3.4f64, 0.5..=0.75f64, 9.0..=10.0f64),
    )
        .prop_map(|((fa, va, ca, rs), (cl, fsd, tsd, de), (ph, su, al))| WineSample {
            fixed_acidity: fa,
            volatile_acidity: va,
            citric_acid: ca,
            residual_sugar: rs,
            chlorides: cl,
            free_sulfur_dioxide: fsd,
            total_sulfur_dioxide: tsd,
            density: de,
            ph,
            sulphates: su,
            alcohol: al,
        })
}

proptest! {
    #[test]
    fn prop_valid_samples_score_five_or_six(wine in valid_sample()) {
        let handle = fixture_handle();
        let valid = wine.validate().expect("strategy only generates in-range samples");

        let quality = predict_quality(&handle, &valid).unwrap().value();
        prop_assert!(quality == 5 || quality == 6);
    }

    #[test]
    fn prop_out_of_range_alcohol_rejected(alcohol in 10.0001..100.0f64) {
        let wine = WineSample { alcohol, ..sample(7.5, 0.5, 10.0, 0.6, 9.5) };
        prop_assert!(wine.validate().is_err());
    }
}

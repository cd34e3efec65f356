//! Quality prediction and model diagnostics
//!
//! Both services are plain functions over a shared [`ModelHandle`]; they hold
//! no state of their own and may run concurrently without coordination.

use crate::model_loader::ModelHandle;
use crate::regressor::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use winequality_core::{Error, QualityScore, Result, ValidatedSample};

/// Body returned by a successful prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub quality: QualityScore,
}

/// Predict the quality of a validated sample.
///
/// Builds the 1×11 feature matrix in bounds-table order, runs the model,
/// and rounds then clamps the first output into `[5, 6]`. Fails with
/// [`Error::ModelUnavailable`] when no model is loaded and with
/// [`Error::Inference`] for anything that goes wrong afterwards.
pub fn predict_quality(handle: &ModelHandle, sample: &ValidatedSample) -> Result<QualityScore> {
    let model = handle.model().ok_or(Error::ModelUnavailable)?;

    let features = FeatureMatrix::single_row(sample.features());

    let start = Instant::now();
    let outputs = model
        .regressor()
        .predict(&features)
        .map_err(into_inference_error)?;
    metrics::histogram!("winequality_inference_latency_us")
        .record(start.elapsed().as_micros() as f64);

    let raw = outputs
        .first()
        .copied()
        .ok_or_else(|| Error::inference("model returned no predictions"))?;
    let quality = QualityScore::from_raw(raw)?;

    debug!(raw, quality = quality.value(), "Predicted wine quality");
    Ok(quality)
}

fn into_inference_error(err: Error) -> Error {
    match err {
        Error::Inference(msg) => Error::Inference(msg),
        other => Error::inference(other.to_string()),
    }
}

/// Whether a model is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    #[serde(rename = "Model loaded")]
    Loaded,
    #[serde(rename = "Model not loaded")]
    NotLoaded,
}

/// Diagnostic description of the model handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub status: ModelStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_attributes: Option<Vec<String>>,
}

/// Report whether a model is loaded and describe it.
///
/// `model_attributes` is the fixed capability descriptor each regressor
/// declares, not runtime reflection.
pub fn model_info(handle: &ModelHandle) -> ModelInfo {
    match handle.model() {
        Some(model) => {
            let regressor = model.regressor();
            ModelInfo {
                status: ModelStatus::Loaded,
                model_type: Some(regressor.model_type().to_string()),
                model_attributes: Some(
                    regressor
                        .attributes()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                ),
            }
        }
        None => ModelInfo {
            status: ModelStatus::NotLoaded,
            model_type: None,
            model_attributes: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::CallableRegressor;
    use serde_json::json;
    use winequality_core::WineSample;

    fn sample() -> ValidatedSample {
        WineSample {
            fixed_acidity: 7.4,
            volatile_acidity: 0.5,
            citric_acid: 0.05,
            residual_sugar: 1.9,
            chlorides: 0.09,
            free_sulfur_dioxide: 11.0,
            total_sulfur_dioxide: 25.0,
            density: 0.997,
            ph: 3.3,
            sulphates: 0.6,
            alcohol: 9.5,
        }
        .validate()
        .unwrap()
    }

    fn constant(value: f64) -> ModelHandle {
        ModelHandle::from_regressor(CallableRegressor::new(move |_: &FeatureMatrix| {
            Ok(vec![value])
        }))
    }

    #[test]
    fn test_rounds_then_clamps() {
        assert_eq!(predict_quality(&constant(9.7), &sample()).unwrap().value(), 6);
        assert_eq!(predict_quality(&constant(2.1), &sample()).unwrap().value(), 5);
        assert_eq!(predict_quality(&constant(5.4), &sample()).unwrap().value(), 5);
        assert_eq!(predict_quality(&constant(5.6), &sample()).unwrap().value(), 6);
    }

    #[test]
    fn test_absent_model() {
        let err = predict_quality(&ModelHandle::Absent, &sample()).unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable));
    }

    #[test]
    fn test_empty_output_is_inference_error() {
        let handle = ModelHandle::from_regressor(CallableRegressor::new(|_: &FeatureMatrix| {
            Ok(Vec::new())
        }));

        let err = predict_quality(&handle, &sample()).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_regressor_failure_becomes_inference_error() {
        let handle = ModelHandle::from_regressor(CallableRegressor::new(|_: &FeatureMatrix| {
            Err(Error::model("boom"))
        }));

        match predict_quality(&handle, &sample()).unwrap_err() {
            Error::Inference(msg) => assert!(msg.contains("boom")),
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_prediction_is_inference_error() {
        let err = predict_quality(&constant(f64::NAN), &sample()).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_model_info_absent() {
        let info = serde_json::to_value(model_info(&ModelHandle::Absent)).unwrap();
        assert_eq!(info, json!({"status": "Model not loaded"}));
    }

    #[test]
    fn test_model_info_loaded() {
        let info = serde_json::to_value(model_info(&constant(5.0))).unwrap();
        assert_eq!(
            info,
            json!({
                "status": "Model loaded",
                "model_type": "CallableRegressor",
                "model_attributes": ["__call__"],
            })
        );
    }
}

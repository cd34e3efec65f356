//! Linear regression model stored as SafeTensors and evaluated with Candle
//!
//! The artifact holds a `weight` tensor of shape `[1, 11]` and an optional
//! `bias` tensor of shape `[1]`.

use crate::regressor::{FeatureMatrix, Regressor};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Linear;
use std::collections::HashMap;
use std::path::Path;
use winequality_core::{Error, Result, FEATURE_COUNT};

/// Tensor name of the coefficient matrix
pub const WEIGHT_TENSOR: &str = "weight";

/// Tensor name of the intercept
pub const BIAS_TENSOR: &str = "bias";

/// Single-output linear regressor backed by a Candle [`Linear`] layer
pub struct LinearModel {
    layer: Linear,
    device: Device,
}

impl LinearModel {
    /// Build from weight and bias tensors
    pub fn new(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        match weight.dims2() {
            Ok((1, n)) if n == FEATURE_COUNT => {}
            _ => {
                return Err(Error::model(format!(
                    "'{WEIGHT_TENSOR}' must have shape [1, {FEATURE_COUNT}], got {:?}",
                    weight.dims()
                )))
            }
        }

        if let Some(bias) = &bias {
            if !matches!(bias.dims1(), Ok(1)) {
                return Err(Error::model(format!(
                    "'{BIAS_TENSOR}' must have shape [1], got {:?}",
                    bias.dims()
                )));
            }
        }

        let device = weight.device().clone();
        Ok(Self {
            layer: Linear::new(weight, bias),
            device,
        })
    }

    /// Build on the CPU from plain coefficients
    pub fn from_coefficients(coefficients: &[f64], intercept: f64) -> Result<Self> {
        let device = Device::Cpu;
        let weight = Tensor::from_slice(coefficients, (1, coefficients.len()), &device)
            .map_err(|e| Error::model(format!("Failed to build weight tensor: {}", e)))?;
        let bias = Tensor::from_slice(&[intercept], 1, &device)
            .map_err(|e| Error::model(format!("Failed to build bias tensor: {}", e)))?;
        Self::new(weight, Some(bias))
    }

    /// Load from a SafeTensors file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(|e| {
            Error::model(format!("Failed to load SafeTensors {}: {}", path.display(), e))
        })?;

        let weight = tensors.remove(WEIGHT_TENSOR).ok_or_else(|| {
            Error::model(format!(
                "SafeTensors file {} has no '{WEIGHT_TENSOR}' tensor",
                path.display()
            ))
        })?;
        let bias = tensors.remove(BIAS_TENSOR);

        Self::new(weight, bias)
    }

    /// Write the weights to a SafeTensors file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut tensors = HashMap::new();
        tensors.insert(WEIGHT_TENSOR, self.layer.weight().clone());
        if let Some(bias) = self.layer.bias() {
            tensors.insert(BIAS_TENSOR, bias.clone());
        }

        candle_core::safetensors::save(&tensors, path)
            .map_err(|e| Error::model(format!("Failed to save SafeTensors: {}", e)))
    }

    fn forward(&self, features: &FeatureMatrix) -> candle_core::Result<Vec<f64>> {
        let input = Tensor::from_slice(
            features.as_slice(),
            (features.rows(), features.cols()),
            &self.device,
        )?
        .to_dtype(self.layer.weight().dtype())?;

        self.layer
            .forward(&input)?
            .flatten_all()?
            .to_dtype(DType::F64)?
            .to_vec1::<f64>()
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        features.ensure_cols(FEATURE_COUNT)?;
        self.forward(features)
            .map_err(|e| Error::inference(format!("linear forward pass failed: {}", e)))
    }

    fn attributes(&self) -> Vec<&'static str> {
        vec!["predict", WEIGHT_TENSOR, BIAS_TENSOR]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coefficients() -> Vec<f64> {
        let mut c = vec![0.0; FEATURE_COUNT];
        c[10] = 0.5; // alcohol
        c[1] = -1.0; // volatile_acidity
        c
    }

    fn single_row(values: Vec<f64>) -> FeatureMatrix {
        FeatureMatrix::new(values, 1, FEATURE_COUNT).unwrap()
    }

    #[test]
    fn test_forward_pass() {
        let model = LinearModel::from_coefficients(&coefficients(), 1.0).unwrap();

        let mut row = vec![0.0; FEATURE_COUNT];
        row[10] = 9.0;
        row[1] = 0.5;

        let out = model.predict(&single_row(row)).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_rows() {
        let model = LinearModel::from_coefficients(&coefficients(), 0.0).unwrap();
        let mut data = vec![0.0; FEATURE_COUNT * 2];
        data[10] = 2.0;
        data[FEATURE_COUNT + 10] = 4.0;

        let matrix = FeatureMatrix::new(data, 2, FEATURE_COUNT).unwrap();
        let out = model.predict(&matrix).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 1.0).abs() < 1e-9);
        assert!((out[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linear.safetensors");

        LinearModel::from_coefficients(&coefficients(), 1.0)
            .unwrap()
            .save(&path)
            .unwrap();
        let model = LinearModel::from_file(&path).unwrap();

        let mut row = vec![0.0; FEATURE_COUNT];
        row[10] = 10.0;
        let out = model.predict(&single_row(row)).unwrap();
        assert!((out[0] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_wrong_weight_shape() {
        let weight = Tensor::zeros((1, 4), DType::F64, &Device::Cpu).unwrap();
        assert!(LinearModel::new(weight, None).is_err());

        let weight = Tensor::zeros((2, FEATURE_COUNT), DType::F64, &Device::Cpu).unwrap();
        assert!(LinearModel::new(weight, None).is_err());
    }

    #[test]
    fn test_rejects_wrong_bias_shape() {
        let weight = Tensor::zeros((1, FEATURE_COUNT), DType::F64, &Device::Cpu).unwrap();
        let bias = Tensor::zeros(3, DType::F64, &Device::Cpu).unwrap();
        assert!(LinearModel::new(weight, Some(bias)).is_err());
    }

    #[test]
    fn test_f32_weights_are_supported() {
        let weight = Tensor::ones((1, FEATURE_COUNT), DType::F32, &Device::Cpu).unwrap();
        let model = LinearModel::new(weight, None).unwrap();

        let out = model.predict(&single_row(vec![0.5; FEATURE_COUNT])).unwrap();
        assert!((out[0] - 5.5).abs() < 1e-5);
    }
}

//! Regressor trait and feature matrix

use winequality_core::{Error, FeatureVector, Result, FEATURE_COUNT};

/// Inference capability every loaded model is normalized to
pub trait Regressor: Send + Sync {
    /// Produce one point estimate per row of `features`
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Runtime type name reported by the diagnostic endpoint
    fn model_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Names of the capabilities and metadata this model exposes
    fn attributes(&self) -> Vec<&'static str> {
        vec!["predict"]
    }
}

/// Row-major numeric matrix handed to a [`Regressor`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl FeatureMatrix {
    /// Build a matrix from row-major data
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(Error::inference(format!(
                "cannot reshape {} values into a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// Single-row matrix holding one feature vector
    pub fn single_row(features: FeatureVector) -> Self {
        Self {
            data: features.as_slice().to_vec(),
            rows: 1,
            cols: FEATURE_COUNT,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// Iterate over rows
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Borrow the row-major backing data
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Fail unless the matrix has exactly `expected` columns
    pub fn ensure_cols(&self, expected: usize) -> Result<()> {
        if self.cols != expected {
            return Err(Error::inference(format!(
                "model expects {} features per row, got {}",
                expected, self.cols
            )));
        }
        Ok(())
    }
}

/// Adapts a plain function into a [`Regressor`].
///
/// For artifacts that are themselves a callable rather than an object with
/// a `predict` method.
pub struct CallableRegressor<F> {
    func: F,
}

impl<F> CallableRegressor<F>
where
    F: Fn(&FeatureMatrix) -> Result<Vec<f64>> + Send + Sync,
{
    /// Wrap a function
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Regressor for CallableRegressor<F>
where
    F: Fn(&FeatureMatrix) -> Result<Vec<f64>> + Send + Sync,
{
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        (self.func)(features)
    }

    fn model_type(&self) -> &'static str {
        "CallableRegressor"
    }

    fn attributes(&self) -> Vec<&'static str> {
        vec!["__call__"]
    }
}

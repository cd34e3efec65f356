//! WineQuality Model
//!
//! Loading of the trained quality model and the services built on it.
//!
//! Every supported artifact is normalized at load time into a single
//! [`Regressor`] capability, so request handling has exactly one calling
//! convention:
//! - LightGBM text dumps become a [`GbdtModel`] tree ensemble
//! - SafeTensors weights become a Candle-backed [`LinearModel`]
//! - Plain functions can be wrapped in a [`CallableRegressor`]
//!
//! The resulting [`ModelHandle`] is either loaded or absent; a failed load
//! never aborts startup.

pub mod gbdt;
pub mod linear;
pub mod model_loader;
pub mod regressor;
pub mod service;

pub use gbdt::{GbdtModel, Objective};
pub use linear::LinearModel;
pub use model_loader::{LoadedModel, ModelConfig, ModelFormat, ModelHandle};
pub use regressor::{CallableRegressor, FeatureMatrix, Regressor};
pub use service::{model_info, predict_quality, ModelInfo, ModelStatus, PredictionResponse};

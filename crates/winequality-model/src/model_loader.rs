//! Model artifact loading and the process-wide model handle

use crate::gbdt::GbdtModel;
use crate::linear::LinearModel;
use crate::regressor::Regressor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use winequality_core::{Error, Result};

/// On-disk format of a model artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Probe the file once at load time
    #[default]
    Auto,
    /// LightGBM text dump (`Booster.save_model()`)
    LightGbm,
    /// SafeTensors linear model
    SafeTensors,
}

impl ModelFormat {
    /// Work out the concrete format of the artifact at `path`
    pub fn detect(path: &Path) -> Result<Self> {
        let is_safetensors = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));
        if is_safetensors {
            return Ok(Self::SafeTensors);
        }

        let mut head = [0u8; 64];
        let read = std::fs::File::open(path)
            .and_then(|mut file| file.read(&mut head))
            .map_err(|e| {
                Error::model(format!("Failed to read model file {}: {}", path.display(), e))
            })?;

        if String::from_utf8_lossy(&head[..read])
            .trim_start()
            .starts_with("tree")
        {
            Ok(Self::LightGbm)
        } else {
            Err(Error::model(format!(
                "Unrecognized model artifact {}: expected a LightGBM text model or SafeTensors",
                path.display()
            )))
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::LightGbm => "lightgbm",
            Self::SafeTensors => "safetensors",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "lightgbm" | "lgbm" => Ok(Self::LightGbm),
            "safetensors" => Ok(Self::SafeTensors),
            other => Err(format!(
                "unknown model format '{other}' (expected auto, lightgbm or safetensors)"
            )),
        }
    }
}

/// Where to load the model from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the model artifact
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Artifact format
    #[serde(default)]
    pub format: ModelFormat,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            format: ModelFormat::Auto,
        }
    }
}

impl ModelConfig {
    /// Create a configuration for a local artifact
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the artifact format
    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("lgbm_model.txt")
}

/// A successfully loaded model, normalized to the [`Regressor`] capability
#[derive(Clone)]
pub struct LoadedModel {
    regressor: Arc<dyn Regressor>,
    format: Option<ModelFormat>,
    path: Option<PathBuf>,
}

impl LoadedModel {
    /// Load and normalize an artifact
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let (format, regressor) = load_regressor(&config.path, config.format)?;
        Ok(Self {
            regressor,
            format: Some(format),
            path: Some(config.path.clone()),
        })
    }

    /// Wrap an in-memory regressor
    pub fn from_regressor(regressor: impl Regressor + 'static) -> Self {
        Self::from_arc(Arc::new(regressor))
    }

    /// Wrap a shared regressor
    pub fn from_arc(regressor: Arc<dyn Regressor>) -> Self {
        Self {
            regressor,
            format: None,
            path: None,
        }
    }

    /// The inference capability
    pub fn regressor(&self) -> &dyn Regressor {
        self.regressor.as_ref()
    }

    /// Resolved artifact format, when loaded from disk
    pub fn format(&self) -> Option<ModelFormat> {
        self.format
    }

    /// Artifact path, when loaded from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_type", &self.regressor.model_type())
            .field("format", &self.format)
            .field("path", &self.path)
            .finish()
    }
}

fn load_regressor(path: &Path, format: ModelFormat) -> Result<(ModelFormat, Arc<dyn Regressor>)> {
    let regressor: Arc<dyn Regressor> = match format {
        ModelFormat::Auto => return load_regressor(path, ModelFormat::detect(path)?),
        ModelFormat::LightGbm => Arc::new(GbdtModel::from_file(path)?),
        ModelFormat::SafeTensors => Arc::new(LinearModel::from_file(path)?),
    };
    Ok((format, regressor))
}

/// Process-wide model reference.
///
/// Built once during startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub enum ModelHandle {
    /// A model is available for inference
    Loaded(LoadedModel),
    /// Loading failed; predictions are refused
    Absent,
}

impl ModelHandle {
    /// Load the configured artifact.
    ///
    /// Never fails: a load error is logged and yields [`ModelHandle::Absent`]
    /// so the process keeps serving the diagnostic endpoint.
    pub fn load(config: &ModelConfig) -> Self {
        match LoadedModel::load(config) {
            Ok(model) => {
                info!(
                    path = %config.path.display(),
                    format = %model.format().unwrap_or_default(),
                    model_type = model.regressor().model_type(),
                    "Model loaded"
                );
                Self::Loaded(model)
            }
            Err(e) => {
                error!(path = %config.path.display(), "Error loading model: {}", e);
                Self::Absent
            }
        }
    }

    /// Handle around an in-memory regressor
    pub fn from_regressor(regressor: impl Regressor + 'static) -> Self {
        Self::Loaded(LoadedModel::from_regressor(regressor))
    }

    /// The loaded model, if any
    pub fn model(&self) -> Option<&LoadedModel> {
        match self {
            Self::Loaded(model) => Some(model),
            Self::Absent => None,
        }
    }

    /// Whether a model is available
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

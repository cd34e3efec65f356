//! Error types for WineQuality

/// Result type alias using WineQuality's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for WineQuality operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model handle is absent, so no prediction can be served
    #[error("Model not loaded")]
    ModelUnavailable,

    /// Failure while assembling features or running inference
    #[error("{0}")]
    Inference(String),

    /// Model artifact could not be read or is not a supported shape
    #[error("model error: {0}")]
    Model(String),
}

impl Error {
    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Short, stable name of the error class, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable => "model_unavailable",
            Self::Inference(_) => "inference",
            Self::Model(_) => "model",
        }
    }
}

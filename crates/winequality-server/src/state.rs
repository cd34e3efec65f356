use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use winequality_model::ModelHandle;

use crate::config::ServiceConfig;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServiceConfig>,

    /// Model handle, fixed at startup and read-only afterwards
    pub model: Arc<ModelHandle>,

    /// Prometheus metrics handle for rendering, when a recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state around an already-loaded model handle
    pub fn new(config: ServiceConfig, model: ModelHandle) -> Self {
        Self {
            config: Arc::new(config),
            model: Arc::new(model),
            metrics_handle: None,
        }
    }

    /// Load the configured model and build the state.
    ///
    /// A model that fails to load leaves the handle absent; startup continues.
    pub fn load(config: ServiceConfig) -> Self {
        let model = ModelHandle::load(&config.model);
        Self::new(config, model)
    }

    /// Attach the Prometheus handle rendered by `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

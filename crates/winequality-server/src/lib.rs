//! Wine Quality Server
//!
//! HTTP front end for the wine quality regressor. Requests are validated
//! against the physicochemical feature ranges before the model is consulted;
//! predictions are clamped to the integer scores 5 and 6.

pub mod cli;
pub mod config;
pub mod extract;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use config::{HttpConfig, ServiceConfig};
pub use routes::create_router;
pub use state::AppState;

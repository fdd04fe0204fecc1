//! API inlet: an HTTP front door that turns named API calls into pipeline
//! executions and renders their outcomes through response templates.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payload;
pub mod render;
pub mod routing;
pub mod security;

pub use config::InletConfig;
pub use error::{ApiError, InletError};
pub use executor::PipelineExecutor;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;

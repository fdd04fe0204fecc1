//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request-id/trace/timeout/body-limit layers)
//!     → request.rs (multi-call flag, call options from headers)
//!     → [routing resolves, payload prepares, executor runs, renderer renders]
//!     → response.rs (static headers, CORS, signature, JSON body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{X_API, X_API_CALL_TIMEOUT, X_API_MULTI_CALL, X_RANGE, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

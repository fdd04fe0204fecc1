//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     InletConfig → graph registry → renderer (templates, vars, bindings)
//!                 → origin policy, static headers, signer → AppState
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server stops accepting and drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registries, then listeners
//! - Any startup error is fatal; nothing is served from a partial state

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_state, StartupError};

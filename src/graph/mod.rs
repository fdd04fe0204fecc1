//! API graph subsystem.
//!
//! # Data Flow
//! ```text
//! Graph Compilation (at startup):
//!     AddressConfig[] + GraphConfig[] + HooksConfig
//!     → registry.rs (validate names, resolve references)
//!     → hooks.before ++ configured stages ++ hooks.after
//!     → Freeze as GraphRegistry (API name → Graph)
//!
//! Per request:
//!     API name → GraphRegistry::resolve → Graph or UnknownApi
//! ```
//!
//! # Design Decisions
//! - Every misconfiguration is fatal at build time; a built registry never
//!   holds a dangling address reference
//! - Immutable after startup, shared via Arc without locks
//! - `set` exists for embedding callers registering graphs before serving

pub mod address;
pub mod registry;

pub use address::{Address, Graph};
pub use registry::{GraphError, GraphRegistry};

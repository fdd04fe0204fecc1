//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, headers, path, body)
//!     → resolver.rs (method check, single vs multi call)
//!     → matcher.rs (API name from header, else path)
//!     → GraphRegistry lookup for every requested name
//!     → Return: Resolution (API name → Graph) or InletError
//! ```
//!
//! # Design Decisions
//! - Stateless per request; the registry is shared read-only
//! - All-or-nothing: the first unresolvable name fails the request
//! - Deterministic: names are resolved in sorted order

pub mod matcher;
pub mod resolver;

pub use resolver::{RequestResolver, RequestView, Resolution};

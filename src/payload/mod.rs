//! Payload subsystem.
//!
//! # Data Flow
//! ```text
//! Resolution + raw body
//!     → prepare.rs (extract per-API content, decode proxy envelopes,
//!                   tag context with the API name)
//!     → envelope.rs Payload, one per API
//!     → [pipeline executor]
//!     → aggregate.rs (outcome → ResponseRecord, per API)
//! ```
//!
//! # Design Decisions
//! - A payload with a non-zero embedded error is a business failure, not a
//!   transport failure; both end up as error records
//! - Single calls must yield exactly one record

pub mod aggregate;
pub mod envelope;
pub mod prepare;

pub use aggregate::{aggregate, ApiOutcome, ResponseRecord};
pub use envelope::{Payload, PayloadError};
pub use prepare::PayloadPreparer;

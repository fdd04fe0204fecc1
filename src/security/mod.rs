//! Edge security for inlet responses.
//!
//! # Data Flow
//! ```text
//! Request headers (Referer / Origin)
//!     → cors.rs (allow-list match, Access-Control-* headers)
//! Rendered body
//!     → headers.rs (Server, P3P, configured extras)
//!     → signature.rs (optional RSA signature header)
//! ```
//!
//! # Design Decisions
//! - Everything is computed from config once at startup
//! - A denied origin still gets a rendered body; browsers enforce CORS

pub mod cors;
pub mod headers;
pub mod signature;

pub use cors::{OriginCheck, OriginPolicy};
pub use headers::{HeaderConfigError, StaticHeaders};
pub use signature::{ResponseSigner, SignatureError};

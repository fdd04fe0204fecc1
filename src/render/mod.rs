//! Response rendering subsystem.
//!
//! # Data Flow
//! ```text
//! ResponseRecord per API
//!     → renderer.rs (pick bound or default template, build context)
//!     → exec.rs (walk the parsed template, call funcs.rs)
//!     → text per API
//!     → multi call: default template again over {api → text}
//!     → response body
//!
//! Startup:
//!     template files → store.rs (strip, parse.rs)
//!     variable files → vars.rs (conflict-checked merge)
//! ```
//!
//! # Design Decisions
//! - Templates are parsed once into an AST; rendering never re-parses
//! - Function names are resolved at parse time against a static table
//! - Values are a tagged union with checked accessors, no reflection
//! - Mutable dictionaries live in a per-render scratch arena

pub mod exec;
pub mod funcs;
pub mod parse;
pub mod renderer;
pub mod store;
pub mod value;
pub mod vars;

use thiserror::Error;

pub use renderer::{ResponseRenderer, DEFAULT_TEMPLATE};
pub use store::TemplateStore;
pub use value::Value;
pub use vars::VariableStore;

/// Errors raised while parsing or executing templates.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {template}: {message}")]
    Parse { template: String, message: String },

    #[error("{func}: expected {expected}, found {found}")]
    TypeMismatch {
        func: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{func}: wrong number of arguments, expected {expected}, found {found}")]
    Arity {
        func: &'static str,
        expected: String,
        found: usize,
    },

    #[error("{func}: {message}")]
    Function { func: &'static str, message: String },

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template nesting too deep")]
    DepthExceeded,
}

impl RenderError {
    pub(crate) fn parse(template: &str, message: impl Into<String>) -> Self {
        RenderError::Parse {
            template: template.to_string(),
            message: message.into(),
        }
    }
}

//! Backend addresses and the pipelines built from them.

use serde::{Deserialize, Serialize};

/// A named backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub kind: String,
    pub url: String,
}

impl Address {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            url: url.into(),
        }
    }
}

/// Ordered stages one API request traverses, plus an optional address
/// receiving the payload when a stage fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    stages: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_address: Option<Address>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append stages in order.
    pub fn add_stages<I>(&mut self, stages: I) -> &mut Self
    where
        I: IntoIterator<Item = Address>,
    {
        self.stages.extend(stages);
        self
    }

    pub fn set_error_address(&mut self, address: Address) -> &mut Self {
        self.error_address = Some(address);
        self
    }

    pub fn stages(&self) -> &[Address] {
        &self.stages
    }

    pub fn error_address(&self) -> Option<&Address> {
        self.error_address.as_ref()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

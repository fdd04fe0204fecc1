//! Internal payload envelope exchanged with pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Error embedded in a payload by a stage that failed the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadError {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub message: String,
}

/// The message a pipeline carries from stage to stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PayloadError>,
}

impl Payload {
    /// Create a payload with a fresh ID wrapping `content`.
    pub fn new(content: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            ..Self::default()
        }
    }

    /// Decode a serialized envelope.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// False when a stage embedded a non-zero error.
    pub fn is_correct(&self) -> bool {
        self.error.as_ref().map_or(true, |e| e.code == 0)
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn set_error(&mut self, error: PayloadError) {
        self.error = Some(error);
    }
}

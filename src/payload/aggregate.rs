//! Outcome aggregation into response records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, InletError};
use crate::executor::ExecutorError;
use crate::payload::envelope::{Payload, PayloadError};

/// What the executor produced for one API.
pub type ApiOutcome = Result<Payload, ExecutorError>;

/// Canonical per-API response: `code == 0` with a result, or an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub code: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_namespace: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ResponseRecord {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        Self {
            code: err.code,
            error_id: non_empty(&err.id),
            error_namespace: non_empty(&err.namespace),
            message: err.message.clone(),
            result: None,
        }
    }

    fn from_payload_error(err: &PayloadError) -> Self {
        Self {
            code: err.code,
            error_id: non_empty(&err.id),
            error_namespace: non_empty(&err.namespace),
            message: err.message.clone(),
            result: None,
        }
    }

    /// Convert one executor outcome.
    pub fn from_outcome(outcome: ApiOutcome) -> Self {
        match outcome {
            Ok(payload) => match payload.error {
                Some(ref err) if err.code != 0 => Self::from_payload_error(err),
                _ => Self::success(payload.content),
            },
            Err(err) => Self::from_api_error(&err.to_api_error()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Convert every API's outcome into a record.
///
/// Single calls must produce exactly one record.
pub fn aggregate<I>(multi_call: bool, outcomes: I) -> Result<BTreeMap<String, ResponseRecord>, InletError>
where
    I: IntoIterator<Item = (String, ApiOutcome)>,
{
    let records: BTreeMap<String, ResponseRecord> = outcomes
        .into_iter()
        .map(|(api, outcome)| (api, ResponseRecord::from_outcome(outcome)))
        .collect();

    if !multi_call && records.len() != 1 {
        return Err(InletError::ResponseCountMismatch {
            count: records.len(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ERR_NAMESPACE;
    use serde_json::json;

    #[test]
    fn test_success_record() {
        let record = ResponseRecord::from_outcome(Ok(Payload::new(json!({"x": 1}))));
        assert_eq!(record, ResponseRecord::success(json!({"x": 1})));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"code":0,"message":"","result":{"x":1}}"#
        );
    }

    #[test]
    fn test_business_error_record() {
        let mut payload = Payload::new(json!({"partial": true}));
        payload.set_error(PayloadError {
            code: 1001,
            id: "e-1".into(),
            namespace: "ORDER".into(),
            message: "out of stock".into(),
        });

        let record = ResponseRecord::from_outcome(Ok(payload));
        assert_eq!(record.code, 1001);
        assert_eq!(record.error_id.as_deref(), Some("e-1"));
        assert_eq!(record.error_namespace.as_deref(), Some("ORDER"));
        assert_eq!(record.message, "out of stock");
        assert!(record.result.is_none());
    }

    #[test]
    fn test_structured_and_unstructured_errors() {
        let structured = ExecutorError::Api(ApiError::new("ORDER", 7, "bad order"));
        let record = ResponseRecord::from_outcome(Err(structured));
        assert_eq!(record.code, 7);
        assert_eq!(record.error_namespace.as_deref(), Some("ORDER"));

        let timeout = ExecutorError::Timeout { api: "api.slow".into() };
        let record = ResponseRecord::from_outcome(Err(timeout));
        assert_eq!(record.code, 5);
        assert_eq!(record.error_namespace.as_deref(), Some(ERR_NAMESPACE));

        let other = ExecutorError::Transport("connection refused".into());
        let record = ResponseRecord::from_outcome(Err(other));
        assert_eq!(record.code, 500);
        assert_eq!(record.error_namespace.as_deref(), Some(ERR_NAMESPACE));
        assert!(record.message.contains("connection refused"));
    }

    #[test]
    fn test_multi_call_keeps_every_api() {
        let outcomes = vec![
            ("b".to_string(), Ok(Payload::new(json!(2)))),
            ("a".to_string(), Err(ExecutorError::Timeout { api: "a".into() })),
        ];
        let records = aggregate(true, outcomes).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(!records["a"].is_success());
        assert!(records["b"].is_success());
    }

    #[test]
    fn test_single_call_count_mismatch() {
        let err = aggregate(false, Vec::new()).unwrap_err();
        assert!(matches!(err, InletError::ResponseCountMismatch { count: 0 }));

        let two = vec![
            ("a".to_string(), Ok(Payload::new(json!(1)))),
            ("b".to_string(), Ok(Payload::new(json!(2)))),
        ];
        assert_eq!(aggregate(false, two).unwrap_err().code(), 11);
    }
}

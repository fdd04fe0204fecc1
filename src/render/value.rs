//! Template runtime values.
//!
//! # Responsibilities
//! - Tagged union over everything a template can touch
//! - Type-checked accessors failing with `RenderError::TypeMismatch`
//! - Truthiness, display text and JSON conversion
//! - Per-render dictionary arena (`Scratch`)

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::Number;

use crate::render::RenderError;

/// Maximum nesting walked when converting values back to JSON.
const MAX_JSON_DEPTH: usize = 64;

/// Handle to a dictionary in the render scratch arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Time(DateTime<FixedOffset>),
    Dict(DictId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Time(_) => "time",
            Value::Dict(_) => "dict",
        }
    }

    /// Go-template truthiness: zero values and empty collections are false.
    pub fn truthy(&self, scratch: &Scratch) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Time(_) => true,
            Value::Dict(id) => !scratch.dict(*id).is_empty(),
        }
    }

    fn mismatch(&self, func: &str, expected: &'static str) -> RenderError {
        RenderError::TypeMismatch {
            func: func.to_string(),
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_str(&self, func: &str) -> Result<&str, RenderError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(func, "string")),
        }
    }

    /// Integer view; floats with a fractional part are rejected.
    pub fn as_int(&self, func: &str) -> Result<i64, RenderError> {
        match self {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| self.mismatch(func, "integer")),
            other => Err(other.mismatch(func, "integer")),
        }
    }

    pub fn as_f64(&self, func: &str) -> Result<f64, RenderError> {
        match self {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.mismatch(func, "number")),
            other => Err(other.mismatch(func, "number")),
        }
    }

    pub fn as_list(&self, func: &str) -> Result<&[Value], RenderError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch(func, "list")),
        }
    }

    pub fn as_map(&self, func: &str) -> Result<&BTreeMap<String, Value>, RenderError> {
        match self {
            Value::Map(map) => Ok(map),
            other => Err(other.mismatch(func, "map")),
        }
    }

    pub fn as_dict(&self, func: &str) -> Result<DictId, RenderError> {
        match self {
            Value::Dict(id) => Ok(*id),
            other => Err(other.mismatch(func, "dict")),
        }
    }

    pub fn as_time(&self, func: &str) -> Result<DateTime<FixedOffset>, RenderError> {
        match self {
            Value::Time(t) => Ok(*t),
            other => Err(other.mismatch(func, "time")),
        }
    }

    pub fn int(n: i64) -> Value {
        Value::Number(Number::from(n))
    }

    /// Text written when the value is printed by an action.
    pub fn display(&self, scratch: &Scratch) -> Result<String, RenderError> {
        Ok(match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            composite => serde_json::to_string(&composite.to_json(scratch)?)
                .map_err(|e| RenderError::Function {
                    func: "print",
                    message: e.to_string(),
                })?,
        })
    }

    /// Convert back to JSON, resolving scratch dictionaries.
    pub fn to_json(&self, scratch: &Scratch) -> Result<serde_json::Value, RenderError> {
        self.to_json_at(scratch, 0)
    }

    fn to_json_at(&self, scratch: &Scratch, depth: usize) -> Result<serde_json::Value, RenderError> {
        if depth > MAX_JSON_DEPTH {
            return Err(RenderError::DepthExceeded);
        }
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Time(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json_at(scratch, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => map_to_json(map, scratch, depth)?,
            Value::Dict(id) => map_to_json(scratch.dict(*id), scratch, depth)?,
        })
    }
}

fn map_to_json(
    map: &BTreeMap<String, Value>,
    scratch: &Scratch,
    depth: usize,
) -> Result<serde_json::Value, RenderError> {
    let mut out = serde_json::Map::new();
    for (k, v) in map {
        out.insert(k.clone(), v.to_json_at(scratch, depth + 1)?);
    }
    Ok(serde_json::Value::Object(out))
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Dictionaries created by `newDict` during one render invocation.
#[derive(Debug, Default)]
pub struct Scratch {
    dicts: Vec<BTreeMap<String, Value>>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_dict(&mut self) -> Value {
        self.dicts.push(BTreeMap::new());
        Value::Dict(DictId(self.dicts.len() - 1))
    }

    pub fn dict(&self, id: DictId) -> &BTreeMap<String, Value> {
        &self.dicts[id.0]
    }

    pub fn dict_mut(&mut self, id: DictId) -> &mut BTreeMap<String, Value> {
        &mut self.dicts[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        let scratch = Scratch::new();
        assert!(!Value::Null.truthy(&scratch));
        assert!(!Value::from("").truthy(&scratch));
        assert!(Value::from("x").truthy(&scratch));
        assert!(!Value::int(0).truthy(&scratch));
        assert!(Value::int(3).truthy(&scratch));
        assert!(!Value::List(vec![]).truthy(&scratch));
    }

    #[test]
    fn test_accessor_type_mismatch() {
        let err = Value::int(1).as_str("split").unwrap_err();
        assert_eq!(err.to_string(), "split: expected string, found number");

        assert_eq!(Value::from(json!(2.0)).as_int("substr").unwrap(), 2);
        assert!(Value::from(json!(2.5)).as_int("substr").is_err());
    }

    #[test]
    fn test_json_conversion_resolves_dicts() {
        let mut scratch = Scratch::new();
        let dict = scratch.new_dict();
        let id = dict.as_dict("test").unwrap();
        scratch.dict_mut(id).insert("k".into(), Value::from(json!([1, "a"])));

        let value = Value::List(vec![dict, Value::Null]);
        assert_eq!(value.to_json(&scratch).unwrap(), json!([{"k": [1, "a"]}, null]));
    }

    #[test]
    fn test_self_referencing_dict_is_bounded() {
        let mut scratch = Scratch::new();
        let dict = scratch.new_dict();
        let id = dict.as_dict("test").unwrap();
        scratch.dict_mut(id).insert("me".into(), dict.clone());

        assert!(matches!(dict.to_json(&scratch), Err(RenderError::DepthExceeded)));
    }

    #[test]
    fn test_display() {
        let scratch = Scratch::new();
        assert_eq!(Value::Null.display(&scratch).unwrap(), "");
        assert_eq!(Value::from(json!(1.5)).display(&scratch).unwrap(), "1.5");
        assert_eq!(Value::from(json!({"a": 1})).display(&scratch).unwrap(), r#"{"a":1}"#);
    }
}

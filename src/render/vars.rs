//! Global template variables.
//!
//! # Responsibilities
//! - Merge variable sources under the conflict rule
//! - Load `*.json` object files from files and directories
//! - Expose the variables to templates as `.vars`
//!
//! # Design Decisions
//! - Re-inserting a key with an identical value is tolerated, a different
//!   value is a conflict; sources loaded later never silently win

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use crate::error::InletError;
use crate::render::store::{list_files, visible_name};
use crate::render::value::Value;

/// Extension of variable files picked up from directories.
const VARIABLE_EXTENSION: &str = "json";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    vars: BTreeMap<String, JsonValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Result<(), InletError> {
        let key = key.into();
        match self.vars.get(&key) {
            Some(existing) if *existing != value => Err(InletError::VariableConflict {
                key,
                value: value.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.vars.insert(key, value);
                Ok(())
            }
        }
    }

    /// Insert every entry, stopping at the first conflict.
    pub fn extend(&mut self, vars: Map<String, JsonValue>) -> Result<(), InletError> {
        for (key, value) in vars {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.vars.get(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Template view of the variables.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        )
    }

    /// Load JSON object files, or every `*.json` file in a directory.
    pub fn load_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, InletError> {
        let mut loaded = 0;
        for path in paths {
            let path = path.as_ref();
            let meta = fs::metadata(path).map_err(|e| InletError::FileInfo {
                file: path.display().to_string(),
                err: e.to_string(),
            })?;

            if meta.is_dir() {
                for file in list_files(path, VARIABLE_EXTENSION)? {
                    loaded += self.load_file(&file)?;
                }
            } else {
                loaded += self.load_file(path)?;
            }
        }
        Ok(loaded)
    }

    fn load_file(&mut self, path: &Path) -> Result<usize, InletError> {
        if visible_name(path).is_none() {
            return Ok(0);
        }

        let data = fs::read(path).map_err(|e| InletError::ReadFile {
            file: path.display().to_string(),
            err: e.to_string(),
        })?;
        let vars: Map<String, JsonValue> =
            serde_json::from_slice(&data).map_err(|e| InletError::DecodeVariables {
                file: path.display().to_string(),
                err: e.to_string(),
            })?;

        let count = vars.len();
        self.extend(vars)?;
        tracing::debug!(file = %path.display(), count, "Loaded template variables");
        Ok(1)
    }
}

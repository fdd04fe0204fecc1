//! Response renderer.
//!
//! # Responsibilities
//! - Bind APIs to templates and choose the default template
//! - Render one record per API with its render context
//! - Merge multi-call sub-renders through the default template
//! - Produce a well-formed error body even when rendering fails
//!
//! # Design Decisions
//! - The built-in default JSON-encodes every string field so its output is
//!   always valid JSON
//! - A multi-call result maps each API to its rendered text, so every API
//!   keeps the exact bytes its own template produced

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use crate::error::{ApiError, InletError};
use crate::payload::ResponseRecord;
use crate::render::store::TemplateStore;
use crate::render::value::Value;
use crate::render::vars::VariableStore;

/// Name of the built-in default template.
pub const DEFAULT_TEMPLATE: &str = "_internal/default";

const DEFAULT_TEMPLATE_SOURCE: &str = r#"
{
	"code":{{.api.response.code}},
	{{if .api.response.error_id}}"error_id":{{json .api.response.error_id}},{{end}}
	{{if .api.response.error_namespace}}"error_namespace":{{json .api.response.error_namespace}},{{end}}
	"message":{{json .api.response.message}},
	"result":{{json .api.response.result}}
}
"#;

/// Renders response records into response bodies.
///
/// Built once at startup; `render` takes `&self` and is safe to share.
#[derive(Debug)]
pub struct ResponseRenderer {
    store: TemplateStore,
    bindings: HashMap<String, String>,
    default_template: String,
    vars: VariableStore,
    vars_value: Value,
}

impl ResponseRenderer {
    pub fn new() -> Result<Self, InletError> {
        let mut renderer = Self {
            store: TemplateStore::new(),
            bindings: HashMap::new(),
            default_template: DEFAULT_TEMPLATE.to_string(),
            vars: VariableStore::new(),
            vars_value: Value::Map(BTreeMap::new()),
        };
        renderer.add_template(DEFAULT_TEMPLATE, DEFAULT_TEMPLATE_SOURCE)?;
        Ok(renderer)
    }

    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), InletError> {
        self.store
            .add(name, source)
            .map_err(|e| InletError::AddTemplateFailed {
                file: name.to_string(),
                err: e.to_string(),
            })
    }

    pub fn load_templates<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, InletError> {
        self.store.load_paths(paths)
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.store
    }

    /// Use `name` for APIs without a binding; empty restores the built-in.
    pub fn set_default_template(&mut self, name: &str) -> Result<(), InletError> {
        let name = name.trim();
        if name.is_empty() {
            self.default_template = DEFAULT_TEMPLATE.to_string();
            return Ok(());
        }
        if !self.store.contains(name) {
            return Err(InletError::TemplateNotExist {
                name: name.to_string(),
            });
        }
        self.default_template = name.to_string();
        Ok(())
    }

    pub fn default_template(&self) -> &str {
        &self.default_template
    }

    /// Bind `api` to `template`. Rebinding to the same template is a no-op.
    pub fn bind_api(&mut self, api: &str, template: &str) -> Result<(), InletError> {
        if let Some(existing) = self.bindings.get(api) {
            if existing != template {
                return Err(InletError::ApiAlreadyRelated {
                    api: api.to_string(),
                    template: existing.clone(),
                });
            }
            return Ok(());
        }
        if !self.store.contains(template) {
            return Err(InletError::TemplateNotExist {
                name: template.to_string(),
            });
        }
        self.bindings.insert(api.to_string(), template.to_string());
        Ok(())
    }

    pub fn reset_api_template(&mut self, api: &str) {
        self.bindings.remove(api);
    }

    /// Template used for `api`: its binding, else the default.
    pub fn template_for(&self, api: &str) -> &str {
        self.bindings
            .get(api)
            .map(String::as_str)
            .unwrap_or(&self.default_template)
    }

    pub fn load_variables<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, InletError> {
        let result = self.vars.load_paths(paths);
        self.vars_value = self.vars.to_value();
        result
    }

    pub fn insert_variable(&mut self, key: &str, value: JsonValue) -> Result<(), InletError> {
        self.vars.insert(key, value)?;
        self.vars_value = self.vars.to_value();
        Ok(())
    }

    pub fn variables(&self) -> &VariableStore {
        &self.vars
    }

    /// Render the response body for a request.
    ///
    /// A single call renders its one record with that API's template. A
    /// multi call renders every record, then renders the default template
    /// with `is_multi` set over `{api: sub-render}`.
    pub fn render(
        &self,
        multi_call: bool,
        records: &BTreeMap<String, ResponseRecord>,
    ) -> Result<String, InletError> {
        if !multi_call {
            let mut iter = records.iter();
            return match (iter.next(), iter.next()) {
                (Some((api, record)), None) => self.render_record(self.template_for(api), api, false, record),
                _ => Err(InletError::ResponseCountMismatch {
                    count: records.len(),
                }),
            };
        }

        let mut rendered = Map::new();
        for (api, record) in records {
            let text = self.render_record(self.template_for(api), api, false, record)?;
            rendered.insert(api.clone(), JsonValue::String(text));
        }

        let aggregate = ResponseRecord::success(JsonValue::Object(rendered));
        self.render_record(&self.default_template, "", true, &aggregate)
    }

    /// Render a structured error for `api`, never failing.
    ///
    /// Falls back to the serde encoding of a `RenderFailed` record when the
    /// template itself cannot be rendered.
    pub fn render_error(&self, api: &str, err: &ApiError) -> String {
        let record = ResponseRecord::from_api_error(err);
        match self.render_record(self.template_for(api), api, false, &record) {
            Ok(text) => text,
            Err(render_err) => {
                let fallback = ResponseRecord::from_api_error(&render_err.to_api_error());
                fallback_body(&fallback)
            }
        }
    }

    fn render_record(
        &self,
        template: &str,
        api: &str,
        is_multi: bool,
        record: &ResponseRecord,
    ) -> Result<String, InletError> {
        let response = serde_json::to_value(record).map_err(|e| InletError::MarshalFailed(e.to_string()))?;

        let mut api_ctx = BTreeMap::new();
        api_ctx.insert("is_multi".to_string(), Value::Bool(is_multi));
        api_ctx.insert("name".to_string(), Value::from(api));
        api_ctx.insert("response".to_string(), Value::from(response));

        let mut root = BTreeMap::new();
        root.insert("api".to_string(), Value::Map(api_ctx));
        root.insert("vars".to_string(), self.vars_value.clone());

        self.store.render(template, Value::Map(root)).map_err(|e| {
            tracing::error!(api = %api, template = %template, error = %e, "Failed to render response");
            InletError::RenderFailed(e.to_string())
        })
    }
}

/// Template-free JSON body for a record.
pub fn fallback_body(record: &ResponseRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| {
        format!(r#"{{"code":{},"message":"","result":null}}"#, record.code)
    })
}

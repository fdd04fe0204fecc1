//! Template store.
//!
//! # Responsibilities
//! - Hold parsed templates by name
//! - Load templates from files and directories of `*.tmpl`
//! - Render a stored template with a data value
//!
//! # Design Decisions
//! - Newlines and tabs are stripped from sources before parsing, so
//!   JSON-producing templates can be laid out over several lines
//! - Read-only after startup; rendering takes `&self`

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::InletError;
use crate::render::exec;
use crate::render::parse::Template;
use crate::render::value::Value;
use crate::render::RenderError;

/// Extension of template files picked up from directories.
const TEMPLATE_EXTENSION: &str = "tmpl";

#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and store `source` under `name`, replacing any previous template.
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        let cleaned: String = source.chars().filter(|c| *c != '\n' && *c != '\t').collect();
        let template = Template::parse(name, &cleaned)?;
        self.templates.insert(name.to_string(), template);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn render(&self, name: &str, data: Value) -> Result<String, RenderError> {
        exec::render(&self.templates, name, data)
    }

    /// Load templates from files or directories.
    ///
    /// A file is stored under its file name. A directory contributes every
    /// `*.tmpl` file directly inside it. Names starting with `.` or `~` are
    /// skipped. Returns the number of templates loaded.
    pub fn load_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, InletError> {
        let mut loaded = 0;
        for path in paths {
            let path = path.as_ref();
            let meta = fs::metadata(path).map_err(|e| InletError::FileInfo {
                file: path.display().to_string(),
                err: e.to_string(),
            })?;

            if meta.is_dir() {
                for file in list_files(path, TEMPLATE_EXTENSION)? {
                    loaded += self.load_file(&file)?;
                }
            } else {
                loaded += self.load_file(path)?;
            }
        }
        Ok(loaded)
    }

    fn load_file(&mut self, path: &Path) -> Result<usize, InletError> {
        let Some(name) = visible_name(path) else {
            return Ok(0);
        };

        let source = fs::read_to_string(path).map_err(|e| InletError::ReadFile {
            file: path.display().to_string(),
            err: e.to_string(),
        })?;
        self.add(&name, &source).map_err(|e| InletError::AddTemplateFailed {
            file: path.display().to_string(),
            err: e.to_string(),
        })?;

        tracing::debug!(template = %name, file = %path.display(), "Loaded template");
        Ok(1)
    }
}

/// File name of `path` unless it is hidden (`.`) or a backup (`~`).
pub(crate) fn visible_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    if name.starts_with('.') || name.starts_with('~') {
        return None;
    }
    Some(name)
}

/// Regular files with `extension` directly inside `dir`, sorted by path.
pub(crate) fn list_files(dir: &Path, extension: &str) -> Result<Vec<std::path::PathBuf>, InletError> {
    let list_err = |e: std::io::Error| InletError::ListDirectory {
        dir: dir.display().to_string(),
        err: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_strips_newlines_and_tabs() {
        let mut store = TemplateStore::new();
        store.add("t", "{\n\t\"x\": {{.x}}\n}\n").unwrap();
        let out = store.render("t", Value::from(json!({"x": 1}))).unwrap();
        assert_eq!(out, r#"{"x": 1}"#);
    }

    #[test]
    fn test_add_rejects_bad_template() {
        let mut store = TemplateStore::new();
        assert!(store.add("bad", "{{if .x}}").is_err());
        assert!(!store.contains("bad"));
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("user.tmpl"), "{{.name}}").unwrap();
        fs::write(dir.path().join(".hidden.tmpl"), "{{.name}}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = TemplateStore::new();
        let loaded = store.load_paths(&[dir.path()]).unwrap();

        assert_eq!(loaded, 1);
        assert!(store.contains("user.tmpl"));
        assert!(!store.contains(".hidden.tmpl"));
    }

    #[test]
    fn test_load_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("order.json.tmpl");
        fs::write(&file, "{{.id}}").unwrap();

        let mut store = TemplateStore::new();
        store.load_paths(&[&file]).unwrap();
        assert!(store.contains("order.json.tmpl"));
    }

    #[test]
    fn test_load_errors() {
        let mut store = TemplateStore::new();
        let err = store.load_paths(&["/definitely/not/here"]).unwrap_err();
        assert_eq!(err.code(), 18);

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.tmpl"), "{{end}}").unwrap();
        let err = store.load_paths(&[dir.path()]).unwrap_err();
        assert!(matches!(err, InletError::AddTemplateFailed { .. }));
        assert_eq!(err.code(), 15);
    }
}

//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::schema::{AddressConfig, GraphConfig, InletConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Extension of config files picked up from include directories.
const INCLUDE_EXTENSION: &str = "toml";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "IO error ({}): {}", path.display(), source),
            ConfigError::Parse { path, source } => write!(f, "Parse error ({}): {}", path.display(), source),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Validation(_) => None,
        }
    }
}

/// The part of an included file that is merged into the main config.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IncludedConfig {
    address: Vec<AddressConfig>,
    graphs: Vec<GraphConfig>,
}

/// Load, merge includes and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<InletConfig, ConfigError> {
    let mut config: InletConfig = parse_file(path)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for include in config.include_config_files.clone() {
        for file in include_files(&base.join(include.trim()))? {
            let included: IncludedConfig = parse_file(&file)?;
            tracing::debug!(
                file = %file.display(),
                addresses = included.address.len(),
                graphs = included.graphs.len(),
                "Merged included config"
            );
            config.address.extend(included.address);
            config.graphs.extend(included.graphs);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A file, or the sorted `*.toml` files of a directory.
fn include_files(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !fs::metadata(path).map_err(io_err)?.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let file = entry.map_err(io_err)?.path();
        if file.is_file() && file.extension().and_then(|e| e.to_str()) == Some(INCLUDE_EXTENSION) {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

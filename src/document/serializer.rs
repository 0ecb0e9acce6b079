//! Loading and writing YAML documents.
//!
//! Mapping order survives a load/render cycle because `serde_yaml` keeps keys
//! in insertion order. Comments are not carried over.

use crate::error::HelmVaultError;
use crate::traits::FileSystem;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Extension appended to every working file
pub const WORKING_FILE_EXTENSION: &str = "dec";

/// Parse YAML text, reporting failures against `file`
pub fn parse_document(file: &str, contents: &str) -> Result<Value, HelmVaultError> {
    serde_yaml::from_str(contents).map_err(|e| HelmVaultError::Serialization {
        file: file.to_string(),
        message: e.to_string(),
    })
}

/// Read and parse a YAML file
pub fn load_document(fs: &dyn FileSystem, path: &Path) -> Result<Value, HelmVaultError> {
    let file = path.display().to_string();
    let contents = fs
        .read_to_string(path)
        .map_err(|e| HelmVaultError::Serialization {
            file: file.clone(),
            message: format!("{:#}", e),
        })?;
    parse_document(&file, &contents)
}

/// Render a document back to YAML text
pub fn render_document(document: &Value) -> Result<String, HelmVaultError> {
    serde_yaml::to_string(document).map_err(|e| HelmVaultError::Serialization {
        file: "<output>".to_string(),
        message: e.to_string(),
    })
}

/// `<source>[.<environment>].dec`
pub fn working_file_name(source: &Path, environment: Option<&str>) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    if let Some(environment) = environment.filter(|e| !e.is_empty()) {
        name.push(".");
        name.push(environment);
    }
    name.push(".");
    name.push(WORKING_FILE_EXTENSION);
    PathBuf::from(name)
}

/// Render `document` to the working file for `source` and return its path
pub fn write_working_file(
    fs: &dyn FileSystem,
    source: &Path,
    environment: Option<&str>,
    document: &Value,
) -> anyhow::Result<PathBuf> {
    let target = working_file_name(source, environment);
    let rendered = render_document(document)?;
    fs.write(&target, &rendered)?;
    Ok(target)
}

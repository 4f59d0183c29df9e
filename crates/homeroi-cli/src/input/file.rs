use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use homeroi_core::{config, LoanParameters};

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// Read persisted loan parameters (YAML key: value mapping).
pub fn read_params(path: &str) -> Result<LoanParameters, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let params = config::from_yaml_str(&contents)
        .map_err(|e| format!("Failed to load '{}': {}", canonical.display(), e))?;
    Ok(params)
}

/// Persist loan parameters, refusing to replace an existing file unless
/// `overwrite` is set.
pub fn write_params(
    path: &str,
    params: &LoanParameters,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let p = Path::new(path);
    if p.exists() && !overwrite {
        return Err(format!("'{}' already exists (use --force to overwrite)", p.display()).into());
    }
    let text = config::to_yaml_string(params)?;
    fs::write(p, text).map_err(|e| format!("Failed to write '{}': {}", p.display(), e))?;
    tracing::info!(path = %p.display(), "saved loan parameters");
    Ok(())
}

/// Resolve and validate the path, preventing directory traversal.
fn resolve_path(path: &str) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    // Basic existence check
    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

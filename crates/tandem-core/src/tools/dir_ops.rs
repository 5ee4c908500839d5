//! Directory operation tools: create_directory, list_directory,
//! delete_directory.

use serde_json::{json, Value};
use tracing::debug;

use super::{require_str, translate_io_error};

/// Create a directory tree. Creating an already-existing directory is an
/// idempotent success, reported via `already_exists`.
pub async fn execute_create_directory(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    debug!("Creating directory: {}", path);

    if std::path::Path::new(path).is_dir() {
        return Ok(json!({
            "path": path,
            "created": false,
            "already_exists": true,
        }));
    }

    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(json!({
            "path": path,
            "created": true,
            "already_exists": false,
        })),
        Err(e) => Err(translate_io_error(path, &e)),
    }
}

pub async fn execute_list_directory(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    debug!("Listing directory: {}", path);

    let read_dir = std::fs::read_dir(path).map_err(|e| translate_io_error(path, &e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| translate_io_error(path, &e))?;
        let metadata = entry.metadata().map_err(|e| translate_io_error(path, &e))?;
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "kind": if metadata.is_dir() { "directory" } else { "file" },
            "size": metadata.len(),
        }));
    }
    entries.sort_by(|a, b| {
        a["name"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["name"].as_str().unwrap_or_default())
    });

    Ok(json!({
        "path": path,
        "count": entries.len(),
        "entries": entries,
    }))
}

pub async fn execute_delete_directory(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    debug!("Deleting directory: {}", path);

    let meta = std::path::Path::new(path);
    if !meta.exists() {
        return Err(translate_io_error(
            path,
            &std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }
    if !meta.is_dir() {
        return Err(format!(
            "'{}' is not a directory. Use move_file or write_file for files.",
            path
        ));
    }

    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(json!({ "path": path, "deleted": true })),
        Err(e) => Err(translate_io_error(path, &e)),
    }
}

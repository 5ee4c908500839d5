//! File operation tools: read_file, write_file, move_file.

use serde_json::{json, Value};
use tracing::debug;

use super::{require_str, translate_io_error};

pub async fn execute_read_file(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    debug!("Reading file: {}", path);

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let lines = content.lines().count();
            Ok(json!({
                "path": path,
                "content": content,
                "lines": lines,
            }))
        }
        Err(e) => Err(translate_io_error(path, &e)),
    }
}

pub async fn execute_write_file(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    let content = require_str(args, "content")?;
    debug!("Writing {} bytes to {}", content.len(), path);

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!(
                    "could not create parent directory for '{}': {}",
                    path,
                    translate_io_error(&parent.to_string_lossy(), &e)
                )
            })?;
        }
    }

    match std::fs::write(path, content) {
        Ok(()) => Ok(json!({
            "path": path,
            "bytes_written": content.len(),
            "lines_written": content.lines().count(),
        })),
        Err(e) => Err(translate_io_error(path, &e)),
    }
}

pub async fn execute_move_file(args: &Value) -> Result<Value, String> {
    let source = require_str(args, "source")?;
    let destination = require_str(args, "destination")?;
    debug!("Moving {} -> {}", source, destination);

    if !std::path::Path::new(source).exists() {
        return Err(translate_io_error(
            source,
            &std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    if let Some(parent) = std::path::Path::new(destination).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| translate_io_error(&parent.to_string_lossy(), &e))?;
        }
    }

    match std::fs::rename(source, destination) {
        Ok(()) => Ok(json!({
            "moved_from": source,
            "moved_to": destination,
        })),
        Err(e) => Err(translate_io_error(source, &e)),
    }
}

//! File validation tool.

use serde_json::{json, Value};
use tracing::debug;

use super::{require_str, translate_io_error};

/// Check that a file exists and is valid UTF-8; `.json` files must also
/// parse. Validation findings are reported in the payload, not as errors;
/// only missing or unreadable files fail.
pub async fn execute_validate_file(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    debug!("Validating file: {}", path);

    let bytes = std::fs::read(path).map_err(|e| translate_io_error(path, &e))?;

    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            return Ok(json!({
                "path": path,
                "valid": false,
                "reason": "file is not valid UTF-8",
            }));
        }
    };

    let is_json = std::path::Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        if let Err(e) = serde_json::from_str::<Value>(&content) {
            return Ok(json!({
                "path": path,
                "valid": false,
                "format": "json",
                "reason": format!("invalid JSON: {}", e),
            }));
        }
    }

    Ok(json!({
        "path": path,
        "valid": true,
        "encoding": "utf-8",
        "lines": content.lines().count(),
        "format": if is_json { "json" } else { "text" },
    }))
}

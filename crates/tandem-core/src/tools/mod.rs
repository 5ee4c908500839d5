//! Concrete tool backends, one module per category.
//!
//! Every tool returns `Result<serde_json::Value, String>`: a structured
//! payload on success, an actionable remediation string on failure. Errors
//! never propagate past this layer; the executor folds them into the
//! result envelope.

pub mod agent;
pub mod command;
pub mod diff;
pub mod dir_ops;
pub mod file_ops;
pub mod network;
pub mod search;
pub mod validate;

pub use agent::{AgentSink, NullAgentSink};

/// Rewrite a low-level I/O failure into a message that names the remedy.
pub(crate) fn translate_io_error(path: &str, err: &std::io::Error) -> String {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => format!(
            "'{}' does not exist. Check the path, or create the parent directory first.",
            path
        ),
        ErrorKind::PermissionDenied => format!(
            "permission denied for '{}'. Adjust permissions or pick a path inside the workspace root.",
            path
        ),
        ErrorKind::AlreadyExists => format!(
            "'{}' already exists. Remove it first or choose a different path.",
            path
        ),
        _ => format!("operation on '{}' failed: {}", path, err),
    }
}

/// Extract a required string parameter, naming the actual problem when the
/// value is present but not a string.
pub(crate) fn require_str<'a>(
    args: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, String> {
    match args.get(key) {
        None => Err(format!("missing required parameter '{}'", key)),
        Some(value) => value.as_str().ok_or_else(|| {
            format!(
                "parameter '{}' must be a string, got {}",
                key,
                json_type_name(value)
            )
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Extract an optional string parameter.
pub(crate) fn optional_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str_missing_parameter() {
        let args = json!({});
        let err = require_str(&args, "path").unwrap_err();
        assert_eq!(err, "missing required parameter 'path'");
    }

    #[test]
    fn test_require_str_wrong_type_names_the_type() {
        let args = json!({ "path": 42 });
        let err = require_str(&args, "path").unwrap_err();
        assert!(err.contains("must be a string"));
        assert!(err.contains("a number"));

        let args = json!({ "path": ["a", "b"] });
        let err = require_str(&args, "path").unwrap_err();
        assert!(err.contains("an array"));
    }
}

//! Subprocess execution tool.
//!
//! The program and its arguments are passed as a structured argv array to
//! the host process-spawning API. No shell is involved, so there is no
//! quoting or escaping to get wrong.

use serde_json::{json, Value};
use tracing::debug;

use super::{optional_str, require_str};

/// Cap on captured stdout/stderr bytes per stream.
const MAX_CAPTURE_BYTES: usize = 16 * 1024;

pub async fn execute_run_command(args: &Value) -> Result<Value, String> {
    let program = require_str(args, "program")?;
    let cmd_args: Vec<String> = args
        .get("args")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let working_dir = optional_str(args, "working_dir");

    debug!("Running command: {} {:?}", program, cmd_args);

    let mut command = tokio::process::Command::new(program);
    command.args(&cmd_args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            format!(
                "program '{}' was not found. Install it or use an absolute path.",
                program
            )
        } else {
            format!("failed to run '{}': {}", program, e)
        }
    })?;

    let (stdout, stdout_truncated) = capture(&output.stdout);
    let (stderr, stderr_truncated) = capture(&output.stderr);

    Ok(json!({
        "program": program,
        "exit_code": output.status.code(),
        "success": output.status.success(),
        "stdout": stdout,
        "stderr": stderr,
        "truncated": stdout_truncated || stderr_truncated,
    }))
}

fn capture(bytes: &[u8]) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.len() > MAX_CAPTURE_BYTES {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < MAX_CAPTURE_BYTES)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        (text[..cut].to_string(), true)
    } else {
        (text.into_owned(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_echo() {
        let result = execute_run_command(&json!({
            "program": "echo",
            "args": ["hello", "world"]
        }))
        .await
        .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["exit_code"], 0);
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "hello world");
    }

    #[tokio::test]
    async fn test_argument_with_spaces_passes_verbatim() {
        // Structured argv means no quoting pitfalls
        let result = execute_run_command(&json!({
            "program": "echo",
            "args": ["one two; three"]
        }))
        .await
        .unwrap();
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "one two; three");
    }

    #[tokio::test]
    async fn test_nonzero_exit_code() {
        let result = execute_run_command(&json!({
            "program": "false"
        }))
        .await
        .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], 1);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = execute_run_command(&json!({
            "program": "definitely-not-a-real-program-xyz"
        }))
        .await
        .unwrap_err();
        assert!(err.contains("was not found"));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_run_command(&json!({
            "program": "pwd",
            "working_dir": dir.path().to_str().unwrap()
        }))
        .await
        .unwrap();
        let reported = result["stdout"].as_str().unwrap().trim().to_string();
        // Compare canonicalized paths (macOS tempdirs live behind /private)
        assert_eq!(
            std::fs::canonicalize(&reported).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }
}

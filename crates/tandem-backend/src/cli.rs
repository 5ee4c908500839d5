//! CLI subprocess backend.
//!
//! Serializes a [`BackendRequest`](crate::BackendRequest) into a structured
//! argument array for an external AI binary. Arguments are always passed as
//! an argv array, never interpolated into a shell string, so no quoting or
//! escaping is performed here at all.

use crate::{
    classify_error_text, AiBackend, BackendError, BackendRequest, BackendResponse, ChunkStream,
    ResponseMode, StreamChunk,
};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Environment variable used to hand the API key to the child process.
/// Passed via the environment rather than argv so it never shows up in
/// process listings.
const API_KEY_ENV: &str = "TANDEM_BACKEND_API_KEY";

/// Backend that shells out to an external AI CLI.
pub struct CliBackend {
    binary: PathBuf,
}

impl CliBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build the argv array for a request.
    fn build_args(request: &BackendRequest) -> Vec<String> {
        let mut args = vec![
            "--prompt".to_string(),
            request.prompt.clone(),
            "--approval-mode".to_string(),
            request.approval_mode.as_str().to_string(),
            "--output-format".to_string(),
            match request.response_mode {
                ResponseMode::Async => "json".to_string(),
                ResponseMode::Stream => "stream-json".to_string(),
            },
        ];

        if let Some(model) = &request.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        if let Some(history_file) = &request.history_file {
            args.push("--history-file".to_string());
            args.push(history_file.to_string_lossy().into_owned());
        }

        for dir in &request.include_directories {
            args.push("--include-directory".to_string());
            args.push(dir.clone());
        }

        if let Some(instructions) = &request.tool_instructions {
            args.push("--tool-instructions".to_string());
            args.push(instructions.clone());
        }

        args
    }

    fn command(&self, request: &BackendRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(key) = &request.api_key {
            cmd.env(API_KEY_ENV, key);
        }
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> BackendError {
        if err.kind() == std::io::ErrorKind::NotFound {
            BackendError::BinaryNotFound {
                path: self.binary.to_string_lossy().into_owned(),
            }
        } else {
            BackendError::Backend {
                message: format!("failed to spawn backend binary: {}", err),
            }
        }
    }
}

fn drain_pipe<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn read_drained(task: Option<JoinHandle<Vec<u8>>>) -> String {
    match task {
        Some(task) => String::from_utf8_lossy(&task.await.unwrap_or_default()).into_owned(),
        None => String::new(),
    }
}

#[async_trait::async_trait]
impl AiBackend for CliBackend {
    async fn send(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        debug!("Spawning backend binary {:?}", self.binary);
        let mut child = self
            .command(&request)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Drain the pipes concurrently so a chatty child cannot fill them
        // and stall before exiting; the child itself stays here so the
        // cancel branch can kill it.
        let stdout_task = child.stdout.take().map(drain_pipe);
        let stderr_task = child.stderr.take().map(drain_pipe);

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(BackendError::Aborted);
            }
            status = child.wait() => status.map_err(|e| BackendError::Backend {
                message: format!("failed to wait for backend process: {}", e),
            })?,
        };

        let stdout = read_drained(stdout_task).await;
        let stderr = read_drained(stderr_task).await;

        if !status.success() {
            let raw = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(classify_error_text(&raw));
        }

        serde_json::from_str(stdout.trim()).map_err(|e| BackendError::Backend {
            message: format!("unparseable backend response: {}", e),
        })
    }

    async fn stream(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, BackendError> {
        debug!("Spawning backend binary {:?} (streaming)", self.binary);
        let mut child = self
            .command(&request)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().ok_or_else(|| BackendError::Backend {
            message: "backend process has no stdout".to_string(),
        })?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = child.kill().await;
                        break;
                    }
                    line = lines.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<StreamChunk>(trimmed) {
                            Ok(chunk) => {
                                let done = chunk == StreamChunk::Done;
                                if tx.send(chunk).await.is_err() || done {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Skipping unparseable stream line: {}", e);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(StreamChunk::Error {
                                error: format!("failed to read backend stream: {}", e),
                            })
                            .await;
                        break;
                    }
                }
            }
            let _ = child.wait().await;
        });

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        "cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApprovalMode;

    #[test]
    fn test_build_args_minimal() {
        let request = BackendRequest::new("Hello");
        let args = CliBackend::build_args(&request);
        assert_eq!(args[0], "--prompt");
        assert_eq!(args[1], "Hello");
        assert!(args.contains(&"--approval-mode".to_string()));
        assert!(args.contains(&"default".to_string()));
        assert!(args.contains(&"json".to_string()));
        assert!(!args.contains(&"--model".to_string()));
    }

    #[test]
    fn test_build_args_full() {
        let mut request = BackendRequest::new("Hello");
        request.approval_mode = ApprovalMode::Yolo;
        request.response_mode = ResponseMode::Stream;
        request.model = Some("large".to_string());
        request.history_file = Some(PathBuf::from("/tmp/history.json"));
        request.include_directories = vec!["/ws/src".to_string(), "/ws/docs".to_string()];
        request.tool_instructions = Some("# Tools".to_string());

        let args = CliBackend::build_args(&request);
        assert!(args.contains(&"yolo".to_string()));
        assert!(args.contains(&"stream-json".to_string()));
        assert!(args.contains(&"--model".to_string()));
        assert!(args.contains(&"/tmp/history.json".to_string()));
        assert_eq!(
            args.iter()
                .filter(|a| a.as_str() == "--include-directory")
                .count(),
            2
        );
    }

    #[test]
    fn test_api_key_not_in_args() {
        let mut request = BackendRequest::new("Hello");
        request.api_key = Some("secret".to_string());
        let args = CliBackend::build_args(&request);
        assert!(!args.iter().any(|a| a.contains("secret")));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_binary_not_found() {
        let backend = CliBackend::new("/nonexistent/definitely-not-a-binary");
        let result = backend
            .send(BackendRequest::new("Hello"), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(BackendError::BinaryNotFound { .. })));
    }

    #[cfg(unix)]
    fn stub_binary(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("stub-backend");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_parses_response_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_binary(dir.path(), r#"echo '{"response":"Hi from stub"}'"#);
        let backend = CliBackend::new(&bin);

        let resp = backend
            .send(BackendRequest::new("Hello"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.response, "Hi from stub");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_classifies_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_binary(dir.path(), "echo 'Quota exceeded for model' >&2; exit 1");
        let backend = CliBackend::new(&bin);

        let result = backend
            .send(BackendRequest::new("Hello"), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(BackendError::QuotaExceeded { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_in_flight_child() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_binary(dir.path(), "sleep 30");
        let backend = CliBackend::new(&bin);

        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                backend.send(BackendRequest::new("Hello"), cancel).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(BackendError::Aborted)));
    }
}

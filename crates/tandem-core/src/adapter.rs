//! AI call adapter.
//!
//! Sits between the coordinator and the backend: materializes the request's
//! history into a temp file, registers that file for cleanup, dispatches to
//! the backend, and checks async responses for embedded error envelopes.

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tandem_backend::{
    parse_error_envelope, AiBackend, BackendError, BackendRequest, BackendResponse, ChunkStream,
};

use crate::cleanup::{CleanupKind, CleanupManager};

pub struct AiCallAdapter {
    backend: Arc<dyn AiBackend>,
    cleanup: Arc<CleanupManager>,
    temp_dir: PathBuf,
}

impl AiCallAdapter {
    pub fn new(backend: Arc<dyn AiBackend>, cleanup: Arc<CleanupManager>) -> Self {
        Self {
            backend,
            cleanup,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Override where history temp files are written. Used in tests.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Dispatch an async-mode call. A response whose text is itself an
    /// error envelope is surfaced as the classified `Err`, never as
    /// assistant text.
    pub async fn call(
        &self,
        workspace_id: &str,
        session_id: &str,
        mut request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        self.stage_history(workspace_id, session_id, &mut request)?;
        debug!(
            "Dispatching async call to backend '{}' for session {}",
            self.backend.name(),
            session_id
        );

        let response = self.backend.send(request, cancel).await?;

        if let Some(err) = parse_error_envelope(&response.response) {
            warn!("Response for session {} carried an error envelope", session_id);
            return Err(err);
        }
        Ok(response)
    }

    /// Dispatch a streaming-mode call.
    pub async fn call_streaming(
        &self,
        workspace_id: &str,
        session_id: &str,
        mut request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, BackendError> {
        self.stage_history(workspace_id, session_id, &mut request)?;
        debug!(
            "Dispatching streaming call to backend '{}' for session {}",
            self.backend.name(),
            session_id
        );
        self.backend.stream(request, cancel).await
    }

    /// Serialize the request's history to a temp file, register it for
    /// cleanup under the session's scope, and point the request at it.
    fn stage_history(
        &self,
        workspace_id: &str,
        session_id: &str,
        request: &mut BackendRequest,
    ) -> Result<(), BackendError> {
        if request.history.is_empty() {
            return Ok(());
        }

        let file_name = format!(
            "tandem-history-{}-{}.json",
            session_id,
            uuid::Uuid::new_v4()
        );
        let path = self.temp_dir.join(file_name);

        let json =
            serde_json::to_string_pretty(&request.history).map_err(|e| BackendError::Backend {
                message: format!("could not serialize history: {}", e),
            })?;
        std::fs::write(&path, json).map_err(|e| BackendError::Backend {
            message: format!("could not write history file {:?}: {}", path, e),
        })?;

        self.cleanup
            .register(workspace_id, session_id, &path, CleanupKind::File);
        request.history_file = Some(path);
        Ok(())
    }
}

//! Session request coordinator.
//!
//! Owns the lifecycle of one chat request per session: the in-flight guard,
//! the elapsed-time ticker, optimistic history append, include parsing,
//! dispatch through the adapter, streaming accumulation, error remediation,
//! and end-of-request cleanup. Sessions are fully independent; within one
//! session at most one request is ever in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tandem_backend::{
    classify_error_text, ApprovalMode, BackendError, BackendRequest, ChatMessage,
    FatalToolErrorKind, HistoryEntry, MessageRole, ResponseMode, StreamChunk,
};

use crate::adapter::AiCallAdapter;
use crate::cleanup::CleanupManager;
use crate::executor::ToolExecutor;
use crate::instructions::generate_instructions;

/// Per-request defaults drawn from configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    pub approval_mode: ApprovalMode,
    pub response_mode: ResponseMode,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub include_directories: Vec<String>,
}

impl From<&tandem_config::Config> for RequestDefaults {
    fn from(config: &tandem_config::Config) -> Self {
        Self {
            approval_mode: config.chat.approval_mode,
            response_mode: config.chat.response_mode,
            model: config.backend.model.clone(),
            api_key: config.backend.api_key.clone(),
            include_directories: config.chat.include_directories.clone(),
        }
    }
}

struct SessionSlot {
    workspace_id: String,
    workspace_root: String,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    is_typing: bool,
    elapsed_seconds: Arc<AtomicU64>,
    streaming_buffer: Arc<Mutex<String>>,
    cancel: Option<CancellationToken>,
    ticker: Option<JoinHandle<()>>,
}

pub struct SessionCoordinator {
    sessions: Mutex<HashMap<String, SessionSlot>>,
    adapter: Arc<AiCallAdapter>,
    cleanup: Arc<CleanupManager>,
    executor: Arc<ToolExecutor>,
    defaults: RequestDefaults,
}

impl SessionCoordinator {
    pub fn new(
        adapter: Arc<AiCallAdapter>,
        cleanup: Arc<CleanupManager>,
        executor: Arc<ToolExecutor>,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            adapter,
            cleanup,
            executor,
            defaults,
        }
    }

    /// Attach a session with its history list. The coordinator only ever
    /// appends to and reads from the supplied list.
    pub fn attach_session(
        &self,
        session_id: &str,
        workspace_id: &str,
        workspace_root: &str,
        history: Arc<Mutex<Vec<ChatMessage>>>,
    ) {
        let slot = SessionSlot {
            workspace_id: workspace_id.to_string(),
            workspace_root: workspace_root.to_string(),
            history,
            is_typing: false,
            elapsed_seconds: Arc::new(AtomicU64::new(0)),
            streaming_buffer: Arc::new(Mutex::new(String::new())),
            cancel: None,
            ticker: None,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), slot);
    }

    pub fn is_typing(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|s| s.is_typing)
            .unwrap_or(false)
    }

    pub fn elapsed_seconds(&self, session_id: &str) -> u64 {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|s| s.elapsed_seconds.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Partial streamed text of the in-flight request, empty otherwise.
    pub fn streaming_text(&self, session_id: &str) -> String {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|s| s.streaming_buffer.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn set_enabled_tools(&self, names: Option<Vec<String>>) {
        self.executor.set_enabled_tools(names);
    }

    /// Send a message in a session and drive the request to settlement.
    /// Returns the id of the appended assistant message, or `None` when the
    /// call was a no-op (request already in flight) or cancelled.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Option<String> {
        let ctx = self.begin_request(session_id, text, None)?;
        self.run_request(ctx).await
    }

    /// Edit-and-resend: truncate history to just before `message_id`, then
    /// run the ordinary send pipeline with the new text.
    pub async fn resend_message(
        &self,
        session_id: &str,
        message_id: &str,
        new_text: &str,
    ) -> Option<String> {
        let ctx = self.begin_request(session_id, new_text, Some(message_id))?;
        self.run_request(ctx).await
    }

    /// Cancel the in-flight request for a session. Idempotent; safe when
    /// nothing is in flight or the session is unknown.
    pub fn cancel(&self, session_id: &str) {
        let sessions = self.sessions.lock().unwrap();
        if let Some(slot) = sessions.get(session_id) {
            if let Some(cancel) = &slot.cancel {
                info!("Cancelling in-flight request for session {}", session_id);
                cancel.cancel();
            }
        }
    }

    /// Atomically check the in-flight guard and enter the sending state.
    /// All state transitions happen under one lock acquisition.
    fn begin_request(
        &self,
        session_id: &str,
        text: &str,
        truncate_before: Option<&str>,
    ) -> Option<RequestContext> {
        let mut sessions = self.sessions.lock().unwrap();
        let slot = sessions.get_mut(session_id)?;

        if slot.is_typing {
            debug!(
                "Ignoring send for session {}: a request is already in flight",
                session_id
            );
            return None;
        }

        slot.is_typing = true;
        slot.elapsed_seconds.store(0, Ordering::Relaxed);
        slot.streaming_buffer.lock().unwrap().clear();

        let cancel = CancellationToken::new();
        slot.cancel = Some(cancel.clone());

        let elapsed = Arc::clone(&slot.elapsed_seconds);
        slot.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                elapsed.fetch_add(1, Ordering::Relaxed);
            }
        }));

        {
            let mut history = slot.history.lock().unwrap();
            if let Some(message_id) = truncate_before {
                if let Some(pos) = history.iter().position(|m| m.id == message_id) {
                    history.truncate(pos);
                }
            }
            // Optimistic append: the user sees their message immediately.
            history.push(ChatMessage::user(text));
        }

        Some(RequestContext {
            session_id: session_id.to_string(),
            workspace_id: slot.workspace_id.clone(),
            workspace_root: slot.workspace_root.clone(),
            history: Arc::clone(&slot.history),
            streaming_buffer: Arc::clone(&slot.streaming_buffer),
            text: text.to_string(),
            cancel,
        })
    }

    async fn run_request(&self, ctx: RequestContext) -> Option<String> {
        let request = self.build_request(&ctx);

        let outcome = match request.response_mode {
            ResponseMode::Async => {
                self.adapter
                    .call(&ctx.workspace_id, &ctx.session_id, request, ctx.cancel.clone())
                    .await
                    .map(|resp| (resp.response, resp.stats.total_tokens()))
            }
            ResponseMode::Stream => self.run_streaming(&ctx, request).await,
        };

        let appended = match outcome {
            Ok((text, tokens)) => {
                let mut message = ChatMessage::assistant(text);
                if tokens > 0 {
                    message.token_usage = Some(tokens);
                }
                let id = message.id.clone();
                ctx.history.lock().unwrap().push(message);
                Some(id)
            }
            Err(BackendError::Aborted) => {
                info!("Request for session {} was cancelled", ctx.session_id);
                None
            }
            Err(err) => {
                warn!("Request for session {} failed: {}", ctx.session_id, err);
                let message =
                    ChatMessage::assistant(remediation_message(&err, &ctx.workspace_root));
                let id = message.id.clone();
                ctx.history.lock().unwrap().push(message);
                Some(id)
            }
        };

        self.finish_request(&ctx).await;
        appended
    }

    async fn run_streaming(
        &self,
        ctx: &RequestContext,
        request: BackendRequest,
    ) -> Result<(String, u64), BackendError> {
        let mut stream = self
            .adapter
            .call_streaming(&ctx.workspace_id, &ctx.session_id, request, ctx.cancel.clone())
            .await?;

        let result = loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break Err(BackendError::Aborted),
                chunk = stream.next() => match chunk {
                    Some(StreamChunk::Text { content }) => {
                        ctx.streaming_buffer.lock().unwrap().push_str(&content);
                    }
                    Some(StreamChunk::Done) => {
                        // A cancel can land in the same poll as the final
                        // chunk; the token wins so the buffer is discarded.
                        if ctx.cancel.is_cancelled() {
                            break Err(BackendError::Aborted);
                        }
                        let text = ctx.streaming_buffer.lock().unwrap().clone();
                        break Ok((text, 0));
                    }
                    Some(StreamChunk::Error { error }) => {
                        break Err(classify_error_text(&error));
                    }
                    // Stream closed without Done: cancelled backends kill
                    // the source without a terminal chunk, so check the
                    // token before keeping what arrived.
                    None => {
                        if ctx.cancel.is_cancelled() {
                            break Err(BackendError::Aborted);
                        }
                        let text = ctx.streaming_buffer.lock().unwrap().clone();
                        break Ok((text, 0));
                    }
                }
            }
        };

        ctx.streaming_buffer.lock().unwrap().clear();
        result
    }

    fn build_request(&self, ctx: &RequestContext) -> BackendRequest {
        let (history_entries, transcript) = {
            let history = ctx.history.lock().unwrap();
            let visible: Vec<&ChatMessage> = history
                .iter()
                .filter(|m| m.role != MessageRole::System && !m.hidden)
                .collect();

            let entries: Vec<HistoryEntry> = visible
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect();
            let transcript: String = visible
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), m.content))
                .collect::<Vec<_>>()
                .join("\n");
            (entries, transcript)
        };

        let mut include_directories = self.defaults.include_directories.clone();
        include_directories.extend(parse_context_includes(&ctx.text, &ctx.workspace_root));

        let mut request = BackendRequest::new(&ctx.text);
        request.history = history_entries;
        request.transcript = transcript;
        request.approval_mode = self.defaults.approval_mode;
        request.response_mode = self.defaults.response_mode;
        request.model = self.defaults.model.clone();
        request.api_key = self.defaults.api_key.clone();
        request.include_directories = include_directories;
        let enabled = self.executor.enabled_tools();
        let instructions = generate_instructions(self.executor.registry(), enabled.as_deref());
        if !instructions.is_empty() {
            request.tool_instructions = Some(instructions);
        }
        request
    }

    /// Reset session state and release the in-flight guard, then run
    /// best-effort resource cleanup. Runs on every settlement path.
    async fn finish_request(&self, ctx: &RequestContext) {
        {
            let mut sessions = self.sessions.lock().unwrap();
            if let Some(slot) = sessions.get_mut(&ctx.session_id) {
                slot.is_typing = false;
                slot.cancel = None;
                slot.streaming_buffer.lock().unwrap().clear();
                if let Some(ticker) = slot.ticker.take() {
                    ticker.abort();
                }
            }
        }

        let deleted = self
            .cleanup
            .cleanup_session(&ctx.session_id, Some(&ctx.workspace_id))
            .await;
        if deleted > 0 {
            debug!(
                "Cleaned {} resources for session {}",
                deleted, ctx.session_id
            );
        }
    }
}

struct RequestContext {
    session_id: String,
    workspace_id: String,
    workspace_root: String,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    streaming_buffer: Arc<Mutex<String>>,
    text: String,
    cancel: CancellationToken,
}

/// Parse `#file:`, `#folder:` and `#codebase` context markers out of the
/// raw message text. Relative references are kept relative; the backend
/// resolves them against its own include handling.
fn parse_context_includes(text: &str, _workspace_root: &str) -> Vec<String> {
    let mut includes = Vec::new();
    for token in text.split_whitespace() {
        if let Some(path) = token.strip_prefix("#file:") {
            if !path.is_empty() {
                includes.push(path.to_string());
            }
        } else if let Some(path) = token.strip_prefix("#folder:") {
            if !path.is_empty() {
                includes.push(path.to_string());
            }
        } else if token == "#codebase" {
            includes.push(".".to_string());
        }
    }
    includes
}

/// Map a settled error to the user-facing remediation text.
fn remediation_message(err: &BackendError, workspace_root: &str) -> String {
    match err {
        BackendError::QuotaExceeded { .. } => {
            "The AI service reported a rate limit (429). Wait a minute and try again, \
or switch to a model with spare quota."
                .to_string()
        }
        BackendError::FatalToolExecution { kind, message } => match kind {
            FatalToolErrorKind::PathOutsideWorkspace => format!(
                "A tool call referenced a path outside the workspace root ({}). \
Refer to files with #file: or #folder: so they resolve inside the workspace.\n\nDetails: {}",
                workspace_root, message
            ),
            FatalToolErrorKind::UnknownTool => format!(
                "The assistant tried to call a tool that is not available. \
Re-send your request; if it keeps happening, check which tools are enabled.\n\nDetails: {}",
                message
            ),
            FatalToolErrorKind::ApprovalRequired => format!(
                "A tool call was blocked by the current approval mode. \
Switch the approval mode to auto_edit (or yolo for unrestricted runs) and try again.\n\nDetails: {}",
                message
            ),
        },
        BackendError::BinaryNotFound { path } => format!(
            "The backend binary was not found at '{}'. Install it or point \
the configuration's binary_path at the right location.",
            path
        ),
        BackendError::Aborted => "The request was cancelled.".to_string(),
        BackendError::Backend { message } => format!(
            "The request failed with an unexpected error. You can retry, \
rephrase, or check the backend logs.\n\nDetails: {}",
            message
        ),
    }
}

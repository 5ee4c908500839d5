pub mod cli;
pub mod mock;

pub use cli::CliBackend;
pub use mock::{MockBackend, MockReply};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Trait for AI backends (CLI subprocess, HTTP API, or mocks).
///
/// A backend receives one fully-built logical request and produces either a
/// single normalized response (async mode) or a stream of chunks (stream
/// mode). How the request is serialized onto the wire is the backend's
/// concern alone.
#[async_trait::async_trait]
pub trait AiBackend: Send + Sync {
    /// Issue a request and wait for the complete response.
    async fn send(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError>;

    /// Issue a request and stream the response as incremental chunks.
    async fn stream(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, BackendError>;

    /// Get the backend name (for logging).
    fn name(&self) -> &str;
}

pub type ChunkStream = tokio_stream::wrappers::ReceiverStream<StreamChunk>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single chat message as stored in a session's history.
///
/// The core only appends to and reads from the message list; persistence is
/// the embedding application's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ResponseStats>,
    /// Excluded from rendered history but kept in the persisted log.
    #[serde(default)]
    pub hidden: bool,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            token_usage: None,
            stats: None,
            hidden: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Policy governing whether tool invocations require user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    #[default]
    Default,
    AutoEdit,
    Yolo,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Default => "default",
            ApprovalMode::AutoEdit => "auto_edit",
            ApprovalMode::Yolo => "yolo",
        }
    }
}

/// Response delivery mode: one final payload, or incremental chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Async,
    Stream,
}

/// One conversation turn in the structured history sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

/// The single logical request the core hands to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    pub prompt: String,
    /// Non-system conversation history as structured turns.
    pub history: Vec<HistoryEntry>,
    /// The same history flattened into one transcript string.
    pub transcript: String,
    pub approval_mode: ApprovalMode,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub include_directories: Vec<String>,
    /// Generated tool instruction block, if tools are enabled.
    pub tool_instructions: Option<String>,
    /// Temp file holding the serialized history, written by the adapter.
    pub history_file: Option<PathBuf>,
    pub response_mode: ResponseMode,
}

impl BackendRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            transcript: String::new(),
            approval_mode: ApprovalMode::default(),
            model: None,
            api_key: None,
            include_directories: Vec::new(),
            tool_instructions: None,
            history_file: None,
            response_mode: ResponseMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiStats {
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub total_errors: u64,
    #[serde(default)]
    pub total_latency_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStats {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cached: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStats {
    #[serde(default)]
    pub api: ApiStats,
    #[serde(default)]
    pub tokens: TokenStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallStats {
    #[serde(default)]
    pub total_calls: u64,
    #[serde(default)]
    pub total_success: u64,
    #[serde(default)]
    pub total_fail: u64,
    #[serde(default)]
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChangeStats {
    #[serde(default)]
    pub total_lines_added: u64,
    #[serde(default)]
    pub total_lines_removed: u64,
}

/// Usage statistics reported alongside a completed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseStats {
    #[serde(default)]
    pub models: HashMap<String, ModelStats>,
    #[serde(default)]
    pub tools: ToolCallStats,
    #[serde(default)]
    pub files: FileChangeStats,
}

impl ResponseStats {
    /// Sum token usage across all reported model entries.
    pub fn total_tokens(&self) -> u64 {
        self.models.values().map(|m| m.tokens.total).sum()
    }
}

/// Normalized response envelope for async mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    pub response: String,
    #[serde(default)]
    pub stats: ResponseStats,
}

/// One incremental chunk in streaming mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Text { content: String },
    Done,
    Error { error: String },
}

/// How the backend's own tool dispatch failed, when it failed fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalToolErrorKind {
    PathOutsideWorkspace,
    UnknownTool,
    ApprovalRequired,
}

/// Errors surfaced by a backend, classified at this boundary so callers
/// switch on a closed enum instead of matching raw error text.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("rate limit exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("fatal tool execution error ({kind:?}): {message}")]
    FatalToolExecution {
        kind: FatalToolErrorKind,
        message: String,
    },

    #[error("backend binary not found at '{path}'")]
    BinaryNotFound { path: String },

    #[error("request aborted")]
    Aborted,

    #[error("backend error: {message}")]
    Backend { message: String },
}

/// Classify raw backend error text into a tagged variant.
///
/// The substring checks live here and nowhere else; upstream message
/// changes only ever need fixing in this one place.
pub fn classify_error_text(raw: &str) -> BackendError {
    let lower = raw.to_lowercase();

    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("quota")
        || lower.contains("resource_exhausted")
    {
        return BackendError::QuotaExceeded {
            message: raw.to_string(),
        };
    }

    if lower.contains("fataltoolexecutionerror") || lower.contains("tool execution failed") {
        let kind = if (lower.contains("outside") && lower.contains("workspace"))
            || lower.contains("absolute path")
        {
            FatalToolErrorKind::PathOutsideWorkspace
        } else if lower.contains("not registered") || lower.contains("unknown tool") {
            FatalToolErrorKind::UnknownTool
        } else if lower.contains("approval") || lower.contains("not allowed") {
            FatalToolErrorKind::ApprovalRequired
        } else {
            FatalToolErrorKind::UnknownTool
        };
        return BackendError::FatalToolExecution {
            kind,
            message: raw.to_string(),
        };
    }

    BackendError::Backend {
        message: raw.to_string(),
    }
}

/// Detect a response whose text is itself a JSON-encoded error envelope.
///
/// Some backends report internal failures (notably fatal tool dispatch
/// errors) as ordinary response text containing a serialized error object.
/// Returns the classified error if the text is such an envelope, None if it
/// is ordinary assistant text.
pub fn parse_error_envelope(response_text: &str) -> Option<BackendError> {
    let trimmed = response_text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let error_obj = value.get("error")?;

    let error_type = error_obj
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let message = error_obj
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(trimmed);

    if error_type.contains("FatalToolExecution") {
        // Re-run classification over the embedded message for the kind.
        let combined = format!("FatalToolExecutionError: {}", message);
        return Some(classify_error_text(&combined));
    }

    let code = error_obj.get("code").and_then(|c| c.as_u64());
    if code == Some(429) || error_type.contains("Quota") {
        return Some(BackendError::QuotaExceeded {
            message: message.to_string(),
        });
    }

    Some(classify_error_text(message))
}

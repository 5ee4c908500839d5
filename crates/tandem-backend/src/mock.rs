//! Mock AI backend for testing.
//!
//! Provides a scripted backend that can replay canned responses, tagged
//! errors, and chunk sequences, with optional settle delays and a
//! hold-until-cancelled mode for cancellation tests. Every request the
//! backend receives is recorded for later inspection.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_backend::mock::{MockBackend, MockReply};
//!
//! let backend = MockBackend::new()
//!     .with_reply(MockReply::text("Hi there"))
//!     .with_reply(MockReply::error(BackendError::Aborted));
//! ```

use crate::{
    AiBackend, BackendError, BackendRequest, BackendResponse, ChunkStream, ModelStats,
    ResponseStats, StreamChunk, TokenStats,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Settle successfully with this response envelope.
    Response(BackendResponse),
    /// Settle with a tagged error.
    Error(BackendError),
    /// Stream these chunks in order (stream mode only).
    Chunks(Vec<StreamChunk>),
    /// Never settle; wait for the cancellation token and report Aborted.
    HoldUntilCancelled,
}

impl MockReply {
    /// A plain text response with empty stats.
    pub fn text(content: &str) -> Self {
        MockReply::Response(BackendResponse {
            response: content.to_string(),
            stats: ResponseStats::default(),
        })
    }

    /// A text response reporting token usage under a single model entry.
    pub fn text_with_tokens(content: &str, total_tokens: u64) -> Self {
        let mut stats = ResponseStats::default();
        stats.models.insert(
            "main".to_string(),
            ModelStats {
                tokens: TokenStats {
                    total: total_tokens,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        MockReply::Response(BackendResponse {
            response: content.to_string(),
            stats,
        })
    }

    pub fn error(err: BackendError) -> Self {
        MockReply::Error(err)
    }

    /// A streaming script: each text becomes a chunk, followed by Done.
    pub fn streaming(texts: Vec<&str>) -> Self {
        let mut chunks: Vec<StreamChunk> = texts
            .into_iter()
            .map(|t| StreamChunk::Text {
                content: t.to_string(),
            })
            .collect();
        chunks.push(StreamChunk::Done);
        MockReply::Chunks(chunks)
    }
}

/// Scripted mock backend.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Delay before each reply settles (to widen race windows in tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockReply::text("ok"))
    }

    fn record(&self, request: &BackendRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AiBackend for MockBackend {
    async fn send(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        self.record(&request);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(BackendError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match self.next_reply() {
            MockReply::Response(resp) => Ok(resp),
            MockReply::Error(err) => Err(err),
            MockReply::Chunks(chunks) => {
                // Fold a streaming script into one response for async mode.
                let text: String = chunks
                    .iter()
                    .filter_map(|c| match c {
                        StreamChunk::Text { content } => Some(content.as_str()),
                        _ => None,
                    })
                    .collect();
                Ok(BackendResponse {
                    response: text,
                    stats: ResponseStats::default(),
                })
            }
            MockReply::HoldUntilCancelled => {
                cancel.cancelled().await;
                Err(BackendError::Aborted)
            }
        }
    }

    async fn stream(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, BackendError> {
        self.record(&request);

        let reply = self.next_reply();
        let delay = self.delay;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let chunks = match reply {
                MockReply::Chunks(chunks) => chunks,
                MockReply::Response(resp) => vec![
                    StreamChunk::Text {
                        content: resp.response,
                    },
                    StreamChunk::Done,
                ],
                MockReply::Error(err) => vec![StreamChunk::Error {
                    error: err.to_string(),
                }],
                MockReply::HoldUntilCancelled => {
                    cancel.cancelled().await;
                    return;
                }
            };

            for chunk in chunks {
                if cancel.is_cancelled() {
                    return;
                }
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

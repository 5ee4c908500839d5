//! Agent-to-user communication tools.
//!
//! `update_progress` and `show_notice` have no filesystem effect; they
//! forward through an [`AgentSink`] the host application provides.

use serde_json::{json, Value};

use super::require_str;

/// Receives user-facing signals emitted by the assistant mid-task.
pub trait AgentSink: Send + Sync {
    /// Replace the current progress line for the running task.
    fn update_progress(&self, message: &str);
    /// Surface a one-off notice.
    fn show_notice(&self, message: &str);
}

/// Sink that drops everything. Used when no UI is attached.
pub struct NullAgentSink;

impl AgentSink for NullAgentSink {
    fn update_progress(&self, _message: &str) {}
    fn show_notice(&self, _message: &str) {}
}

pub async fn execute_update_progress(
    args: &Value,
    sink: &dyn AgentSink,
) -> Result<Value, String> {
    let message = require_str(args, "message")?;
    sink.update_progress(message);
    Ok(json!({ "acknowledged": true }))
}

pub async fn execute_show_notice(args: &Value, sink: &dyn AgentSink) -> Result<Value, String> {
    let message = require_str(args, "message")?;
    sink.show_notice(message);
    Ok(json!({ "acknowledged": true }))
}

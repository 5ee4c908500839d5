//! Tool executor: the single dispatch point between tool-call requests and
//! the concrete tool backends.
//!
//! The executor strips the advertised name prefix, resolves path parameters
//! against the workspace root, checks the enablement filter, runs the tool,
//! and folds the outcome into a uniform result envelope. Tool failures are
//! data, not `Err`: every call settles into a [`ToolExecutionResult`] so
//! callers never need to branch on transport-level errors.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

use crate::paths::resolve_workspace_path;
use crate::registry::{ToolRegistry, ADVERTISED_PREFIX};
use crate::stats::StatsTracker;
use crate::tools;
use crate::tools::AgentSink;

/// Uniform envelope for one settled tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub success: bool,
    pub result: Value,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ToolExecutionResult {
    pub fn success(tool_name: &str, result: Value, execution_time_ms: u64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            result,
            error: None,
            execution_time_ms,
        }
    }

    pub fn failure(tool_name: &str, error: &str, execution_time_ms: u64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            result: Value::Null,
            error: Some(error.to_string()),
            execution_time_ms,
        }
    }
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    stats: Arc<StatsTracker>,
    sink: Arc<dyn AgentSink>,
    /// `None` means all registered tools are enabled.
    enabled: Mutex<Option<Vec<String>>>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, stats: Arc<StatsTracker>, sink: Arc<dyn AgentSink>) -> Self {
        Self {
            registry,
            stats,
            sink,
            enabled: Mutex::new(None),
        }
    }

    /// Restrict dispatch to the named tools. `None` re-enables everything.
    pub fn set_enabled_tools(&self, names: Option<Vec<String>>) {
        *self.enabled.lock().unwrap() = names;
    }

    /// Current enablement filter; `None` means everything is enabled.
    pub fn enabled_tools(&self) -> Option<Vec<String>> {
        self.enabled.lock().unwrap().clone()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Execute one tool call. `tool_name` may carry the advertised prefix.
    /// Path parameters in `params` are resolved against `workspace_root`
    /// before dispatch.
    pub async fn execute(
        &self,
        tool_name: &str,
        params: Value,
        workspace_root: &str,
    ) -> ToolExecutionResult {
        let started = Instant::now();
        let name = tool_name.strip_prefix(ADVERTISED_PREFIX).unwrap_or(tool_name);
        debug!("Executing tool: {}", name);

        let result = self.dispatch(name, params, workspace_root).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let envelope = match result {
            Ok(payload) => ToolExecutionResult::success(name, payload, elapsed_ms),
            Err(message) => {
                warn!("Tool {} failed: {}", name, message);
                ToolExecutionResult::failure(name, &message, elapsed_ms)
            }
        };
        self.stats.record_execution(&envelope);
        envelope
    }

    async fn dispatch(
        &self,
        name: &str,
        mut params: Value,
        workspace_root: &str,
    ) -> Result<Value, String> {
        let def = self.registry.get(name).ok_or_else(|| {
            format!(
                "tool '{}' is not registered. Call one of the advertised tools exactly as listed.",
                name
            )
        })?;

        if let Some(enabled) = self.enabled.lock().unwrap().as_ref() {
            if !enabled.iter().any(|n| n == name) {
                return Err(format!(
                    "tool '{}' is disabled in this session's configuration.",
                    name
                ));
            }
        }

        if let Some(obj) = params.as_object_mut() {
            for param in def.path_params {
                if let Some(Value::String(raw)) = obj.get(*param) {
                    let resolved = resolve_workspace_path(raw, workspace_root);
                    obj.insert((*param).to_string(), Value::String(resolved));
                }
            }
        }

        match name {
            "read_file" => tools::file_ops::execute_read_file(&params).await,
            "write_file" => tools::file_ops::execute_write_file(&params).await,
            "move_file" => tools::file_ops::execute_move_file(&params).await,
            "create_directory" => tools::dir_ops::execute_create_directory(&params).await,
            "list_directory" => tools::dir_ops::execute_list_directory(&params).await,
            "delete_directory" => tools::dir_ops::execute_delete_directory(&params).await,
            "search_files" => tools::search::execute_search_files(&params, workspace_root).await,
            "run_command" => tools::command::execute_run_command(&params).await,
            "validate_file" => tools::validate::execute_validate_file(&params).await,
            "apply_diff" => tools::diff::execute_apply_diff(&params).await,
            "http_fetch" => tools::network::execute_http_fetch(&params).await,
            "update_progress" => {
                tools::agent::execute_update_progress(&params, self.sink.as_ref()).await
            }
            "show_notice" => tools::agent::execute_show_notice(&params, self.sink.as_ref()).await,
            other => Err(format!("tool '{}' has no dispatch entry", other)),
        }
    }
}

//! Tool execution statistics.
//!
//! One [`StatsTracker`] instance is shared by every session's tool calls.
//! Each recording is a single lock-guarded step, so interleaved calls from
//! concurrent sessions cannot lose updates.

use crate::executor::ToolExecutionResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerToolStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_execution_time_ms: f64,
}

/// Process-wide running aggregate of tool executions.
///
/// Invariants: `success_count + failure_count == total_calls`, and for
/// every tool `calls == successes + failures`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolExecutionStats {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_execution_time_ms: u64,
    pub by_tool: HashMap<String, PerToolStats>,
}

pub struct StatsTracker {
    inner: Mutex<ToolExecutionStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ToolExecutionStats::default()),
        }
    }

    /// Record one settled tool invocation, success or failure.
    pub fn record_execution(&self, result: &ToolExecutionResult) {
        let mut stats = self.inner.lock().unwrap();

        stats.total_calls += 1;
        if result.success {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }
        stats.total_execution_time_ms += result.execution_time_ms;

        let entry = stats.by_tool.entry(result.tool_name.clone()).or_default();
        entry.calls += 1;
        if result.success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        // Incremental running average over this tool's calls.
        let n = entry.calls as f64;
        entry.avg_execution_time_ms =
            (entry.avg_execution_time_ms * (n - 1.0) + result.execution_time_ms as f64) / n;
    }

    pub fn snapshot(&self) -> ToolExecutionStats {
        self.inner.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        *self.inner.lock().unwrap() = ToolExecutionStats::default();
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

//! Core engine of the Tandem chat client: tool registry and execution,
//! instruction generation, temp-resource cleanup, and the per-session
//! request coordinator that ties them to an AI backend.

pub mod adapter;
pub mod cleanup;
pub mod coordinator;
pub mod executor;
pub mod instructions;
pub mod paths;
pub mod registry;
pub mod stats;
pub mod tools;

pub use adapter::AiCallAdapter;
pub use cleanup::{CleanupKind, CleanupManager};
pub use coordinator::{RequestDefaults, SessionCoordinator};
pub use executor::{ToolExecutionResult, ToolExecutor};
pub use instructions::generate_instructions;
pub use paths::resolve_workspace_path;
pub use registry::{ToolCategory, ToolDefinition, ToolRegistry, ADVERTISED_PREFIX};
pub use stats::{StatsTracker, ToolExecutionStats};
pub use tools::{AgentSink, NullAgentSink};

//! Tool registry: the static catalog of assistant-invocable operations.
//!
//! Pure data. Each definition carries the JSON schema shown to the LLM and
//! the list of parameters the executor must resolve against the workspace
//! root before dispatch.

use serde_json::json;

/// Prefix added to tool names when they are advertised to the LLM; the
/// executor strips it before dispatch.
pub const ADVERTISED_PREFIX: &str = "TandemTool_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    File,
    Directory,
    Search,
    Command,
    Validation,
    Diff,
    Network,
    Agent,
}

impl ToolCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ToolCategory::File => "File Operations",
            ToolCategory::Directory => "Directory Operations",
            ToolCategory::Search => "Search",
            ToolCategory::Command => "Command Execution",
            ToolCategory::Validation => "Validation",
            ToolCategory::Diff => "Diff Application",
            ToolCategory::Network => "Network",
            ToolCategory::Agent => "Agent Communication",
        }
    }
}

/// Immutable descriptor for one invocable tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    pub input_schema: serde_json::Value,
    /// Parameters that hold workspace-relative filesystem paths.
    pub path_params: &'static [&'static str],
}

/// Ordered catalog of all tool definitions. Insertion order is significant
/// for instruction generation and UI grouping.
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: build_catalog(),
        }
    }

    /// All definitions in registry order.
    pub fn all(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Definitions matching the given names, preserving registry order.
    pub fn by_names(&self, names: &[String]) -> Vec<&ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| names.iter().any(|n| n == t.name))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "read_file",
            description: "Read the contents of a file as UTF-8 text.",
            category: ToolCategory::File,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the workspace root"
                    }
                },
                "required": ["path"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "write_file",
            description: "Write content to a file (creates or overwrites). Parent directories are created as needed.",
            category: ToolCategory::File,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the workspace root"
                    },
                    "content": {
                        "type": "string",
                        "description": "The content to write"
                    }
                },
                "required": ["path", "content"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "move_file",
            description: "Move or rename a file.",
            category: ToolCategory::File,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "Current path of the file"
                    },
                    "destination": {
                        "type": "string",
                        "description": "New path for the file"
                    }
                },
                "required": ["source", "destination"]
            }),
            path_params: &["source", "destination"],
        },
        ToolDefinition {
            name: "create_directory",
            description: "Create a directory, including missing parents. Succeeds if the directory already exists.",
            category: ToolCategory::Directory,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory path, relative to the workspace root"
                    }
                },
                "required": ["path"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "list_directory",
            description: "List the entries of a directory with name, kind and size.",
            category: ToolCategory::Directory,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory path; omit or pass '.' for the workspace root"
                    }
                },
                "required": ["path"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "delete_directory",
            description: "Delete a directory and everything inside it.",
            category: ToolCategory::Directory,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory path, relative to the workspace root"
                    }
                },
                "required": ["path"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "search_files",
            description: "Find files matching a glob pattern (e.g. '**/*.rs' or 'src/*.json').",
            category: ToolCategory::Search,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern matched against paths relative to the search base"
                    },
                    "path": {
                        "type": "string",
                        "description": "Base directory to search from; defaults to the workspace root"
                    }
                },
                "required": ["pattern"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "run_command",
            description: "Run a program with an argument array and capture its output. Arguments are passed verbatim; no shell is involved.",
            category: ToolCategory::Command,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "program": {
                        "type": "string",
                        "description": "Program to execute"
                    },
                    "args": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Arguments passed to the program"
                    },
                    "working_dir": {
                        "type": "string",
                        "description": "Working directory; defaults to the workspace root"
                    }
                },
                "required": ["program"]
            }),
            path_params: &["working_dir"],
        },
        ToolDefinition {
            name: "validate_file",
            description: "Check that a file exists, is valid UTF-8, and (for .json files) parses.",
            category: ToolCategory::Validation,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file to validate"
                    }
                },
                "required": ["path"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "apply_diff",
            description: "Apply a unified diff to a file. Supports multiple hunks and context lines; @@ headers are optional for minimal diffs.",
            category: ToolCategory::Diff,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file to edit"
                    },
                    "diff": {
                        "type": "string",
                        "description": "Unified diff describing the change"
                    }
                },
                "required": ["path", "diff"]
            }),
            path_params: &["path"],
        },
        ToolDefinition {
            name: "http_fetch",
            description: "Fetch a URL with an HTTP GET and return status and body text.",
            category: ToolCategory::Network,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL to fetch (must include the protocol)"
                    },
                    "max_bytes": {
                        "type": "integer",
                        "description": "Maximum body bytes to return (default 65536)"
                    }
                },
                "required": ["url"]
            }),
            path_params: &[],
        },
        ToolDefinition {
            name: "update_progress",
            description: "Update the user-visible progress line for the current task.",
            category: ToolCategory::Agent,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Short progress description"
                    }
                },
                "required": ["message"]
            }),
            path_params: &[],
        },
        ToolDefinition {
            name: "show_notice",
            description: "Show a one-off notice to the user.",
            category: ToolCategory::Agent,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Notice text"
                    }
                },
                "required": ["message"]
            }),
            path_params: &[],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_size() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.all().len(), 13);
    }

    #[test]
    fn test_names_unique() {
        let registry = ToolRegistry::new();
        let names: HashSet<&str> = registry.all().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), registry.all().len());
    }

    #[test]
    fn test_schemas_well_formed() {
        let registry = ToolRegistry::new();
        for tool in registry.all() {
            assert!(!tool.description.is_empty(), "{} has no description", tool.name);
            let schema = tool.input_schema.as_object().expect("schema is an object");
            assert!(schema.contains_key("properties"), "{} lacks properties", tool.name);
            // Every declared path parameter must exist in the schema.
            let props = schema["properties"].as_object().unwrap();
            for param in tool.path_params {
                assert!(props.contains_key(*param), "{} missing path param {}", tool.name, param);
            }
        }
    }

    #[test]
    fn test_by_names_preserves_registry_order() {
        let registry = ToolRegistry::new();
        let names = vec!["run_command".to_string(), "read_file".to_string()];
        let tools = registry.by_names(&names);
        assert_eq!(tools.len(), 2);
        // Registry order, not request order
        assert_eq!(tools[0].name, "read_file");
        assert_eq!(tools[1].name, "run_command");
    }

    #[test]
    fn test_by_names_ignores_unknown() {
        let registry = ToolRegistry::new();
        let names = vec!["no_such_tool".to_string(), "write_file".to_string()];
        let tools = registry.by_names(&names);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "write_file");
    }

    #[test]
    fn test_get() {
        let registry = ToolRegistry::new();
        assert!(registry.get("apply_diff").is_some());
        assert!(registry.get("TandemTool_apply_diff").is_none());
    }
}

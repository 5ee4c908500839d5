//! Tool instruction generation.
//!
//! Renders the enabled slice of the registry into the plain-text block
//! embedded in the system prompt: calling conventions first, then one
//! section per category, then worked examples.

use crate::registry::{ToolDefinition, ToolRegistry, ADVERTISED_PREFIX};

/// Render instructions for the enabled tools. `None` enables the full
/// catalog; an explicit empty list yields an empty string so the prompt
/// carries no tool block at all.
pub fn generate_instructions(registry: &ToolRegistry, enabled: Option<&[String]>) -> String {
    let tools: Vec<&ToolDefinition> = match enabled {
        None => registry.all().iter().collect(),
        Some(names) => {
            if names.is_empty() {
                return String::new();
            }
            registry.by_names(names)
        }
    };
    if tools.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    out.push_str("## Available Tools\n\n");
    out.push_str(&format!(
        "You can call the tools listed below. Invoke a tool by its full name, \
which always starts with `{}`. Pass parameters as a JSON object matching the \
tool's schema.\n\n",
        ADVERTISED_PREFIX
    ));
    out.push_str(
        "Rules:\n\
- File and directory paths are resolved relative to the workspace root. \
Use relative paths unless you were given an absolute one.\n\
- Call one tool at a time and wait for its result before the next call.\n\
- A failed call returns an error message naming what to fix; correct the \
call instead of retrying it unchanged.\n\n",
    );

    // Sections follow the order categories first appear in the registry.
    let mut seen = Vec::new();
    for tool in &tools {
        if !seen.contains(&tool.category) {
            seen.push(tool.category);
        }
    }

    for category in seen {
        out.push_str(&format!("### {}\n\n", category.label()));
        for tool in tools.iter().filter(|t| t.category == category) {
            render_tool(&mut out, tool);
        }
    }

    // Worked examples come from the enabled slice only, so a disabled
    // tool is never advertised anywhere in the block.
    out.push_str("### Examples\n\n");
    for tool in tools.iter().take(2) {
        out.push_str(&format!(
            "Calling `{}{}`:\n```json\n{{\"tool\": \"{}{}\", \"parameters\": {}}}\n```\n\n",
            ADVERTISED_PREFIX,
            tool.name,
            ADVERTISED_PREFIX,
            tool.name,
            example_parameters(tool)
        ));
    }

    out
}

/// Build a placeholder parameter object from a tool's required fields.
fn example_parameters(tool: &ToolDefinition) -> String {
    let required: Vec<&str> = tool.input_schema["required"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut params = serde_json::Map::new();
    if let Some(props) = tool.input_schema["properties"].as_object() {
        for (param, schema) in props {
            if !required.contains(&param.as_str()) {
                continue;
            }
            let value = match schema["type"].as_str() {
                Some("integer") => serde_json::json!(1),
                Some("array") => serde_json::json!([]),
                _ => serde_json::json!(format!("<{}>", param)),
            };
            params.insert(param.clone(), value);
        }
    }
    serde_json::Value::Object(params).to_string()
}

fn render_tool(out: &mut String, tool: &ToolDefinition) {
    out.push_str(&format!(
        "**{}{}** — {}\n",
        ADVERTISED_PREFIX, tool.name, tool.description
    ));

    let required: Vec<&str> = tool.input_schema["required"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    if let Some(props) = tool.input_schema["properties"].as_object() {
        for (param, schema) in props {
            let kind = schema["type"].as_str().unwrap_or("string");
            let desc = schema["description"].as_str().unwrap_or("");
            let marker = if required.contains(&param.as_str()) {
                "required"
            } else {
                "optional"
            };
            out.push_str(&format!("  - `{}` ({}, {}): {}\n", param, kind, marker, desc));
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_catalog_mentions_every_tool() {
        let registry = ToolRegistry::new();
        let text = generate_instructions(&registry, None);
        for tool in registry.all() {
            assert!(
                text.contains(&format!("{}{}", ADVERTISED_PREFIX, tool.name)),
                "instructions missing {}",
                tool.name
            );
        }
        assert!(text.contains("### Examples"));
    }

    #[test]
    fn test_empty_enabled_list_yields_empty_string() {
        let registry = ToolRegistry::new();
        assert_eq!(generate_instructions(&registry, Some(&[])), "");
    }

    #[test]
    fn test_subset_excludes_disabled_tools() {
        let registry = ToolRegistry::new();
        let enabled = vec!["read_file".to_string(), "write_file".to_string()];
        let text = generate_instructions(&registry, Some(&enabled));
        assert!(text.contains("TandemTool_read_file"));
        assert!(text.contains("TandemTool_write_file"));
        assert!(!text.contains("TandemTool_run_command"));
        assert!(!text.contains("Command Execution"));
    }

    #[test]
    fn test_required_markers() {
        let registry = ToolRegistry::new();
        let enabled = vec!["search_files".to_string()];
        let text = generate_instructions(&registry, Some(&enabled));
        assert!(text.contains("`pattern` (string, required)"));
        assert!(text.contains("`path` (string, optional)"));
    }

    #[test]
    fn test_examples_drawn_from_enabled_tools_only() {
        let registry = ToolRegistry::new();
        let enabled = vec!["apply_diff".to_string()];
        let text = generate_instructions(&registry, Some(&enabled));
        assert!(text.contains("### Examples"));
        assert!(text.contains("TandemTool_apply_diff"));
        assert!(!text.contains("TandemTool_read_file"));
        assert!(!text.contains("TandemTool_run_command"));
    }

    #[test]
    fn test_category_sections_in_registry_order() {
        let registry = ToolRegistry::new();
        let text = generate_instructions(&registry, None);
        let file_pos = text.find("### File Operations").unwrap();
        let dir_pos = text.find("### Directory Operations").unwrap();
        let agent_pos = text.find("### Agent Communication").unwrap();
        assert!(file_pos < dir_pos);
        assert!(dir_pos < agent_pos);
    }
}

//! Glob-style file search.

use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use super::{optional_str, require_str};

/// Cap on returned matches; the payload flags truncation.
const MAX_MATCHES: usize = 200;

/// Execute the `search_files` tool.
///
/// `path` (already resolved by the executor) is the search base; `pattern`
/// is matched against paths relative to that base. Matches are reported
/// relative to the workspace root when they fall under it.
pub async fn execute_search_files(args: &Value, workspace_root: &str) -> Result<Value, String> {
    let pattern_str = require_str(args, "pattern")?;
    let base = optional_str(args, "path").unwrap_or(workspace_root);
    debug!("Searching {} for pattern {}", base, pattern_str);

    let pattern = glob::Pattern::new(pattern_str)
        .map_err(|e| format!("invalid glob pattern '{}': {}", pattern_str, e))?;

    if !std::path::Path::new(base).is_dir() {
        return Err(format!(
            "search base '{}' is not a directory. Pass a directory path or omit it to search the workspace root.",
            base
        ));
    }

    let match_full_path = pattern_str.contains('/');
    // A `*` in a path pattern must not cross directory boundaries;
    // `src/*.rs` matches `src/main.rs` but not `src/deep/util.rs`.
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    let mut matches = Vec::new();
    let mut truncated = false;

    for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        let matched = if match_full_path {
            pattern.matches_path_with(relative, options)
        } else {
            entry
                .file_name()
                .to_str()
                .map(|n| pattern.matches(n))
                .unwrap_or(false)
        };
        if !matched {
            continue;
        }

        if matches.len() >= MAX_MATCHES {
            truncated = true;
            break;
        }

        let reported = entry
            .path()
            .strip_prefix(workspace_root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| entry.path().to_string_lossy().into_owned());
        matches.push(reported);
    }

    matches.sort();

    Ok(json!({
        "pattern": pattern_str,
        "base": base,
        "count": matches.len(),
        "matches": matches,
        "truncated": truncated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/deep/util.rs"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_filename_pattern() {
        let dir = fixture();
        let root = dir.path().to_str().unwrap();
        let result = execute_search_files(&json!({ "pattern": "*.rs" }), root)
            .await
            .unwrap();
        assert_eq!(result["count"], 2);
        assert_eq!(result["truncated"], false);
    }

    #[tokio::test]
    async fn test_path_pattern() {
        let dir = fixture();
        let root = dir.path().to_str().unwrap();
        let result = execute_search_files(&json!({ "pattern": "src/*.rs" }), root)
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
        let matches = result["matches"].as_array().unwrap();
        assert!(matches[0].as_str().unwrap().ends_with("main.rs"));
        // A single-star segment must not reach into subdirectories.
        assert!(!matches.iter().any(|m| m.as_str().unwrap().contains("deep")));
    }

    #[tokio::test]
    async fn test_recursive_path_pattern() {
        let dir = fixture();
        let root = dir.path().to_str().unwrap();
        let result = execute_search_files(&json!({ "pattern": "**/*.rs" }), root)
            .await
            .unwrap();
        assert_eq!(result["count"], 2);
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let dir = fixture();
        let root = dir.path().to_str().unwrap();
        let err = execute_search_files(&json!({ "pattern": "[unclosed" }), root)
            .await
            .unwrap_err();
        assert!(err.contains("invalid glob pattern"));
    }

    #[tokio::test]
    async fn test_missing_base() {
        let dir = fixture();
        let root = dir.path().to_str().unwrap();
        let err = execute_search_files(
            &json!({ "pattern": "*.rs", "path": "/nowhere/at/all" }),
            root,
        )
        .await
        .unwrap_err();
        assert!(err.contains("not a directory"));
    }
}

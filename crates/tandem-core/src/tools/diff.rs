//! Unified diff application tool.
//!
//! Hunks are applied by textual search: each hunk's old block (context +
//! removed lines) is located in the file and replaced with its new block
//! (context + added lines). Line numbers in @@ headers are ignored, and
//! headers are optional for single-hunk diffs.

use serde_json::{json, Value};
use tracing::debug;

use super::{require_str, translate_io_error};

struct Hunk {
    old_block: Vec<String>,
    new_block: Vec<String>,
}

pub async fn execute_apply_diff(args: &Value) -> Result<Value, String> {
    let path = require_str(args, "path")?;
    let diff = require_str(args, "diff")?;
    debug!("Applying diff to {}", path);

    let content = std::fs::read_to_string(path).map_err(|e| translate_io_error(path, &e))?;

    let hunks = parse_hunks(diff)?;
    if hunks.is_empty() {
        return Err("diff contains no changes. Supply '-'/'+' lines, optionally with context and @@ headers.".to_string());
    }

    let mut insertions = 0usize;
    let mut deletions = 0usize;
    let mut updated = content;

    for (idx, hunk) in hunks.iter().enumerate() {
        let old_text = hunk.old_block.join("\n");
        let new_text = hunk.new_block.join("\n");

        if old_text.is_empty() {
            // Pure insertion with no context: append to the file.
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&new_text);
            updated.push('\n');
        } else {
            let pos = updated.find(&old_text).ok_or_else(|| {
                let preview: String = old_text.chars().take(120).collect();
                format!(
                    "hunk {} does not match '{}': expected text not found, starting with: {}",
                    idx + 1,
                    path,
                    preview
                )
            })?;
            updated.replace_range(pos..pos + old_text.len(), &new_text);
        }

        deletions += hunk
            .old_block
            .iter()
            .filter(|l| !hunk.new_block.contains(l))
            .count();
        insertions += hunk
            .new_block
            .iter()
            .filter(|l| !hunk.old_block.contains(l))
            .count();
    }

    std::fs::write(path, &updated).map_err(|e| translate_io_error(path, &e))?;

    Ok(json!({
        "path": path,
        "hunks_applied": hunks.len(),
        "insertions": insertions,
        "deletions": deletions,
    }))
}

/// Split a unified diff body into hunks. Lines starting with `---`/`+++`
/// (file headers) and `@@` (hunk headers) delimit but do not contribute
/// content; every other line is context (` `), removal (`-`) or
/// addition (`+`).
fn parse_hunks(diff: &str) -> Result<Vec<Hunk>, String> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in diff.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("diff ") {
            continue;
        }
        if line.starts_with("@@") {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            current = Some(Hunk {
                old_block: Vec::new(),
                new_block: Vec::new(),
            });
            continue;
        }

        let hunk = current.get_or_insert_with(|| Hunk {
            old_block: Vec::new(),
            new_block: Vec::new(),
        });

        if let Some(rest) = line.strip_prefix('-') {
            hunk.old_block.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('+') {
            hunk.new_block.push(rest.to_string());
        } else {
            // Context line; a leading space is optional.
            let text = line.strip_prefix(' ').unwrap_or(line);
            hunk.old_block.push(text.to_string());
            hunk.new_block.push(text.to_string());
        }
    }

    if let Some(h) = current.take() {
        hunks.push(h);
    }
    hunks.retain(|h| !h.old_block.is_empty() || !h.new_block.is_empty());
    Ok(hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.txt");
        std::fs::write(&path, content).unwrap();
        let path_str = path.to_str().unwrap().to_string();
        (dir, path_str)
    }

    #[tokio::test]
    async fn test_single_hunk_with_context() {
        let (_dir, path) = write_fixture("fn main() {\n    old();\n}\n");
        let diff = "@@ -1,3 +1,3 @@\n fn main() {\n-    old();\n+    new();\n }";

        let result = execute_apply_diff(&json!({ "path": path, "diff": diff }))
            .await
            .unwrap();
        assert_eq!(result["insertions"], 1);
        assert_eq!(result["deletions"], 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[tokio::test]
    async fn test_headerless_diff() {
        let (_dir, path) = write_fixture("alpha\nbeta\ngamma\n");
        let diff = "-beta\n+BETA";

        execute_apply_diff(&json!({ "path": path, "diff": diff }))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "alpha\nBETA\ngamma\n"
        );
    }

    #[tokio::test]
    async fn test_multiple_hunks() {
        let (_dir, path) = write_fixture("one\ntwo\nthree\nfour\nfive\n");
        let diff = "@@ -1,2 +1,2 @@\n one\n-two\n+TWO\n@@ -4,2 +4,2 @@\n four\n-five\n+FIVE";

        let result = execute_apply_diff(&json!({ "path": path, "diff": diff }))
            .await
            .unwrap();
        assert_eq!(result["hunks_applied"], 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "one\nTWO\nthree\nfour\nFIVE\n"
        );
    }

    #[tokio::test]
    async fn test_hunk_mismatch_names_the_missing_text() {
        let (_dir, path) = write_fixture("actual content\n");
        let diff = "-text that is not there\n+replacement";

        let err = execute_apply_diff(&json!({ "path": path, "diff": diff }))
            .await
            .unwrap_err();
        assert!(err.contains("does not match"));
        assert!(err.contains("text that is not there"));
    }

    #[tokio::test]
    async fn test_pure_addition_appends() {
        let (_dir, path) = write_fixture("first\n");
        let diff = "+second";

        execute_apply_diff(&json!({ "path": path, "diff": diff }))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_empty_diff_rejected() {
        let (_dir, path) = write_fixture("content\n");
        let err = execute_apply_diff(&json!({ "path": path, "diff": "" }))
            .await
            .unwrap_err();
        assert!(err.contains("no changes"));
    }
}

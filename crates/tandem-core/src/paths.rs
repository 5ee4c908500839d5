//! Workspace path resolution.
//!
//! Every path-bearing tool parameter goes through [`resolve_workspace_path`]
//! before dispatch. Resolution is purely lexical: no filesystem access, no
//! normalization of `..` segments, and no containment check for paths that
//! already look absolute. Callers that need a hard workspace boundary must
//! enforce it themselves.

/// Resolve a tool-supplied path against the workspace root.
///
/// - empty string or `.` resolves to the workspace root itself
/// - absolute paths (`/`-prefixed or a drive-letter pattern like `C:\`)
///   are used verbatim
/// - anything else is joined to the root using the root's own separator
///   style, so a Windows-style root keeps backslashes
pub fn resolve_workspace_path(path: &str, workspace_root: &str) -> String {
    if path.is_empty() || path == "." {
        return workspace_root.to_string();
    }

    if is_absolute(path) {
        return path.to_string();
    }

    let separator = if workspace_root.contains('\\') {
        '\\'
    } else {
        '/'
    };
    let root = workspace_root.trim_end_matches(['/', '\\']);
    format!("{}{}{}", root, separator, path)
}

/// Check whether a path already looks absolute on any host convention.
fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    // Drive-letter pattern: "C:\..." or "C:/..."
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_dot_resolve_to_root() {
        assert_eq!(resolve_workspace_path("", "/ws"), "/ws");
        assert_eq!(resolve_workspace_path(".", "/ws"), "/ws");
    }

    #[test]
    fn test_relative_joins_root() {
        assert_eq!(resolve_workspace_path("src/main.rs", "/ws"), "/ws/src/main.rs");
        assert_eq!(resolve_workspace_path("notes.md", "/ws/"), "/ws/notes.md");
    }

    #[test]
    fn test_absolute_passthrough() {
        assert_eq!(resolve_workspace_path("/etc/hosts", "/ws"), "/etc/hosts");
        assert_eq!(
            resolve_workspace_path("C:\\Users\\me\\file.txt", "/ws"),
            "C:\\Users\\me\\file.txt"
        );
        assert_eq!(resolve_workspace_path("D:/data/x", "/ws"), "D:/data/x");
    }

    #[test]
    fn test_idempotent_for_absolute_paths() {
        let once = resolve_workspace_path("src/lib.rs", "/ws");
        let twice = resolve_workspace_path(&once, "/ws");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_windows_style_root_keeps_backslashes() {
        assert_eq!(
            resolve_workspace_path("src\\lib.rs", "C:\\ws"),
            "C:\\ws\\src\\lib.rs"
        );
        assert_eq!(resolve_workspace_path("file.txt", "C:\\ws\\"), "C:\\ws\\file.txt");
    }

    #[test]
    fn test_traversal_resolves_mechanically_under_root() {
        // Documented limitation: relative traversal is not blocked here.
        assert_eq!(
            resolve_workspace_path("../../etc/passwd", "/ws"),
            "/ws/../../etc/passwd"
        );
    }

    #[test]
    fn test_root_directory_as_workspace() {
        assert_eq!(resolve_workspace_path("etc", "/"), "/etc");
    }
}

//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the enforcement tests in `tests/`:
//! - No sleep() calls in production code
//! - No blocking I/O inside async functions
//!
//! Scanning is line based. Everything from the first `#[cfg(test)]` line of a
//! file onwards is treated as test code and skipped.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["bridge/core/src", "bridge/console/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule was broken
    pub rule: &'static str,
    /// The trimmed source line
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// Workspace root, found from this package's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under the production roots, with its contents
pub fn production_sources() -> Vec<(PathBuf, String)> {
    let root = workspace_root();
    let mut sources = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(entry.path()) {
                sources.push((entry.path().to_path_buf(), content));
            }
        }
    }
    sources
}

/// Lines before the first `#[cfg(test)]`
pub fn production_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .take_while(|line| !line.trim().starts_with("#[cfg(test)]"))
        .collect()
}

/// Code part of a line, without a trailing `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether the line at `idx` is inside an `async fn`
///
/// Scans backwards to the nearest function signature.
pub fn is_in_async_function(lines: &[&str], idx: usize) -> bool {
    for i in (0..idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }
        if line.contains("fn ") && line.contains('(') {
            return false;
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Find sleep calls in production code
pub fn find_sleep_violations(path: &Path, content: &str) -> Vec<Violation> {
    production_lines(content)
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let code = code_part(line);
            code.contains("::sleep(") || code.contains(".sleep(")
        })
        .map(|(idx, line)| Violation {
            path: path.to_path_buf(),
            line: idx + 1,
            rule: "sleep in production code",
            text: line.trim().to_string(),
        })
        .collect()
}

/// Find blocking I/O inside async functions
pub fn find_blocking_io_violations(path: &Path, content: &str) -> Vec<Violation> {
    let lines = production_lines(content);
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);

        let rule = if code.contains("std::fs::") {
            "blocking file I/O"
        } else if code.contains("std::net::") {
            "blocking network I/O"
        } else if code.contains("std::process::Command") {
            "blocking process I/O"
        } else if code.contains("std::io::stdin()") {
            "blocking stdin"
        } else {
            continue;
        };

        if is_in_async_function(&lines, idx) {
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                rule,
                text: line.trim().to_string(),
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_io_detection() {
        let code = "async fn load() {\n    let s = std::fs::read_to_string(\"f\");\n}\n";
        let found = find_blocking_io_violations(Path::new("x.rs"), code);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].rule, "blocking file I/O");
    }

    #[test]
    fn test_blocking_io_allowed_in_sync_fn() {
        let code = "fn load() {\n    let s = std::fs::read_to_string(\"f\");\n}\n";
        assert!(find_blocking_io_violations(Path::new("x.rs"), code).is_empty());
    }

    #[test]
    fn test_test_module_is_skipped() {
        let code = "fn ok() {}\n#[cfg(test)]\nmod tests {\n    async fn t() { tokio::time::sleep(d).await; }\n}\n";
        assert!(find_sleep_violations(Path::new("x.rs"), code).is_empty());
    }

    #[test]
    fn test_sleep_detection_ignores_comments() {
        let code = "fn a() {\n    // std::thread::sleep(d);\n    std::thread::sleep(d);\n}\n";
        let found = find_sleep_violations(Path::new("x.rs"), code);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 3);
    }
}

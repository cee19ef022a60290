//! Instruction file (markdown) parsing: `# Common System Prompt`,
//! `# Plan Mode Prompt`, `# Code Mode Prompt` sections, with `@include`
//! directive resolution (spec §6).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionFile {
    pub common: Option<String>,
    pub plan_mode: Option<String>,
    pub code_mode: Option<String>,
}

fn section_body<'a>(markdown: &'a str, heading: &str) -> Option<&'a str> {
    let start = markdown.find(heading)? + heading.len();
    let rest = &markdown[start..];
    let end = rest.match_indices("\n# ").map(|(i, _)| i).next().unwrap_or(rest.len());
    Some(rest[..end].trim())
}

impl InstructionFile {
    /// Parses `markdown` and resolves `@include` directives relative to
    /// `base_dir` (the directory the instruction file lives in).
    pub fn parse(markdown: &str, base_dir: &Path) -> Self {
        let mut visited = HashSet::new();
        let resolved = resolve_includes_inner(markdown, base_dir, &mut visited, 0);
        Self {
            common: section_body(&resolved, "# Common System Prompt").map(str::to_string),
            plan_mode: section_body(&resolved, "# Plan Mode Prompt").map(str::to_string),
            code_mode: section_body(&resolved, "# Code Mode Prompt").map(str::to_string),
        }
    }
}

/// Resolves `@include path` directives in `content`. Paths are relative to
/// `base_dir` unless absolute. Missing files become a comment marker rather
/// than an error; a visited-path guard bounds recursive includes.
pub fn resolve_includes(content: &str, base_dir: &Path) -> String {
    let mut visited = HashSet::new();
    resolve_includes_inner(content, base_dir, &mut visited, 0)
}

fn resolve_includes_inner(
    content: &str,
    base_dir: &Path,
    visited: &mut HashSet<PathBuf>,
    depth: usize,
) -> String {
    if depth >= MAX_INCLUDE_DEPTH {
        return content.to_string();
    }
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("@include ") {
            let include_path = rest.trim();
            let resolved_path = if Path::new(include_path).is_absolute() {
                PathBuf::from(include_path)
            } else {
                base_dir.join(include_path)
            };
            if visited.contains(&resolved_path) {
                out.push_str(&format!("<!-- include cycle: {include_path} -->\n"));
                continue;
            }
            match std::fs::read_to_string(&resolved_path) {
                Ok(included) => {
                    visited.insert(resolved_path.clone());
                    let included_base = resolved_path.parent().unwrap_or(base_dir);
                    let nested =
                        resolve_includes_inner(&included, included_base, visited, depth + 1);
                    out.push_str(&nested);
                    out.push('\n');
                }
                Err(_) => {
                    out.push_str(&format!("<!-- include not found: {include_path} -->\n"));
                }
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_all_three_recognized_sections() {
        let markdown = "# Common System Prompt\nBe helpful.\n\n# Plan Mode Prompt\nDon't edit files.\n\n# Code Mode Prompt\nEdit freely.\n";
        let parsed = InstructionFile::parse(markdown, Path::new("."));
        assert_eq!(parsed.common.unwrap(), "Be helpful.");
        assert_eq!(parsed.plan_mode.unwrap(), "Don't edit files.");
        assert_eq!(parsed.code_mode.unwrap(), "Edit freely.");
    }

    #[test]
    fn missing_include_becomes_comment_marker_not_an_error() {
        let content = "before\n@include missing.md\nafter\n";
        let resolved = resolve_includes(content, Path::new("/nonexistent"));
        assert!(resolved.contains("include not found: missing.md"));
        assert!(resolved.contains("before"));
        assert!(resolved.contains("after"));
    }

    #[test]
    fn include_is_resolved_relative_to_including_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("shared.md"), "shared content").unwrap();
        let content = "@include shared.md\n";
        let resolved = resolve_includes(content, dir.path());
        assert!(resolved.contains("shared content"));
    }

    #[test]
    fn recursive_includes_are_followed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "@include b.md\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "leaf content").unwrap();
        let content = "@include a.md\n";
        let resolved = resolve_includes(content, dir.path());
        assert!(resolved.contains("leaf content"));
    }

    #[test]
    fn self_referential_include_does_not_hang() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "@include a.md\n").unwrap();
        let content = "@include a.md\n";
        let resolved = resolve_includes(content, dir.path());
        assert!(resolved.contains("include cycle: a.md"));
    }
}

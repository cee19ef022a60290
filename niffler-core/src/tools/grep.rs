//! `grep(pattern, path?, glob?, caseInsensitive?, maxMatches?)` — content
//! search (ambient addition), built on the ripgrep library stack
//! (`grep-regex`/`grep-searcher`/`ignore`).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use ignore::{WalkBuilder, WalkState};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::resolve_path_under;
use super::Tool;

const DEFAULT_MAX_MATCHES: usize = 200;

pub struct GrepTool {
    root: PathBuf,
}

impl GrepTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Serialize, Clone)]
struct MatchLine {
    path: String,
    line: u64,
    text: String,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "grep".to_string(),
            description: Some("Search file contents for a regex pattern.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                    "glob": {"type": "string"},
                    "caseInsensitive": {"type": "boolean"},
                    "maxMatches": {"type": "integer"}
                },
                "required": ["pattern"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing pattern".to_string()))?
            .to_string();
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let base = resolve_path_under(&self.root, path_param)?;
        let case_insensitive = args
            .get("caseInsensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let max_matches = args
            .get("maxMatches")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_MATCHES as u64) as usize;
        let glob_filter = args
            .get("glob")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let matcher = grep_regex::RegexMatcherBuilder::new()
            .case_insensitive(case_insensitive)
            .build(&pattern)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid pattern: {e}")))?;

        let results: Arc<Mutex<Vec<MatchLine>>> = Arc::new(Mutex::new(Vec::new()));
        let mut builder = WalkBuilder::new(&base);
        builder.hidden(true);
        let walker = builder.build_parallel();

        let glob_matcher = glob_filter
            .as_ref()
            .map(|pattern| glob::Pattern::new(pattern))
            .transpose()
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid glob: {e}")))?;

        walker.run(|| {
            let matcher = matcher.clone();
            let results = Arc::clone(&results);
            let glob_matcher = glob_matcher.clone();
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return WalkState::Continue,
                };
                if results.lock().unwrap().len() >= max_matches {
                    return WalkState::Quit;
                }
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    return WalkState::Continue;
                }
                let path = entry.path();
                if let Some(gm) = &glob_matcher {
                    if !gm.matches_path(path) {
                        return WalkState::Continue;
                    }
                }
                let path_str = path.display().to_string();
                let _ = Searcher::new().search_path(
                    &matcher,
                    path,
                    UTF8(|line_number, line| {
                        let mut results = results.lock().unwrap();
                        if results.len() < max_matches {
                            results.push(MatchLine {
                                path: path_str.clone(),
                                line: line_number,
                                text: line.trim_end().to_string(),
                            });
                        }
                        Ok(results.len() < max_matches)
                    }),
                );
                WalkState::Continue
            })
        });

        let mut matches = Arc::try_unwrap(results)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();
        matches.truncate(max_matches);

        Ok(ToolCallContent::json(&json!({ "matches": matches })))
    }
}

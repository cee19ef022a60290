//! `fetch(url, method?, headers?, body?, timeout?, maxSize?, convertToText?)`
//! (spec §4.2). Grounded in `graphweave`'s web-fetcher tool contract (no
//! implementation file ships in the retrieval pack; the shape here follows
//! `graphweave/tests/web_fetcher.rs`).

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::Tool;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_SIZE: usize = 1024 * 1024;
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];
const ALLOWED_METHODS: &[&str] = &["GET", "POST"];

pub struct FetchTool {
    client: Client,
}

impl FetchTool {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for FetchTool {
    fn default() -> Self {
        Self::new()
    }
}

static STRIP_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style|noscript|iframe|object|embed)[^>]*>.*?</\1>").unwrap());
static BLOCK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?(p|div|br|li|tr|h[1-6])[^>]*>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strips non-content elements, inserts newlines after block boundaries,
/// drops remaining tags, and collapses whitespace.
fn html_to_text(html: &str) -> String {
    let no_dead = STRIP_TAGS.replace_all(html, "");
    let with_breaks = BLOCK_TAGS.replace_all(&no_dead, "\n");
    let no_tags = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = no_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let collapsed = WHITESPACE_RUN.replace_all(&decoded, " ");
    let trimmed: String = collapsed
        .lines()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_LINES.replace_all(&trimmed, "\n\n").trim().to_string()
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "fetch".to_string(),
            description: Some(
                "Fetch a URL over GET or POST and optionally convert HTML to plain text."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "method": {"type": "string", "enum": ["GET", "POST"]},
                    "headers": {"type": "object"},
                    "body": {},
                    "timeout": {"type": "integer"},
                    "maxSize": {"type": "integer"},
                    "convertToText": {"type": "boolean"}
                },
                "required": ["url"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let url_param = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing url".to_string()))?;
        let url = reqwest::Url::parse(url_param)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid url: {e}")))?;
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(ToolSourceError::InvalidInput(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(ToolSourceError::InvalidInput(format!(
                "unsupported method: {method}"
            )));
        }

        let timeout_ms = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let max_size = args
            .get("maxSize")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_SIZE as u64) as usize;

        let mut request = self
            .client
            .request(method.parse().unwrap(), url.clone())
            .timeout(Duration::from_millis(timeout_ms));

        if let Some(headers) = args.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key, v);
                }
            }
        }

        if let Some(body) = args.get("body") {
            request = match body {
                Value::String(s) => request.body(s.clone()),
                Value::Null => request,
                other => request.json(other),
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("request failed: {e}")))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body_text = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("failed to read body: {e}")))?;
        if !status.is_success() {
            return Err(ToolSourceError::Execution(format!(
                "request returned status {status}: {}",
                body_text.chars().take(500).collect::<String>()
            )));
        }

        let truncated = body_text.len() > max_size;
        let mut content: String = body_text.chars().take(max_size).collect();

        let convert_to_text = args
            .get("convertToText")
            .and_then(|v| v.as_bool())
            .unwrap_or(content_type.contains("text/html"));
        if convert_to_text && content_type.contains("html") {
            content = html_to_text(&content);
        }

        Ok(ToolCallContent::json(&json!({
            "content": content,
            "status": status.as_u16(),
            "contentType": content_type,
            "truncated": truncated,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_scripts_and_collapses_block_tags() {
        let html = "<html><body><script>evil()</script><p>Hello</p><p>World</p></body></html>";
        let text = html_to_text(html);
        assert!(!text.contains("evil"));
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }

    #[tokio::test]
    async fn missing_url_is_invalid_input() {
        let tool = FetchTool::new();
        let err = tool.call(json!({}), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn file_scheme_is_rejected() {
        let tool = FetchTool::new();
        let err = tool
            .call(json!({"url": "file:///etc/passwd"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unsupported_method_is_invalid_input() {
        let tool = FetchTool::new();
        let err = tool
            .call(json!({"url": "https://example.invalid", "method": "PUT"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn default_construction_names_fetch() {
        let tool = FetchTool::default();
        assert_eq!(tool.name(), "fetch");
    }
}

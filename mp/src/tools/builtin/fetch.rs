//! fetch tool - read a web page as markdown

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolError, ToolResult, truncate_chars};

/// Largest body accepted before conversion
const MAX_BODY_BYTES: usize = 1_000_000;

/// Characters of converted content handed back to the model
const DEFAULT_MAX_CHARS: usize = 20_000;

/// Fetch a URL, converting HTML to markdown
pub struct FetchTool {
    http: reqwest::Client,
    max_chars: usize,
}

impl FetchTool {
    pub fn new(timeout: Duration) -> Self {
        debug!(?timeout, "FetchTool::new: called");
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("multipath/", env!("CARGO_PKG_VERSION"), " (fetch tool)"))
            .build()
            .unwrap_or_default();
        Self {
            http,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Api {
                service: "HTTP",
                status: status.as_u16(),
                body: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.text().await?;
        debug!(%content_type, body_len = body.len(), "FetchTool::fetch: body read");
        if body.len() > MAX_BODY_BYTES {
            return Err(ToolError::TooLarge { size: body.len() });
        }

        let content = convert_body(&content_type, body);
        Ok(self.clip(content))
    }

    fn clip(&self, content: String) -> String {
        let total = content.chars().count();
        if total <= self.max_chars {
            return content;
        }
        format!(
            "{}\n\n[truncated, {} chars total]",
            truncate_chars(&content, self.max_chars),
            total
        )
    }
}

/// Render a response body as text the model can read
fn convert_body(content_type: &str, body: String) -> String {
    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        html2md::rewrite_html(&body, false)
    } else if content_type.contains("application/json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch a web page by URL. HTML is converted to markdown; long pages are truncated."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "http(s) URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(run_id = %ctx.run_id, task_index = ctx.task_index, "FetchTool::execute: called");
        let Some(url) = input["url"].as_str() else {
            return ToolResult::error("url is required");
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolResult::error("URL must start with http:// or https://");
        }

        self.fetch(url).await.into()
    }
}

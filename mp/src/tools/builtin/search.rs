//! search tool - web search through Tavily, Brave or SerpAPI

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::tools::{Tool, ToolContext, ToolError, ToolResult, truncate_chars};

/// Characters of snippet kept per hit
const SNIPPET_CHARS: usize = 300;

/// Upper bound on results regardless of what the model asks for
const MAX_RESULTS_CAP: usize = 10;

/// Supported search backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Tavily,
    Brave,
    SerpApi,
}

impl SearchProvider {
    fn service(&self) -> &'static str {
        match self {
            Self::Tavily => "Tavily",
            Self::Brave => "Brave Search",
            Self::SerpApi => "SerpAPI",
        }
    }
}

impl FromStr for SearchProvider {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tavily" => Ok(Self::Tavily),
            "brave" => Ok(Self::Brave),
            "serpapi" => Ok(Self::SerpApi),
            other => Err(ToolError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tavily => "tavily",
            Self::Brave => "brave",
            Self::SerpApi => "serpapi",
        };
        f.write_str(name)
    }
}

/// Resolved search settings, including the credential
#[derive(Clone)]
pub struct SearchSettings {
    pub provider: SearchProvider,
    pub api_key: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Search the web for information
pub struct SearchTool {
    settings: SearchSettings,
    http: reqwest::Client,
}

impl SearchTool {
    pub fn new(settings: SearchSettings) -> Self {
        debug!(?settings, "SearchTool::new: called");
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_default();
        Self { settings, http }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        debug!(provider = %self.settings.provider, %query, max_results, "SearchTool::search: called");
        let request = match self.settings.provider {
            SearchProvider::Tavily => self
                .http
                .post("https://api.tavily.com/search")
                .bearer_auth(&self.settings.api_key)
                .json(&serde_json::json!({
                    "query": query,
                    "max_results": max_results,
                    "search_depth": "basic"
                })),
            SearchProvider::Brave => self
                .http
                .get("https://api.search.brave.com/res/v1/web/search")
                .header("X-Subscription-Token", &self.settings.api_key)
                .query(&[("q", query), ("count", &max_results.to_string())]),
            SearchProvider::SerpApi => self.http.get("https://serpapi.com/search").query(&[
                ("q", query),
                ("api_key", self.settings.api_key.as_str()),
                ("num", &max_results.to_string()),
                ("engine", "google"),
            ]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, provider = %self.settings.provider, "SearchTool::search: API error");
            return Err(ToolError::Api {
                service: self.settings.provider.service(),
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let mut hits = parse_hits(self.settings.provider, &body);
        hits.truncate(max_results);
        debug!(count = hits.len(), "SearchTool::search: parsed hits");
        Ok(hits)
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Search the web. Returns titles, URLs and snippets; use fetch to read a page in full."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(run_id = %ctx.run_id, task_index = ctx.task_index, "SearchTool::execute: called");
        let Some(query) = input["query"].as_str().filter(|q| !q.trim().is_empty()) else {
            return ToolResult::from(Err::<String, _>(ToolError::InvalidArgument(
                "query is required".to_string(),
            )));
        };

        let max_results = input["max_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(self.settings.max_results)
            .clamp(1, MAX_RESULTS_CAP);

        self.search(query, max_results).await.map(|hits| format_hits(&hits)).into()
    }
}

/// Pull hits out of a provider's response body
fn parse_hits(provider: SearchProvider, body: &Value) -> Vec<SearchHit> {
    let (items, url_key, snippet_key) = match provider {
        SearchProvider::Tavily => (&body["results"], "url", "content"),
        SearchProvider::Brave => (&body["web"]["results"], "url", "description"),
        SearchProvider::SerpApi => (&body["organic_results"], "link", "snippet"),
    };

    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| SearchHit {
                    title: item["title"].as_str().unwrap_or("(no title)").to_string(),
                    url: item[url_key].as_str().unwrap_or_default().to_string(),
                    snippet: item[snippet_key].as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   {}\n   {}\n",
                i + 1,
                hit.title,
                hit.url,
                truncate_chars(&hit.snippet, SNIPPET_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> SearchSettings {
        SearchSettings {
            provider: SearchProvider::Tavily,
            api_key: "secret-key".to_string(),
            max_results: 5,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Tavily".parse::<SearchProvider>().unwrap(), SearchProvider::Tavily);
        assert_eq!("serpapi".parse::<SearchProvider>().unwrap(), SearchProvider::SerpApi);
        assert!("bing".parse::<SearchProvider>().is_err());
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_parse_tavily() {
        let body = json!({ "results": [
            { "title": "Curry basics", "url": "https://a.example", "content": "Onions first" },
            { "url": "https://b.example" }
        ]});
        let hits = parse_hits(SearchProvider::Tavily, &body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "Onions first");
        assert_eq!(hits[1].title, "(no title)");
    }

    #[test]
    fn test_parse_brave_and_serpapi() {
        let brave = json!({ "web": { "results": [{ "title": "t", "url": "u", "description": "d" }] } });
        assert_eq!(parse_hits(SearchProvider::Brave, &brave)[0].snippet, "d");

        let serp = json!({ "organic_results": [{ "title": "t", "link": "l", "snippet": "s" }] });
        let hits = parse_hits(SearchProvider::SerpApi, &serp);
        assert_eq!(hits[0].url, "l");
        assert_eq!(hits[0].snippet, "s");
    }

    #[test]
    fn test_parse_missing_results() {
        assert!(parse_hits(SearchProvider::Tavily, &json!({ "error": "x" })).is_empty());
    }

    #[test]
    fn test_format_hits() {
        assert_eq!(format_hits(&[]), "No results found");
        let text = format_hits(&[SearchHit {
            title: "Title".to_string(),
            url: "https://x.example".to_string(),
            snippet: "Snippet".to_string(),
        }]);
        assert!(text.starts_with("1. Title"));
        assert!(text.contains("https://x.example"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("this is a long string", 10), "this is a ...");
        assert_eq!(truncate_chars("カレーライス", 3), "カレー...");
    }

    #[tokio::test]
    async fn test_search_missing_query() {
        let tool = SearchTool::new(settings());
        let result = tool.execute(json!({}), &ToolContext::detached()).await;
        assert!(result.is_error);
        assert!(result.content.contains("query is required"));
    }
}

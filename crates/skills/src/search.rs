//! Web search via the DuckDuckGo instant answer API.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;

use bouncer_core::{config::ToolsConfig, traits::Tool, types::ToolOutput, Error, Result};

/// Settings for [`WebSearchTool`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: usize,
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub request_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&ToolsConfig::default())
    }
}

impl From<&ToolsConfig> for SearchConfig {
    fn from(cfg: &ToolsConfig) -> Self {
        Self {
            endpoint: cfg.search_endpoint.clone(),
            max_results: cfg.search_max_results,
            retries: cfg.search_retries,
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// The search query.
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "Results")]
    results: Vec<Topic>,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Topic {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    /// Category groups nest their topics one level down.
    #[serde(rename = "Topics")]
    topics: Vec<Topic>,
}

struct SearchHit {
    title: String,
    href: String,
    body: String,
}

fn collect_topics(topics: Vec<Topic>, hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if !topic.topics.is_empty() {
            collect_topics(topic.topics, hits);
            continue;
        }
        if topic.text.is_empty() || topic.first_url.is_empty() {
            continue;
        }
        let title = topic
            .text
            .split(" - ")
            .next()
            .unwrap_or(&topic.text)
            .to_string();
        hits.push(SearchHit {
            title,
            href: topic.first_url,
            body: topic.text,
        });
    }
}

fn extract_hits(answer: InstantAnswer, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading,
            href: answer.abstract_url,
            body: answer.abstract_text,
        });
    }
    collect_topics(answer.results, &mut hits);
    collect_topics(answer.related_topics, &mut hits);
    hits.truncate(max_results);
    hits
}

/// `web_search`: returns the top results as markdown links with snippets.
pub struct WebSearchTool {
    client: reqwest::Client,
    config: SearchConfig,
}

impl WebSearchTool {
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("biasbouncer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn fetch(&self, url: &url::Url) -> std::result::Result<InstantAnswer, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("provider returned HTTP {}", status));
        }

        response
            .json::<InstantAnswer>()
            .await
            .map_err(|e| format!("malformed provider response: {}", e))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = url::Url::parse_with_params(
            &self.config.endpoint,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| Error::search_unavailable(format!("invalid endpoint: {}", e)))?;

        let mut last_error = String::new();
        for attempt in 0..=self.config.retries {
            match self.fetch(&url).await {
                Ok(answer) => return Ok(extract_hits(answer, self.config.max_results)),
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Web search attempt failed");
                    last_error = e;
                }
            }
        }

        Err(Error::search_unavailable(last_error))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for the given query and returns the top results. \
         Use this for up-to-date information or topics you don't know about."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(SearchArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
        let args: SearchArgs = serde_json::from_value(args)
            .map_err(|e| Error::invalid_request(format!("web_search: {}", e)))?;

        tracing::info!(query = %args.query, "Performing web search");

        let hits = self.search(&args.query).await?;
        if hits.is_empty() {
            return Ok(ToolOutput::text(format!(
                "No results found for '{}'.",
                args.query
            )));
        }

        let rendered = hits
            .iter()
            .map(|hit| format!("[{}]({})\n{}", hit.title, hit.href, hit.body))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput::text(rendered).with_data(serde_json::json!({ "count": hits.len() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hits_flattens_groups() {
        let answer: InstantAnswer = serde_json::from_value(serde_json::json!({
            "Heading": "Rust",
            "AbstractText": "Rust is a systems language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "RelatedTopics": [
                {"Text": "Cargo - the Rust package manager", "FirstURL": "https://doc.rust-lang.org/cargo"},
                {"Name": "Tools", "Topics": [
                    {"Text": "Clippy - a linter", "FirstURL": "https://github.com/rust-lang/rust-clippy"}
                ]}
            ]
        }))
        .unwrap();

        let hits = extract_hits(answer, 5);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust");
        assert_eq!(hits[1].title, "Cargo");
        assert_eq!(hits[2].href, "https://github.com/rust-lang/rust-clippy");
    }

    #[test]
    fn test_extract_hits_truncates() {
        let topics: Vec<serde_json::Value> = (0..10)
            .map(|i| serde_json::json!({"Text": format!("T{}", i), "FirstURL": format!("https://x/{}", i)}))
            .collect();
        let answer: InstantAnswer =
            serde_json::from_value(serde_json::json!({ "RelatedTopics": topics })).unwrap();
        assert_eq!(extract_hits(answer, 5).len(), 5);
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}

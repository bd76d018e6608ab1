//! Tavily web search provider.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::security::credentials::{SecretString, TAVILY_API_KEY};
use crate::traits::web::{WebHit, WebSearchProvider};

/// Default Tavily search endpoint.
pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily-backed web search.
pub struct TavilyProvider {
    api_key: SecretString,
    client: reqwest::Client,
    endpoint: String,
    search_depth: &'static str,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
    score: Option<f32>,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            search_depth: "basic",
        }
    }

    /// Build from `TAVILY_API_KEY`, if set.
    pub fn from_env() -> Option<Self> {
        SecretString::from_env(TAVILY_API_KEY).map(Self::new)
    }

    /// Use Tavily's slower "advanced" depth.
    pub fn advanced(mut self) -> Self {
        self.search_depth = "advanced";
        self
    }

    /// Override the endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        let request = TavilyRequest {
            query,
            search_depth: self.search_depth,
            max_results: limit,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(SourceError::http)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Http(
                format!("Tavily API error: {}", status).into(),
            ));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let hits: Vec<WebHit> = body
            .results
            .into_iter()
            .take(limit)
            .map(|r| {
                let mut hit = WebHit::new(r.url);
                if let Some(title) = r.title {
                    hit = hit.with_title(title);
                }
                if let Some(content) = r.content {
                    hit = hit.with_snippet(content);
                }
                if let Some(score) = r.score {
                    hit = hit.with_score(score);
                }
                hit
            })
            .collect();

        debug!(hits = hits.len(), "Tavily search completed");
        Ok(hits)
    }
}

//! Serper (google.serper.dev) web search provider.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::security::credentials::{SecretString, SERPER_API_KEY};
use crate::traits::web::{WebHit, WebSearchProvider};

/// Default Serper search endpoint.
pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Google results through Serper. Authenticates with the `X-API-KEY` header.
pub struct SerperProvider {
    api_key: SecretString,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Deserialize)]
struct SerperResult {
    link: String,
    title: Option<String>,
    snippet: Option<String>,
    position: Option<u32>,
}

impl SerperProvider {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            endpoint: SERPER_ENDPOINT.to_string(),
        }
    }

    /// Build from `SERPER_API_KEY`, if set.
    pub fn from_env() -> Option<Self> {
        SecretString::from_env(SERPER_API_KEY).map(Self::new)
    }

    /// Override the endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

/// Turn a 1-based result position into a descending score in (0, 1].
fn position_score(position: Option<u32>) -> Option<f32> {
    position.filter(|p| *p > 0).map(|p| 1.0 / p as f32)
}

#[async_trait]
impl WebSearchProvider for SerperProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose())
            .json(&SerperRequest { q: query, num: limit })
            .send()
            .await
            .map_err(SourceError::http)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Http(
                format!("Serper API error: {}", status).into(),
            ));
        }

        let body: SerperResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let hits: Vec<WebHit> = body
            .organic
            .into_iter()
            .take(limit)
            .map(|r| {
                let mut hit = WebHit::new(r.link);
                if let Some(title) = r.title {
                    hit = hit.with_title(title);
                }
                if let Some(snippet) = r.snippet {
                    hit = hit.with_snippet(snippet);
                }
                if let Some(score) = position_score(r.position) {
                    hit = hit.with_score(score);
                }
                hit
            })
            .collect();

        debug!(hits = hits.len(), "Serper search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_position_score() {
        assert_eq!(position_score(Some(1)), Some(1.0));
        assert_eq!(position_score(Some(4)), Some(0.25));
        assert_eq!(position_score(Some(0)), None);
        assert_eq!(position_score(None), None);
    }

    #[tokio::test]
    async fn test_parses_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "serper-key"))
            .and(body_json(json!({"q": "HBM market outlook", "num": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "HBM demand", "link": "https://news.example.com/hbm", "snippet": "Demand rises", "position": 1},
                    {"title": "Memory cycle", "link": "https://blog.example.com/cycle", "position": 2},
                    {"title": "Third", "link": "https://third.example.com", "position": 3}
                ]
            })))
            .mount(&server)
            .await;

        let provider =
            SerperProvider::new("serper-key").with_endpoint(format!("{}/search", server.uri()));
        let hits = provider.search("HBM market outlook", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://news.example.com/hbm");
        assert_eq!(hits[0].snippet.as_deref(), Some("Demand rises"));
        assert_eq!(hits[1].snippet, None);
        assert_eq!(hits[1].score, Some(0.5));
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = SerperProvider::new("serper-key").with_endpoint(server.uri());
        let err = provider.search("q", 7).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
    }

    #[tokio::test]
    async fn test_server_error_is_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = SerperProvider::new("serper-key").with_endpoint(server.uri());
        let err = provider.search("q", 7).await.unwrap_err();
        assert_eq!(err.kind(), "http");
    }
}

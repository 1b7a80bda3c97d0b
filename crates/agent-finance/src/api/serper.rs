//! Serper (Google News search) client

use super::{endpoint, http_client};
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use crate::news::{NewsItem, NewsSearchProvider};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    news: Vec<SerperArticle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SerperArticle {
    title: Option<String>,
    source: Option<String>,
    date: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

impl From<SerperArticle> for NewsItem {
    fn from(article: SerperArticle) -> Self {
        NewsItem {
            title: article.title,
            source: article.source,
            date: article.date,
            snippet: article.snippet,
            link: article.link,
        }
    }
}

/// Serper news search client with rate limiting
///
/// A missing API key is reported per search rather than at construction, so
/// the pipeline still runs (without news) when no key is configured.
#[derive(Debug, Clone)]
pub struct SerperClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl SerperClient {
    /// Create a new Serper client
    ///
    /// # Arguments
    /// * `api_key` - Serper API key
    /// * `base_url` - API base, `https://google.serper.dev` in production
    /// * `timeout` - Per-request timeout
    /// * `rate_limit` - Requests per minute
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        rate_limit: u32,
    ) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Create a client from pipeline configuration
    pub fn from_config(config: &FinanceConfig) -> Result<Self> {
        Self::new(
            config.serper_api_key.clone(),
            &config.serper_base_url,
            config.request_timeout,
            config.news_rate_limit,
        )
    }

    /// Search news for `query`, preserving Serper's relevance order
    #[instrument(skip(self))]
    pub async fn news(&self, query: &str) -> Result<Vec<NewsItem>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FinanceError::ConfigError("SERPER_API_KEY environment variable not set".to_string())
        })?;

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(endpoint(&self.base_url, &["news"])?)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FinanceError::ApiError(format!(
                "Serper returned {status}: {body}"
            )));
        }

        let body: SerperResponse = response.json().await?;
        debug!(results = body.news.len(), "Serper news received");
        Ok(body.news.into_iter().map(NewsItem::from).collect())
    }
}

#[async_trait]
impl NewsSearchProvider for SerperClient {
    async fn search(&self, query: &str) -> Result<Vec<NewsItem>> {
        self.news(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client =
            SerperClient::new(None, "http://127.0.0.1:9", Duration::from_secs(1), 60).unwrap();
        let err = client.news("Apple").await.unwrap_err();
        assert!(matches!(err, FinanceError::ConfigError(_)));
    }

    #[test]
    fn test_article_fields_optional() {
        let body: SerperResponse =
            serde_json::from_str(r#"{"news":[{"title":"Only a title","position":1}]}"#).unwrap();
        let item = NewsItem::from(body.news.into_iter().next().unwrap());
        assert_eq!(item.title.as_deref(), Some("Only a title"));
        assert_eq!(item.snippet, None);

        let empty: SerperResponse = serde_json::from_str(r#"{"searchParameters":{}}"#).unwrap();
        assert!(empty.news.is_empty());
    }
}

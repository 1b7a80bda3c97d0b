//! Recent news and sustainability context via a search provider

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Display fields kept from one search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A news search backend; results come back most relevant first
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<NewsItem>>;
}

/// Bounded, provider-ordered list of news items for one company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsDigest {
    pub company: String,
    pub items: Vec<NewsItem>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl NewsDigest {
    /// Empty digest recording why the search failed
    pub fn degraded(company: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            items: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Search query used for recent stock news
pub fn news_query(company: &str) -> String {
    format!("{company} latest stock news earnings updates")
}

/// Search query used for ESG context
pub fn sustainability_query(company: &str) -> String {
    format!("{company} ESG sustainability environmental initiatives")
}

/// Issues search queries and trims results to a fixed count
pub struct NewsFetcher {
    provider: Arc<dyn NewsSearchProvider>,
    limit: usize,
}

impl NewsFetcher {
    pub fn new(provider: Arc<dyn NewsSearchProvider>, limit: usize) -> Self {
        Self { provider, limit }
    }

    /// Recent stock news for `company`
    pub async fn fetch(&self, company: &str) -> NewsDigest {
        self.collect(company, &news_query(company)).await
    }

    /// ESG and sustainability coverage for `company`
    pub async fn fetch_sustainability(&self, company: &str) -> NewsDigest {
        self.collect(company, &sustainability_query(company)).await
    }

    #[instrument(skip(self))]
    async fn collect(&self, company: &str, query: &str) -> NewsDigest {
        match self.provider.search(query).await {
            Ok(mut items) => {
                let received = items.len();
                items.truncate(self.limit);
                debug!(received, kept = items.len(), "News search complete");
                NewsDigest {
                    company: company.to_string(),
                    items,
                    error: None,
                }
            }
            Err(e) => {
                warn!(%company, error = %e, "News search failed, continuing without news");
                NewsDigest::degraded(company, e.to_string())
            }
        }
    }
}

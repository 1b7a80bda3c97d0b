//! Company-to-decision financial analysis
//!
//! This crate turns a company name into a structured BUY/HOLD/SELL decision.
//! It includes:
//!
//! - Ticker resolution from a static table with a model fallback
//! - Fundamentals from Financial Modeling Prep or Yahoo Finance, normalized
//!   into one [`MarketMetrics`] record whatever shape the provider returns
//! - Latest price and currency, with a single exchange-suffix retry
//! - Recent news (and optional ESG coverage) from Serper
//! - Bounded prompt construction and lenient parsing of the model's JSON
//!
//! # Architecture
//!
//! [`FinancialAnalysisPipeline`] owns one component per stage. Each data
//! source sits behind a trait ([`MarketDataProvider`], [`QuoteProvider`],
//! [`NewsSearchProvider`]) so clients can be swapped or mocked, and each
//! fetcher turns provider errors into degraded records instead of failing
//! the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_finance::{AnalysisRequest, FinanceConfig, FinancialAnalysisPipeline};
//! use agent_llm::providers::GeminiProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = FinancialAnalysisPipeline::builder()
//!         .config(FinanceConfig::from_env()?)
//!         .llm(Arc::new(GeminiProvider::from_env()?))
//!         .build()?;
//!
//!     let outcome = pipeline.analyze(AnalysisRequest::new("Infosys")).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod market_data;
pub mod news;
pub mod pipeline;
pub mod price;
pub mod prompts;
pub mod ticker;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use api::{FmpClient, SerperClient, YahooClient};
pub use config::{DecisionSchema, FinanceConfig, FinanceConfigBuilder, MarketDataSource, PriceSource};
pub use decision::{Decision, DecisionParser, Recommendation, RiskLevel};
pub use error::{FinanceError, Result};
pub use market_data::{MarketDataFetcher, MarketDataProvider, MarketMetrics, RawFundamentals};
pub use news::{NewsDigest, NewsFetcher, NewsItem, NewsSearchProvider};
pub use pipeline::{
    AnalysisFailure, AnalysisOutcome, AnalysisRequest, FinancialAnalysisPipeline, PipelineBuilder,
};
pub use price::{PriceFetcher, PriceQuote, QuoteLookup, QuoteProvider};
pub use prompts::{AnalysisPrompt, PromptBuilder};
pub use ticker::{TickerResolver, TickerTable};

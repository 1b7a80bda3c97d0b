//! End-to-end analysis: company name in, decision record out
//!
//! One run resolves the ticker, fetches fundamentals, price and news
//! concurrently, renders the prompt, calls the model once and parses the
//! reply. Fetch failures degrade their record; only an unresolved ticker or
//! a failed model call turns the run into an [`AnalysisFailure`].

use crate::api::{FmpClient, SerperClient, YahooClient};
use crate::config::{DecisionSchema, FinanceConfig, MarketDataSource, PriceSource};
use crate::decision::{Decision, DecisionParser};
use crate::error::{FinanceError, Result};
use crate::market_data::{MarketDataFetcher, MarketDataProvider};
use crate::news::{NewsFetcher, NewsSearchProvider};
use crate::price::{PriceFetcher, QuoteProvider};
use crate::prompts::PromptBuilder;
use crate::ticker::{TickerResolver, TickerTable, normalize_ticker};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Error text returned when no ticker could be determined
pub const UNRESOLVED_TICKER: &str = "could not resolve ticker";

/// Input to one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub company_name: String,
    /// Skips resolution when present and non-blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

impl AnalysisRequest {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ticker: None,
        }
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }
}

/// Diagnostic record for a run that produced no decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub error: String,
    pub company: String,
    pub ticker: String,
}

/// Result of [`FinancialAnalysisPipeline::analyze`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Decision(Box<Decision>),
    Failure(AnalysisFailure),
}

impl AnalysisOutcome {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Decision(decision) => Some(decision),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&AnalysisFailure> {
        match self {
            Self::Decision(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Decision(_))
    }
}

/// Company-to-decision analysis pipeline
///
/// Runs share no mutable state, so one pipeline can serve concurrent calls.
///
/// # Example
///
/// ```no_run
/// use agent_finance::{AnalysisRequest, FinanceConfig, FinancialAnalysisPipeline};
/// use agent_llm::providers::GeminiProvider;
/// use std::sync::Arc;
///
/// # async fn example() -> agent_finance::Result<()> {
/// let pipeline = FinancialAnalysisPipeline::builder()
///     .config(FinanceConfig::from_env()?)
///     .llm(Arc::new(GeminiProvider::from_env()?))
///     .build()?;
///
/// let outcome = pipeline.analyze(AnalysisRequest::new("Apple")).await;
/// println!("{}", serde_json::to_string_pretty(&outcome)?);
/// # Ok(())
/// # }
/// ```
pub struct FinancialAnalysisPipeline {
    config: FinanceConfig,
    llm: Arc<dyn LLMProvider>,
    resolver: TickerResolver,
    market_data: MarketDataFetcher,
    prices: PriceFetcher,
    news: NewsFetcher,
    prompts: PromptBuilder,
    parser: DecisionParser,
}

impl FinancialAnalysisPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &FinanceConfig {
        &self.config
    }

    /// Resolve a company name, returning `""` when unresolved
    pub async fn resolve_ticker(&self, company_name: &str) -> String {
        self.resolver.resolve(company_name).await
    }

    /// Run one analysis
    ///
    /// Never fails: every path ends in a [`Decision`] or an
    /// [`AnalysisFailure`].
    #[instrument(skip(self, request), fields(company = %request.company_name))]
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let company = request.company_name.trim().to_string();

        let ticker = match request
            .ticker
            .as_deref()
            .map(normalize_ticker)
            .filter(|t| !t.is_empty())
        {
            Some(ticker) => ticker,
            None => self.resolver.resolve(&company).await,
        };

        if ticker.is_empty() {
            warn!("Ticker could not be resolved");
            return AnalysisOutcome::Failure(AnalysisFailure {
                error: UNRESOLVED_TICKER.to_string(),
                company,
                ticker,
            });
        }

        match self.run(&company, &ticker).await {
            Ok(decision) => {
                info!(%ticker, decision = %decision.decision, "Analysis complete");
                AnalysisOutcome::Decision(Box::new(decision))
            }
            Err(e) => {
                error!(%ticker, error = %e, "Analysis failed");
                AnalysisOutcome::Failure(AnalysisFailure {
                    error: e.to_string(),
                    company,
                    ticker,
                })
            }
        }
    }

    async fn run(&self, company: &str, ticker: &str) -> Result<Decision> {
        let subject = if company.is_empty() { ticker } else { company };

        let sustainability = async {
            match self.config.decision_schema {
                DecisionSchema::GreenScore => Some(self.news.fetch_sustainability(subject).await),
                DecisionSchema::Standard => None,
            }
        };

        let (metrics, quote, news, sustainability) = tokio::join!(
            self.market_data.fetch(ticker),
            self.prices.fetch(ticker),
            self.news.fetch(subject),
            sustainability,
        );

        let (system, user) = self
            .prompts
            .build(subject, &metrics, &quote, &news, sustainability.as_ref())?
            .into_parts();

        let request = CompletionRequest::builder(&self.config.model)
            .system(system)
            .add_message(Message::user(user))
            .temperature(self.config.analysis_temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        let response = self.llm.complete(request).await?;
        debug!(raw = %response.text(), "Model reply");

        Ok(self
            .parser
            .parse(response.text(), company, &quote.ticker, &quote))
    }
}

/// Builder for [`FinancialAnalysisPipeline`]
///
/// Providers that are not set explicitly are created from the configuration.
pub struct PipelineBuilder {
    config: FinanceConfig,
    llm: Option<Arc<dyn LLMProvider>>,
    ticker_table: Option<TickerTable>,
    market_data_provider: Option<Arc<dyn MarketDataProvider>>,
    quote_provider: Option<Arc<dyn QuoteProvider>>,
    news_provider: Option<Arc<dyn NewsSearchProvider>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: FinanceConfig::default(),
            llm: None,
            ticker_table: None,
            market_data_provider: None,
            quote_provider: None,
            news_provider: None,
        }
    }

    /// Set the pipeline configuration
    pub fn config(mut self, config: FinanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model used for ticker resolution and analysis
    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace the well-known company table
    pub fn ticker_table(mut self, table: TickerTable) -> Self {
        self.ticker_table = Some(table);
        self
    }

    pub fn market_data_provider(mut self, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.market_data_provider = Some(provider);
        self
    }

    pub fn quote_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.quote_provider = Some(provider);
        self
    }

    pub fn news_provider(mut self, provider: Arc<dyn NewsSearchProvider>) -> Self {
        self.news_provider = Some(provider);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if no model is set, a default provider cannot be
    /// created (e.g. FMP selected without a key), or a template fails to
    /// compile.
    pub fn build(self) -> Result<FinancialAnalysisPipeline> {
        let config = self.config;
        config.validate_limits()?;
        let llm = self
            .llm
            .ok_or_else(|| FinanceError::ConfigError("LLM provider not set".to_string()))?;

        let market_data_provider = match self.market_data_provider {
            Some(provider) => provider,
            None => default_market_data_provider(&config)?,
        };
        let quote_provider = match self.quote_provider {
            Some(provider) => provider,
            None => default_quote_provider(&config)?,
        };
        let news_provider: Arc<dyn NewsSearchProvider> = match self.news_provider {
            Some(provider) => provider,
            None => Arc::new(SerperClient::from_config(&config)?),
        };

        let resolver = TickerResolver::new(
            self.ticker_table.unwrap_or_default(),
            llm.clone(),
            &config.model,
            config.resolver_temperature,
        );

        Ok(FinancialAnalysisPipeline {
            resolver,
            market_data: MarketDataFetcher::new(market_data_provider),
            prices: PriceFetcher::new(quote_provider, &config.exchange_suffix),
            news: NewsFetcher::new(news_provider, config.news_limit),
            prompts: PromptBuilder::new(
                config.decision_schema,
                config.prompt_news_limit,
                config.max_reasons,
            )?,
            parser: DecisionParser::new(config.max_reasons, config.decision_schema),
            llm,
            config,
        })
    }
}

fn default_market_data_provider(config: &FinanceConfig) -> Result<Arc<dyn MarketDataProvider>> {
    let provider: Arc<dyn MarketDataProvider> = match config.market_data_source {
        MarketDataSource::Fmp => Arc::new(FmpClient::from_config(config)?),
        MarketDataSource::Yahoo => Arc::new(YahooClient::from_config(config)?),
    };
    Ok(provider)
}

fn default_quote_provider(config: &FinanceConfig) -> Result<Arc<dyn QuoteProvider>> {
    let provider: Arc<dyn QuoteProvider> = match config.price_source {
        PriceSource::Yahoo => Arc::new(YahooClient::from_config(config)?),
        PriceSource::Fmp => Arc::new(FmpClient::from_config(config)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Recommendation, RiskLevel};
    use crate::market_data::{MockMarketDataProvider, RawFundamentals};
    use crate::news::{MockNewsSearchProvider, NewsItem};
    use crate::price::{MockQuoteProvider, QuoteLookup};
    use crate::test_support::ScriptedLlm;
    use serde_json::json;

    const BUY_REPLY: &str = r#"Here is my analysis:
```json
{"decision": "BUY", "current_stock_price": "1.00", "risk_level": "LOW",
 "time_horizon": "LONG_TERM", "current_financial_condition": "Strong",
 "reasons": ["Growth"], "key_metrics_considered": ["PE"]}
```"#;

    fn fundamentals() -> MockMarketDataProvider {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_fundamentals().returning(|_| {
            Ok(RawFundamentals {
                profile: json!([{ "sector": "Technology" }]),
                ratios: json!([{ "priceEarningsRatio": 28 }]),
                ..Default::default()
            })
        });
        provider
    }

    fn quotes() -> MockQuoteProvider {
        let mut provider = MockQuoteProvider::new();
        provider.expect_lookup().returning(|_| {
            Ok(QuoteLookup {
                price: Some(150.0),
                currency: Some("USD".to_string()),
            })
        });
        provider
    }

    fn news() -> MockNewsSearchProvider {
        let mut provider = MockNewsSearchProvider::new();
        provider.expect_search().returning(|query| {
            Ok(vec![NewsItem {
                title: Some(format!("Result for {query}")),
                ..Default::default()
            }])
        });
        provider
    }

    fn pipeline(
        llm: Arc<ScriptedLlm>,
        config: FinanceConfig,
        market_data: MockMarketDataProvider,
    ) -> FinancialAnalysisPipeline {
        FinancialAnalysisPipeline::builder()
            .config(config)
            .llm(llm)
            .market_data_provider(Arc::new(market_data))
            .quote_provider(Arc::new(quotes()))
            .news_provider(Arc::new(news()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_known_company() {
        let llm = Arc::new(ScriptedLlm::replying([BUY_REPLY]));
        let pipeline = pipeline(llm.clone(), FinanceConfig::default(), fundamentals());

        let outcome = pipeline.analyze(AnalysisRequest::new("Apple")).await;
        let decision = outcome.decision().unwrap();

        assert_eq!(decision.decision, Recommendation::Buy);
        assert_eq!(decision.risk_level, RiskLevel::Low);
        assert_eq!(decision.ticker, "AAPL");
        assert_eq!(decision.company, "Apple");
        assert_eq!(decision.current_stock_price, Some(150.0));
        assert_eq!(decision.currency.as_deref(), Some("USD"));

        // Table hit: the only model call is the analysis itself
        assert_eq!(llm.calls(), 1);
        let request = llm.last_request().unwrap();
        let user = request.last_user_text().unwrap();
        assert!(user.starts_with("Analyze Apple (AAPL):"));
        assert!(user.contains("PE: 28.00"));
        assert!(user.contains("Result for Apple latest stock news earnings updates"));
    }

    #[tokio::test]
    async fn test_unresolved_ticker_short_circuits() {
        let llm = Arc::new(ScriptedLlm::failing("model offline"));
        let mut market_data = MockMarketDataProvider::new();
        market_data.expect_fundamentals().never();
        let pipeline = pipeline(llm.clone(), FinanceConfig::default(), market_data);

        let outcome = pipeline.analyze(AnalysisRequest::new("Obscure Holdings")).await;

        assert_eq!(
            outcome.failure(),
            Some(&AnalysisFailure {
                error: UNRESOLVED_TICKER.to_string(),
                company: "Obscure Holdings".to_string(),
                ticker: String::new(),
            })
        );
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_explicit_ticker_skips_resolution() {
        let llm = Arc::new(ScriptedLlm::replying([BUY_REPLY]));
        let pipeline = pipeline(llm.clone(), FinanceConfig::default(), fundamentals());

        let outcome = pipeline
            .analyze(AnalysisRequest::new("Some Co").with_ticker(" tcs.ns "))
            .await;

        assert_eq!(outcome.decision().unwrap().ticker, "TCS.NS");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_becomes_failure_record() {
        let llm = Arc::new(ScriptedLlm::failing("quota exhausted"));
        let pipeline = pipeline(llm, FinanceConfig::default(), fundamentals());

        let outcome = pipeline.analyze(AnalysisRequest::new("Apple")).await;
        let failure = outcome.failure().unwrap();

        assert_eq!(failure.ticker, "AAPL");
        assert_eq!(failure.company, "Apple");
        assert!(failure.error.contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_market_data_failure_still_decides() {
        let llm = Arc::new(ScriptedLlm::replying(["no json here"]));
        let mut market_data = MockMarketDataProvider::new();
        market_data
            .expect_fundamentals()
            .returning(|_| Err(FinanceError::ApiError("timeout".to_string())));
        let pipeline = pipeline(llm.clone(), FinanceConfig::default(), market_data);

        let outcome = pipeline.analyze(AnalysisRequest::new("Apple")).await;
        let decision = outcome.decision().unwrap();

        assert_eq!(decision.decision, Recommendation::Hold);
        assert_eq!(decision.current_stock_price, Some(150.0));
        let request = llm.last_request().unwrap();
        assert!(request.last_user_text().unwrap().contains("PE: N/A"));
    }

    #[tokio::test]
    async fn test_green_schema_fetches_sustainability() {
        let llm = Arc::new(ScriptedLlm::replying([BUY_REPLY]));
        let config = FinanceConfig {
            decision_schema: DecisionSchema::GreenScore,
            ..Default::default()
        };
        let pipeline = pipeline(llm.clone(), config, fundamentals());

        pipeline.analyze(AnalysisRequest::new("Apple")).await;

        let request = llm.last_request().unwrap();
        assert!(request.last_user_text().unwrap().contains(
            "Sustainability: Result for Apple ESG sustainability environmental initiatives"
        ));
        assert!(request.system.unwrap().contains("green_score"));
    }

    #[test]
    fn test_build_requires_llm() {
        let result = FinancialAnalysisPipeline::builder()
            .market_data_provider(Arc::new(MockMarketDataProvider::new()))
            .quote_provider(Arc::new(MockQuoteProvider::new()))
            .news_provider(Arc::new(MockNewsSearchProvider::new()))
            .build();
        assert!(matches!(result, Err(FinanceError::ConfigError(_))));
    }

    #[test]
    fn test_build_rejects_invalid_limits() {
        for config in [
            FinanceConfig {
                news_limit: 0,
                prompt_news_limit: 0,
                ..Default::default()
            },
            FinanceConfig {
                news_limit: 2,
                prompt_news_limit: 3,
                ..Default::default()
            },
        ] {
            let result = FinancialAnalysisPipeline::builder()
                .config(config)
                .llm(Arc::new(ScriptedLlm::replying(Vec::<String>::new())))
                .market_data_provider(Arc::new(MockMarketDataProvider::new()))
                .quote_provider(Arc::new(MockQuoteProvider::new()))
                .news_provider(Arc::new(MockNewsSearchProvider::new()))
                .build();
            assert!(matches!(result, Err(FinanceError::ConfigError(_))));
        }
    }

    #[test]
    fn test_default_fmp_provider_needs_key() {
        let result = FinancialAnalysisPipeline::builder()
            .llm(Arc::new(ScriptedLlm::replying(Vec::<String>::new())))
            .build();
        assert!(matches!(result, Err(FinanceError::ConfigError(_))));
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let failure = AnalysisOutcome::Failure(AnalysisFailure {
            error: UNRESOLVED_TICKER.to_string(),
            company: "X".to_string(),
            ticker: String::new(),
        });
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({ "error": "could not resolve ticker", "company": "X", "ticker": "" })
        );
    }
}

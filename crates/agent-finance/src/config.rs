//! Configuration for the analysis pipeline

use crate::error::{FinanceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default FMP REST base
pub const DEFAULT_FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
/// Default Yahoo Finance base
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Default Serper base
pub const DEFAULT_SERPER_BASE_URL: &str = "https://google.serper.dev";

/// Provider used for fundamentals and ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketDataSource {
    /// Financial Modeling Prep (requires API key)
    #[default]
    Fmp,
    /// Yahoo Finance quoteSummary (no API key)
    Yahoo,
}

/// Provider used for the latest traded price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Yahoo Finance chart endpoint (no API key)
    #[default]
    Yahoo,
    /// Financial Modeling Prep quote endpoint
    Fmp,
}

/// Output schema requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSchema {
    /// Decision fields only
    #[default]
    Standard,
    /// Decision fields plus `green_score` and `green_summary`, fed by an ESG digest
    GreenScore,
}

impl FromStr for MarketDataSource {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fmp" => Ok(Self::Fmp),
            "yahoo" | "yfinance" => Ok(Self::Yahoo),
            other => Err(FinanceError::ConfigError(format!(
                "unknown market data source: {other}"
            ))),
        }
    }
}

impl FromStr for PriceSource {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" => Ok(Self::Yahoo),
            "fmp" => Ok(Self::Fmp),
            other => Err(FinanceError::ConfigError(format!(
                "unknown price source: {other}"
            ))),
        }
    }
}

impl FromStr for DecisionSchema {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(Self::Standard),
            "green_score" | "green" | "esg" => Ok(Self::GreenScore),
            other => Err(FinanceError::ConfigError(format!(
                "unknown decision schema: {other}"
            ))),
        }
    }
}

impl fmt::Display for MarketDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fmp => "fmp",
            Self::Yahoo => "yahoo",
        })
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yahoo => "yahoo",
            Self::Fmp => "fmp",
        })
    }
}

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceConfig {
    /// Where fundamentals come from
    pub market_data_source: MarketDataSource,

    /// Where the latest price comes from
    pub price_source: PriceSource,

    /// Which decision schema the model is asked for
    pub decision_schema: DecisionSchema,

    /// Timeout applied to every provider HTTP call
    pub request_timeout: Duration,

    /// Suffix tried once when a bare ticker has no price
    pub exchange_suffix: String,

    /// News items kept from the search provider
    pub news_limit: usize,

    /// News items interpolated into the prompt
    pub prompt_news_limit: usize,

    /// Upper bound on `reasons` in the decision
    pub max_reasons: usize,

    /// Search requests allowed per minute
    pub news_rate_limit: u32,

    /// Model identifier passed to the completion provider
    pub model: String,

    /// Sampling temperature for the analysis call
    pub analysis_temperature: f32,

    /// Sampling temperature for ticker resolution
    pub resolver_temperature: f32,

    /// Maximum tokens for the analysis completion
    pub max_tokens: usize,

    /// Financial Modeling Prep API key
    #[serde(skip_serializing, default)]
    pub fmp_api_key: Option<String>,

    /// Serper API key
    #[serde(skip_serializing, default)]
    pub serper_api_key: Option<String>,

    /// FMP base URL
    pub fmp_base_url: String,

    /// Yahoo Finance base URL
    pub yahoo_base_url: String,

    /// Serper base URL
    pub serper_base_url: String,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            market_data_source: MarketDataSource::Fmp,
            price_source: PriceSource::Yahoo,
            decision_schema: DecisionSchema::Standard,
            request_timeout: Duration::from_secs(10),
            exchange_suffix: ".NS".to_string(),
            news_limit: 3,
            prompt_news_limit: 2,
            max_reasons: 10,
            news_rate_limit: 60,
            model: "gemini-flash-latest".to_string(),
            analysis_temperature: 0.15,
            resolver_temperature: 0.0,
            max_tokens: 1024,
            fmp_api_key: None,
            serper_api_key: None,
            fmp_base_url: DEFAULT_FMP_BASE_URL.to_string(),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            serper_base_url: DEFAULT_SERPER_BASE_URL.to_string(),
        }
    }
}

impl FinanceConfig {
    /// Create a new configuration builder
    pub fn builder() -> FinanceConfigBuilder {
        FinanceConfigBuilder::default()
    }

    /// Build a configuration from the environment, after loading `.env`
    ///
    /// Reads `FMP_API_KEY`, `SERPER_API_KEY`, `MARKET_DATA_SOURCE`,
    /// `PRICE_SOURCE`, `DECISION_SCHEMA` and `LLM_MODEL`.
    pub fn from_env() -> Result<Self> {
        agent_utils::load_dotenv();
        Self::builder().with_env()?.build()
    }

    /// True when either FMP-backed provider is selected
    pub fn uses_fmp(&self) -> bool {
        self.market_data_source == MarketDataSource::Fmp || self.price_source == PriceSource::Fmp
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.uses_fmp() && self.fmp_api_key.is_none() {
            return Err(FinanceError::ConfigError(
                "FMP API key required when FMP is a market data or price source".to_string(),
            ));
        }

        self.validate_limits()
    }

    /// Validate the numeric limits only, leaving key checks to the clients
    pub fn validate_limits(&self) -> Result<()> {
        if self.news_limit == 0 {
            return Err(FinanceError::ConfigError(
                "news_limit must be greater than 0".to_string(),
            ));
        }

        if self.prompt_news_limit > self.news_limit {
            return Err(FinanceError::ConfigError(format!(
                "prompt_news_limit ({}) cannot exceed news_limit ({})",
                self.prompt_news_limit, self.news_limit
            )));
        }

        if self.max_reasons == 0 {
            return Err(FinanceError::ConfigError(
                "max_reasons must be greater than 0".to_string(),
            ));
        }

        if self.news_rate_limit == 0 {
            return Err(FinanceError::ConfigError(
                "news_rate_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for FinanceConfig
#[derive(Debug, Default)]
pub struct FinanceConfigBuilder {
    market_data_source: Option<MarketDataSource>,
    price_source: Option<PriceSource>,
    decision_schema: Option<DecisionSchema>,
    request_timeout: Option<Duration>,
    exchange_suffix: Option<String>,
    news_limit: Option<usize>,
    prompt_news_limit: Option<usize>,
    max_reasons: Option<usize>,
    news_rate_limit: Option<u32>,
    model: Option<String>,
    analysis_temperature: Option<f32>,
    resolver_temperature: Option<f32>,
    max_tokens: Option<usize>,
    fmp_api_key: Option<String>,
    serper_api_key: Option<String>,
    fmp_base_url: Option<String>,
    yahoo_base_url: Option<String>,
    serper_base_url: Option<String>,
}

impl FinanceConfigBuilder {
    /// Set the fundamentals provider
    pub fn market_data_source(mut self, source: MarketDataSource) -> Self {
        self.market_data_source = Some(source);
        self
    }

    /// Set the price provider
    pub fn price_source(mut self, source: PriceSource) -> Self {
        self.price_source = Some(source);
        self
    }

    /// Set the decision schema
    pub fn decision_schema(mut self, schema: DecisionSchema) -> Self {
        self.decision_schema = Some(schema);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the exchange suffix used by the price retry
    pub fn exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exchange_suffix = Some(suffix.into());
        self
    }

    /// Set how many news items are kept
    pub fn news_limit(mut self, limit: usize) -> Self {
        self.news_limit = Some(limit);
        self
    }

    /// Set how many news items reach the prompt
    pub fn prompt_news_limit(mut self, limit: usize) -> Self {
        self.prompt_news_limit = Some(limit);
        self
    }

    /// Set the cap on decision reasons
    pub fn max_reasons(mut self, max: usize) -> Self {
        self.max_reasons = Some(max);
        self
    }

    /// Set search requests per minute
    pub fn news_rate_limit(mut self, per_minute: u32) -> Self {
        self.news_rate_limit = Some(per_minute);
        self
    }

    /// Set the model identifier
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the analysis temperature
    pub fn analysis_temperature(mut self, temperature: f32) -> Self {
        self.analysis_temperature = Some(temperature);
        self
    }

    /// Set the ticker resolution temperature
    pub fn resolver_temperature(mut self, temperature: f32) -> Self {
        self.resolver_temperature = Some(temperature);
        self
    }

    /// Set max tokens for the analysis call
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the FMP API key
    pub fn fmp_api_key(mut self, key: impl Into<String>) -> Self {
        self.fmp_api_key = Some(key.into());
        self
    }

    /// Set the Serper API key
    pub fn serper_api_key(mut self, key: impl Into<String>) -> Self {
        self.serper_api_key = Some(key.into());
        self
    }

    /// Override the FMP base URL
    pub fn fmp_base_url(mut self, url: impl Into<String>) -> Self {
        self.fmp_base_url = Some(url.into());
        self
    }

    /// Override the Yahoo base URL
    pub fn yahoo_base_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_base_url = Some(url.into());
        self
    }

    /// Override the Serper base URL
    pub fn serper_base_url(mut self, url: impl Into<String>) -> Self {
        self.serper_base_url = Some(url.into());
        self
    }

    /// Fill unset fields from environment variables
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(key) = agent_utils::env_var("FMP_API_KEY") {
            self.fmp_api_key.get_or_insert(key);
        }
        if let Some(key) = agent_utils::env_var("SERPER_API_KEY") {
            self.serper_api_key.get_or_insert(key);
        }
        if let Some(model) = agent_utils::env_var("LLM_MODEL") {
            self.model.get_or_insert(model);
        }
        if let Some(source) = agent_utils::env_parse::<MarketDataSource>("MARKET_DATA_SOURCE")? {
            self.market_data_source.get_or_insert(source);
        }
        if let Some(source) = agent_utils::env_parse::<PriceSource>("PRICE_SOURCE")? {
            self.price_source.get_or_insert(source);
        }
        if let Some(schema) = agent_utils::env_parse::<DecisionSchema>("DECISION_SCHEMA")? {
            self.decision_schema.get_or_insert(schema);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<FinanceConfig> {
        let defaults = FinanceConfig::default();

        let config = FinanceConfig {
            market_data_source: self.market_data_source.unwrap_or(defaults.market_data_source),
            price_source: self.price_source.unwrap_or(defaults.price_source),
            decision_schema: self.decision_schema.unwrap_or(defaults.decision_schema),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            exchange_suffix: self.exchange_suffix.unwrap_or(defaults.exchange_suffix),
            news_limit: self.news_limit.unwrap_or(defaults.news_limit),
            prompt_news_limit: self.prompt_news_limit.unwrap_or(defaults.prompt_news_limit),
            max_reasons: self.max_reasons.unwrap_or(defaults.max_reasons),
            news_rate_limit: self.news_rate_limit.unwrap_or(defaults.news_rate_limit),
            model: self.model.unwrap_or(defaults.model),
            analysis_temperature: self
                .analysis_temperature
                .unwrap_or(defaults.analysis_temperature),
            resolver_temperature: self
                .resolver_temperature
                .unwrap_or(defaults.resolver_temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            fmp_api_key: self.fmp_api_key,
            serper_api_key: self.serper_api_key,
            fmp_base_url: self.fmp_base_url.unwrap_or(defaults.fmp_base_url),
            yahoo_base_url: self.yahoo_base_url.unwrap_or(defaults.yahoo_base_url),
            serper_base_url: self.serper_base_url.unwrap_or(defaults.serper_base_url),
        };

        config.validate()?;
        debug!(
            market_data = %config.market_data_source,
            price = %config.price_source,
            schema = ?config.decision_schema,
            "Finance configuration built"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FinanceConfig::default();
        assert_eq!(config.market_data_source, MarketDataSource::Fmp);
        assert_eq!(config.price_source, PriceSource::Yahoo);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.exchange_suffix, ".NS");
        assert_eq!(config.news_limit, 3);
        assert_eq!(config.prompt_news_limit, 2);
        assert_eq!(config.max_reasons, 10);
    }

    #[test]
    fn test_default_requires_fmp_key() {
        assert!(FinanceConfig::default().validate().is_err());

        let config = FinanceConfig {
            fmp_api_key: Some("test_key".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yahoo_only_needs_no_key() {
        let config = FinanceConfig::builder()
            .market_data_source(MarketDataSource::Yahoo)
            .price_source(PriceSource::Yahoo)
            .build()
            .unwrap();
        assert!(!config.uses_fmp());
    }

    #[test]
    fn test_fmp_price_source_needs_key() {
        let result = FinanceConfig::builder()
            .market_data_source(MarketDataSource::Yahoo)
            .price_source(PriceSource::Fmp)
            .build();
        assert!(matches!(result, Err(FinanceError::ConfigError(_))));
    }

    #[test]
    fn test_news_limits_validation() {
        let result = FinanceConfig::builder()
            .fmp_api_key("k")
            .news_limit(1)
            .prompt_news_limit(2)
            .build();
        assert!(result.is_err());

        let result = FinanceConfig::builder().fmp_api_key("k").news_limit(0).build();
        assert!(result.is_err());

        let result = FinanceConfig::builder().fmp_api_key("k").max_reasons(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_limits_checked_without_keys() {
        assert!(FinanceConfig::default().validate_limits().is_ok());

        let config = FinanceConfig {
            prompt_news_limit: 5,
            ..Default::default()
        };
        assert!(config.validate_limits().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = FinanceConfig::builder()
            .fmp_api_key("k")
            .decision_schema(DecisionSchema::GreenScore)
            .request_timeout(Duration::from_secs(5))
            .model("local-model")
            .build()
            .unwrap();

        assert_eq!(config.decision_schema, DecisionSchema::GreenScore);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.model, "local-model");
    }

    #[test]
    fn test_source_parsing() {
        assert_eq!("FMP".parse::<MarketDataSource>().unwrap(), MarketDataSource::Fmp);
        assert_eq!("yfinance".parse::<PriceSource>().unwrap(), PriceSource::Yahoo);
        assert_eq!(
            "green-score".parse::<DecisionSchema>().unwrap(),
            DecisionSchema::GreenScore
        );
        assert!("bloomberg".parse::<MarketDataSource>().is_err());
    }

    #[test]
    fn test_api_keys_not_serialized() {
        let config = FinanceConfig {
            fmp_api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}

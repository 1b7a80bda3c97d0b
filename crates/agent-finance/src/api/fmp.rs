//! Financial Modeling Prep API client

use super::{endpoint, http_client};
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use crate::market_data::{MarketDataProvider, RawFundamentals, Section, coerce_number};
use crate::price::{QuoteLookup, QuoteProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Statements are requested for the last four periods
const STATEMENT_LIMIT: u32 = 4;

/// Financial Modeling Prep client
///
/// Endpoints return either a list of records or, on errors such as an invalid
/// key or a plan-restricted endpoint, a single mapping with a 4xx status.
/// Any JSON payload is handed back untouched whatever the status; shape
/// handling happens in [`crate::market_data`].
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FmpClient {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    /// Create a client from pipeline configuration
    pub fn from_config(config: &FinanceConfig) -> Result<Self> {
        let api_key = config.fmp_api_key.clone().ok_or_else(|| {
            FinanceError::ConfigError("FMP_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key, &config.fmp_base_url, config.request_timeout)
    }

    #[instrument(skip(self))]
    async fn get(&self, resource: &str, ticker: &str, limit: Option<u32>) -> Result<Value> {
        let mut url = endpoint(&self.base_url, &[resource, ticker])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            query.append_pair("apikey", &self.api_key);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Error statuses still carry a JSON mapping that shape handling blanks
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(FinanceError::ApiError(format!(
                    "FMP {resource} returned {status}: {body}"
                )));
            }
        };

        if !status.is_success() {
            warn!(%status, "FMP returned an error payload");
        }
        debug!(shape = shape_name(&value), "FMP response received");
        Ok(value)
    }

    /// Company profile
    pub async fn profile(&self, ticker: &str) -> Result<Value> {
        self.get("profile", ticker, None).await
    }

    /// Annual financial ratios, most recent first
    pub async fn ratios(&self, ticker: &str) -> Result<Value> {
        self.get("ratios", ticker, None).await
    }

    /// Last four income statements
    pub async fn income_statement(&self, ticker: &str) -> Result<Value> {
        self.get("income-statement", ticker, Some(STATEMENT_LIMIT)).await
    }

    /// Last four balance sheets
    pub async fn balance_sheet(&self, ticker: &str) -> Result<Value> {
        self.get("balance-sheet-statement", ticker, Some(STATEMENT_LIMIT))
            .await
    }

    /// Last four cash flow statements
    pub async fn cash_flow(&self, ticker: &str) -> Result<Value> {
        self.get("cash-flow-statement", ticker, Some(STATEMENT_LIMIT))
            .await
    }

    /// Real-time quote
    pub async fn quote(&self, ticker: &str) -> Result<Value> {
        self.get("quote", ticker, None).await
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
        _ => "other",
    }
}

#[async_trait]
impl MarketDataProvider for FmpClient {
    async fn fundamentals(&self, ticker: &str) -> Result<RawFundamentals> {
        let (profile, ratios, income_statement, balance_sheet, cash_flow) = tokio::try_join!(
            self.profile(ticker),
            self.ratios(ticker),
            self.income_statement(ticker),
            self.balance_sheet(ticker),
            self.cash_flow(ticker),
        )?;

        Ok(RawFundamentals {
            profile,
            ratios,
            income_statement,
            balance_sheet,
            cash_flow,
        })
    }
}

#[async_trait]
impl QuoteProvider for FmpClient {
    /// Only a list carries a price; a mapping here is an error payload
    async fn lookup(&self, ticker: &str) -> Result<QuoteLookup> {
        let price = match Section::from(self.quote(ticker).await?) {
            section @ Section::Records(_) => {
                section.into_record().get("price").and_then(coerce_number)
            }
            Section::Record(_) | Section::Missing => None,
        };

        Ok(QuoteLookup {
            price,
            currency: None,
        })
    }
}

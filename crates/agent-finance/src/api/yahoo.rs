//! Yahoo Finance client
//!
//! Two endpoints are used: the v8 chart endpoint for the latest price and
//! currency, and v10 quoteSummary for fundamentals. Neither needs an API key,
//! but both reject requests without a browser-like `User-Agent`.

use super::{endpoint, http_client};
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use crate::market_data::{MarketDataProvider, RawFundamentals, Section, coerce_number};
use crate::price::{QuoteLookup, QuoteProvider};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";
const SUMMARY_MODULES: &str = "summaryDetail,financialData,defaultKeyStatistics,assetProfile,price";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
}

/// Yahoo Finance client
#[derive(Debug, Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
}

impl YahooClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Create a client from pipeline configuration
    pub fn from_config(config: &FinanceConfig) -> Result<Self> {
        Self::new(&config.yahoo_base_url, config.request_timeout)
    }

    async fn get_json(&self, url: url::Url) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FinanceError::ApiError(format!(
                "Yahoo Finance returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }

    /// Latest regular-market price and currency from the chart endpoint
    #[instrument(skip(self))]
    pub async fn chart(&self, ticker: &str) -> Result<QuoteLookup> {
        let mut url = endpoint(&self.base_url, &["v8", "finance", "chart", ticker])?;
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("range", "1d");

        let envelope: ChartEnvelope = serde_json::from_value(self.get_json(url).await?)?;
        let meta = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.meta)
            .unwrap_or_default();

        debug!(price = ?meta.regular_market_price, currency = ?meta.currency, "Chart meta");
        Ok(QuoteLookup {
            price: meta.regular_market_price.filter(|p| p.is_finite()),
            currency: meta.currency,
        })
    }

    /// First quoteSummary result, reduced to one mapping of modules
    #[instrument(skip(self))]
    pub async fn quote_summary(&self, ticker: &str) -> Result<Map<String, Value>> {
        let mut url = endpoint(&self.base_url, &["v10", "finance", "quoteSummary", ticker])?;
        url.query_pairs_mut().append_pair("modules", SUMMARY_MODULES);

        let body = self.get_json(url).await?;
        let result = body
            .get("quoteSummary")
            .and_then(|summary| summary.get("result"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Section::from(result).into_record())
    }
}

fn module(summary: &Map<String, Value>, name: &str) -> Map<String, Value> {
    summary
        .get(name)
        .cloned()
        .map(|value| Section::from(value).into_record())
        .unwrap_or_default()
}

fn first_value(record: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| coerce_number(value).is_some() || value.is_string())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Translate quoteSummary modules into FMP-style sections
///
/// Yahoo reports debt-to-equity as a percentage; it is scaled to a ratio here.
pub(crate) fn summary_to_fundamentals(summary: &Map<String, Value>) -> RawFundamentals {
    let detail = module(summary, "summaryDetail");
    let financial = module(summary, "financialData");
    let statistics = module(summary, "defaultKeyStatistics");
    let profile = module(summary, "assetProfile");
    let price = module(summary, "price");

    let pe = ["trailingPE", "forwardPE"]
        .iter()
        .find_map(|key| detail.get(*key).and_then(coerce_number));
    let debt_to_equity = financial
        .get("debtToEquity")
        .and_then(coerce_number)
        .map(|percent| percent / 100.0);

    RawFundamentals {
        profile: json!({
            "companyName": first_value(&price, &["longName", "shortName"]),
            "sector": first_value(&profile, &["sector"]),
            "description": first_value(&profile, &["longBusinessSummary"]),
            "mktCap": first_value(&price, &["marketCap"]),
            "currency": first_value(&price, &["currency"])
                .as_str()
                .map(Value::from)
                .unwrap_or_else(|| first_value(&detail, &["currency"])),
        }),
        ratios: json!({
            "priceEarningsRatio": pe,
            "returnOnEquity": first_value(&financial, &["returnOnEquity"]),
            "netProfitMargin": first_value(&financial, &["profitMargins"]),
            "debtEquityRatio": debt_to_equity,
        }),
        income_statement: json!({
            "revenue": first_value(&financial, &["totalRevenue"]),
            "netIncome": first_value(&statistics, &["netIncomeToCommon"]),
        }),
        balance_sheet: json!({
            "totalDebt": first_value(&financial, &["totalDebt"]),
        }),
        cash_flow: json!({
            "freeCashFlow": first_value(&financial, &["freeCashflow"]),
        }),
    }
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn lookup(&self, ticker: &str) -> Result<QuoteLookup> {
        self.chart(ticker).await
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fundamentals(&self, ticker: &str) -> Result<RawFundamentals> {
        let summary = self.quote_summary(ticker).await?;
        Ok(summary_to_fundamentals(&summary))
    }
}

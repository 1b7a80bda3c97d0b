//! Fundamentals retrieval and normalization
//!
//! Providers hand back loosely shaped JSON per sub-resource. Each section is
//! classified into a [`Section`] as soon as it arrives and immediately reduced
//! to a single record, so nothing past this module ever sees untyped provider
//! payloads.

use crate::error::Result;
use crate::ticker::normalize_ticker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Raw sub-resources for one ticker, keyed the way FMP names its endpoints
///
/// Providers with a different vocabulary translate into these sections before
/// returning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFundamentals {
    pub profile: Value,
    pub ratios: Value,
    pub income_statement: Value,
    pub balance_sheet: Value,
    pub cash_flow: Value,
}

/// A source of company fundamentals keyed by ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch every fundamentals section for `ticker`
    async fn fundamentals(&self, ticker: &str) -> Result<RawFundamentals>;
}

/// Shape of one sub-resource as delivered by a provider
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Non-empty list of records, most recent first
    Records(Vec<Value>),
    /// A single mapping
    Record(Map<String, Value>),
    /// Empty list, scalar, or null
    Missing,
}

impl From<Value> for Section {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) if !items.is_empty() => Section::Records(items),
            Value::Object(map) => Section::Record(map),
            _ => Section::Missing,
        }
    }
}

impl Section {
    /// Reduce to one record: first list element, the mapping itself, or empty
    pub fn into_record(self) -> Map<String, Value> {
        match self {
            Section::Records(items) => match items.into_iter().next() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            },
            Section::Record(map) => map,
            Section::Missing => Map::new(),
        }
    }
}

/// Coerce a provider value to a finite number
///
/// Accepts JSON numbers, numeric strings and Yahoo-style `{"raw": n, "fmt": ".."}`.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("raw").and_then(coerce_number),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn number(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(coerce_number))
}

fn text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Canonical fundamentals record
///
/// Every metric is optional; absence is never coerced to zero. A degraded
/// record carries only `ticker` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMetrics {
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    /// Return on equity as a fraction (0.15 = 15%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe: Option<f64>,
    /// Net profit margin as a fraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_to_equity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_cash_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketMetrics {
    /// Normalize raw provider sections into the canonical record
    pub fn from_raw(ticker: impl Into<String>, raw: RawFundamentals) -> Self {
        let profile = Section::from(raw.profile).into_record();
        let ratios = Section::from(raw.ratios).into_record();
        let income = Section::from(raw.income_statement).into_record();
        let balance = Section::from(raw.balance_sheet).into_record();
        let cash_flow = Section::from(raw.cash_flow).into_record();

        Self {
            ticker: ticker.into(),
            company_name: text(&profile, &["companyName"]),
            pe_ratio: number(&ratios, &["priceEarningsRatio", "priceToEarningsRatio"]),
            roe: number(&ratios, &["returnOnEquity"]),
            profit_margin: number(&ratios, &["netProfitMargin"]),
            debt_to_equity: number(&ratios, &["debtEquityRatio", "debtToEquityRatio"]),
            sector: text(&profile, &["sector"]),
            description: text(&profile, &["description"]),
            market_cap: number(&profile, &["mktCap", "marketCap"]),
            currency: text(&profile, &["currency"]),
            revenue: number(&income, &["revenue"]),
            net_income: number(&income, &["netIncome"]),
            free_cash_flow: number(&cash_flow, &["freeCashFlow"]),
            total_debt: number(&balance, &["totalDebt"]),
            error: None,
        }
    }

    /// Record used when the provider call itself failed
    pub fn degraded(ticker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// True when this record stands in for a failed fetch
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetches fundamentals and always returns a usable record
pub struct MarketDataFetcher {
    provider: Arc<dyn MarketDataProvider>,
}

impl MarketDataFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    /// Fetch and normalize fundamentals for `ticker`
    ///
    /// Transport and decoding failures yield [`MarketMetrics::degraded`].
    #[instrument(skip(self))]
    pub async fn fetch(&self, ticker: &str) -> MarketMetrics {
        let ticker = normalize_ticker(ticker);

        match self.provider.fundamentals(&ticker).await {
            Ok(raw) => {
                let metrics = MarketMetrics::from_raw(&ticker, raw);
                debug!(
                    pe = ?metrics.pe_ratio,
                    sector = ?metrics.sector,
                    "Normalized fundamentals"
                );
                metrics
            }
            Err(e) => {
                warn!(%ticker, error = %e, "Market data fetch failed, continuing with empty metrics");
                MarketMetrics::degraded(ticker, e.to_string())
            }
        }
    }
}

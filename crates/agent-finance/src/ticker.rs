//! Company name to ticker resolution

use agent_llm::{CompletionRequest, LLMProvider, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const RESOLVER_SYSTEM_PROMPT: &str = "You are a financial expert. When given a company name, \
respond with ONLY the stock ticker symbol. For Indian companies, YOU MUST append '.NS' \
(e.g., RELIANCE.NS, TATAMOTORS.NS). For US companies, just the ticker (e.g., AAPL). \
Return ONLY the ticker string, nothing else.";

// Room for thinking-enabled models, which spend output tokens before answering.
const RESOLVER_MAX_TOKENS: usize = 256;

const WELL_KNOWN: &[(&str, &str)] = &[
    ("apple", "AAPL"),
    ("microsoft", "MSFT"),
    ("google", "GOOGL"),
    ("alphabet", "GOOGL"),
    ("amazon", "AMZN"),
    ("tesla", "TSLA"),
    ("meta", "META"),
    ("facebook", "META"),
    ("nvidia", "NVDA"),
    ("netflix", "NFLX"),
    ("disney", "DIS"),
    ("walmart", "WMT"),
    ("jpmorgan", "JPM"),
    ("visa", "V"),
    ("mastercard", "MA"),
];

/// Canonical ticker form: trimmed and upper-cased
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Immutable company name to ticker mapping, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerTable {
    entries: HashMap<String, String>,
}

impl TickerTable {
    /// Build a table from `(company, ticker)` pairs
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(company, ticker)| {
                (
                    company.as_ref().trim().to_lowercase(),
                    normalize_ticker(ticker.as_ref()),
                )
            })
            .collect();
        Self { entries }
    }

    /// Table of large US companies that never need a model call
    pub fn well_known() -> Self {
        Self::new(WELL_KNOWN.iter().copied())
    }

    /// Exact, case-insensitive lookup
    pub fn lookup(&self, company: &str) -> Option<&str> {
        self.entries
            .get(&company.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TickerTable {
    fn default() -> Self {
        Self::well_known()
    }
}

/// Keep only the first token of a model reply, stripped of quoting
fn extract_ticker(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .split_whitespace()
        .next()
        .map(|token| {
            token
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.' | ',' | ';'))
                .to_string()
        })
        .unwrap_or_default()
}

/// Resolves free-text company names to tickers
///
/// The static table is consulted first; on a miss the model is asked once.
/// An empty string means the company could not be resolved.
pub struct TickerResolver {
    table: TickerTable,
    llm: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
}

impl TickerResolver {
    pub fn new(
        table: TickerTable,
        llm: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            table,
            llm,
            model: model.into(),
            temperature,
        }
    }

    pub fn table(&self) -> &TickerTable {
        &self.table
    }

    /// Resolve `company_name`, returning `""` when unresolved
    #[instrument(skip(self), fields(provider = %self.llm.name()))]
    pub async fn resolve(&self, company_name: &str) -> String {
        let company = company_name.trim();
        if company.is_empty() {
            return String::new();
        }

        if let Some(ticker) = self.table.lookup(company) {
            debug!(%ticker, "Resolved from static table");
            return ticker.to_string();
        }

        match self.ask_model(company).await {
            Ok(ticker) => {
                debug!(%ticker, "Resolved by model");
                ticker
            }
            Err(e) => {
                warn!(error = %e, "Ticker lookup via model failed");
                String::new()
            }
        }
    }

    async fn ask_model(&self, company: &str) -> agent_llm::Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(RESOLVER_SYSTEM_PROMPT)
            .add_message(Message::user(format!(
                "What is the stock ticker for {company}?"
            )))
            .temperature(self.temperature)
            .max_tokens(RESOLVER_MAX_TOKENS)
            .build();

        let response = self.llm.complete(request).await?;
        Ok(extract_ticker(response.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;

    fn resolver(llm: Arc<ScriptedLlm>) -> TickerResolver {
        TickerResolver::new(TickerTable::well_known(), llm, "test-model", 0.0)
    }

    #[test]
    fn test_well_known_table() {
        let table = TickerTable::well_known();
        assert_eq!(table.len(), 15);
        assert_eq!(table.lookup("Apple"), Some("AAPL"));
        assert_eq!(table.lookup("  FACEBOOK "), Some("META"));
        assert_eq!(table.lookup("Apple Inc"), None);
    }

    #[test]
    fn test_custom_table_normalizes() {
        let table = TickerTable::new([("Infosys", "infy.ns")]);
        assert_eq!(table.lookup("infosys"), Some("INFY.NS"));
    }

    #[test]
    fn test_extract_ticker() {
        assert_eq!(extract_ticker("  reliance.ns \n"), "RELIANCE.NS");
        assert_eq!(extract_ticker("AAPL is the ticker"), "AAPL");
        assert_eq!(extract_ticker("`TSLA`"), "TSLA");
        assert_eq!(extract_ticker("**INFY.NS**."), "INFY.NS");
        assert_eq!(extract_ticker("   "), "");
    }

    #[tokio::test]
    async fn test_table_hit_skips_model() {
        let llm = Arc::new(ScriptedLlm::replying(["WRONG"]));
        let ticker = resolver(llm.clone()).resolve("Apple").await;

        assert_eq!(ticker, "AAPL");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_asks_model_once() {
        let llm = Arc::new(ScriptedLlm::replying(["stark.ns  (Stark Industries, NSE)"]));
        let ticker = resolver(llm.clone()).resolve("Unknown Startup Inc").await;

        assert_eq!(ticker, "STARK.NS");
        assert_eq!(llm.calls(), 1);

        let request = llm.last_request().unwrap();
        assert_eq!(request.system.as_deref(), Some(RESOLVER_SYSTEM_PROMPT));
        assert_eq!(
            request.last_user_text(),
            Some("What is the stock ticker for Unknown Startup Inc?")
        );
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_model_failure_returns_empty() {
        let llm = Arc::new(ScriptedLlm::failing("connection reset"));
        let ticker = resolver(llm.clone()).resolve("Unknown Startup Inc").await;

        assert_eq!(ticker, "");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_company_is_unresolved() {
        let llm = Arc::new(ScriptedLlm::replying(["AAPL"]));
        assert_eq!(resolver(llm.clone()).resolve("   ").await, "");
        assert_eq!(llm.calls(), 0);
    }
}

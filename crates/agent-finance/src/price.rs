//! Latest price lookup with the exchange-suffix retry

use crate::error::Result;
use crate::ticker::normalize_ticker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// One provider answer for one symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteLookup {
    pub price: Option<f64>,
    pub currency: Option<String>,
}

/// A source of the latest traded price keyed by ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Look up the latest price for exactly `ticker`, without retries
    async fn lookup(&self, ticker: &str) -> Result<QuoteLookup>;
}

/// Latest price for the requested ticker
///
/// `price` is `None` when every attempt failed. It is never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub ticker: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
}

impl PriceQuote {
    pub fn unavailable(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            price: None,
            currency: None,
        }
    }
}

/// Fetches prices, retrying a bare ticker once on the configured exchange
pub struct PriceFetcher {
    provider: Arc<dyn QuoteProvider>,
    exchange_suffix: String,
}

impl PriceFetcher {
    pub fn new(provider: Arc<dyn QuoteProvider>, exchange_suffix: impl Into<String>) -> Self {
        Self {
            provider,
            exchange_suffix: exchange_suffix.into(),
        }
    }

    /// Fetch the latest price for `ticker`
    ///
    /// If the first attempt yields no price and the ticker has no market
    /// segment (`.`), one more attempt is made with the exchange suffix.
    /// The returned quote keeps the requested ticker either way.
    #[instrument(skip(self))]
    pub async fn fetch(&self, ticker: &str) -> PriceQuote {
        let ticker = normalize_ticker(ticker);

        let mut lookup = self.attempt(&ticker).await;
        if lookup.price.is_none() && !ticker.contains('.') {
            let suffixed = format!("{ticker}{}", self.exchange_suffix);
            debug!(%suffixed, "No price for bare ticker, retrying with exchange suffix");
            lookup = self.attempt(&suffixed).await;
        }

        PriceQuote {
            ticker,
            price: lookup.price,
            currency: lookup.currency,
        }
    }

    async fn attempt(&self, symbol: &str) -> QuoteLookup {
        match self.provider.lookup(symbol).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(%symbol, error = %e, "Price lookup failed");
                QuoteLookup::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinanceError;

    fn priced(price: f64, currency: &str) -> QuoteLookup {
        QuoteLookup {
            price: Some(price),
            currency: Some(currency.to_string()),
        }
    }

    #[tokio::test]
    async fn test_price_found_first_time() {
        let mut provider = MockQuoteProvider::new();
        provider
            .expect_lookup()
            .withf(|t| t == "AAPL")
            .times(1)
            .returning(|_| Ok(priced(150.0, "USD")));

        let quote = PriceFetcher::new(Arc::new(provider), ".NS").fetch("aapl").await;
        assert_eq!(
            quote,
            PriceQuote {
                ticker: "AAPL".to_string(),
                price: Some(150.0),
                currency: Some("USD".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_bare_ticker_retries_once_with_suffix() {
        let mut provider = MockQuoteProvider::new();
        provider
            .expect_lookup()
            .withf(|t| t == "RELIANCE")
            .times(1)
            .returning(|_| Ok(QuoteLookup::default()));
        provider
            .expect_lookup()
            .withf(|t| t == "RELIANCE.NS")
            .times(1)
            .returning(|_| Ok(priced(2900.5, "INR")));

        let quote = PriceFetcher::new(Arc::new(provider), ".NS").fetch("RELIANCE").await;
        assert_eq!(quote.ticker, "RELIANCE");
        assert_eq!(quote.price, Some(2900.5));
        assert_eq!(quote.currency.as_deref(), Some("INR"));
    }

    #[tokio::test]
    async fn test_retry_is_not_repeated() {
        let mut provider = MockQuoteProvider::new();
        provider
            .expect_lookup()
            .times(2)
            .returning(|_| Ok(QuoteLookup::default()));

        let quote = PriceFetcher::new(Arc::new(provider), ".NS").fetch("NOPE").await;
        assert_eq!(quote, PriceQuote::unavailable("NOPE"));
    }

    #[tokio::test]
    async fn test_dotted_ticker_never_retries() {
        let mut provider = MockQuoteProvider::new();
        provider
            .expect_lookup()
            .withf(|t| t == "INFY.NS")
            .times(1)
            .returning(|_| Ok(QuoteLookup::default()));

        let quote = PriceFetcher::new(Arc::new(provider), ".NS").fetch("INFY.NS").await;
        assert_eq!(quote.price, None);
    }

    #[tokio::test]
    async fn test_errors_become_missing_price() {
        let mut provider = MockQuoteProvider::new();
        provider
            .expect_lookup()
            .withf(|t| t == "AAPL")
            .times(1)
            .returning(|_| Err(FinanceError::ApiError("timed out".into())));
        provider
            .expect_lookup()
            .withf(|t| t == "AAPL.NS")
            .times(1)
            .returning(|_| Err(FinanceError::ApiError("404".into())));

        let quote = PriceFetcher::new(Arc::new(provider), ".NS").fetch("AAPL").await;
        assert_eq!(quote.price, None);
        assert_eq!(quote.currency, None);
    }
}

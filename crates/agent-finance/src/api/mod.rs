//! HTTP clients for the market data, price and news providers

pub mod fmp;
pub mod serper;
pub mod yahoo;

pub use fmp::FmpClient;
pub use serper::SerperClient;
pub use yahoo::YahooClient;

use crate::error::{FinanceError, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Append percent-encoded path segments to `base`
///
/// Tickers go in as whole segments, so `M&M.NS` or `BRK/B` cannot change the
/// route.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| FinanceError::ConfigError(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| FinanceError::ConfigError(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

mod common;

use agent_finance::{
    FmpClient, MarketDataFetcher, NewsFetcher, PriceFetcher, QuoteProvider, SerperClient,
    YahooClient,
};
use common::{read_fixture, serve_get};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fmp(server: &MockServer) -> FmpClient {
    FmpClient::new("test-key", server.base_url(), TIMEOUT).unwrap()
}

fn yahoo(server: &MockServer) -> YahooClient {
    YahooClient::new(server.base_url(), TIMEOUT).unwrap()
}

#[tokio::test]
async fn fmp_fundamentals_are_normalized() {
    let server = MockServer::start();

    let profile = server.mock(|when, then| {
        when.method(GET)
            .path("/profile/AAPL")
            .query_param("apikey", "test-key");
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("fmp_profile_AAPL.json"));
    });
    let income = server.mock(|when, then| {
        when.method(GET)
            .path("/income-statement/AAPL")
            .query_param("limit", "4")
            .query_param("apikey", "test-key");
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("fmp_income_statement_AAPL.json"));
    });
    serve_get(&server, "/ratios/AAPL", "fmp_ratios_AAPL.json");
    serve_get(&server, "/balance-sheet-statement/AAPL", "fmp_balance_sheet_AAPL.json");
    serve_get(&server, "/cash-flow-statement/AAPL", "fmp_cash_flow_AAPL.json");

    let fetcher = MarketDataFetcher::new(Arc::new(fmp(&server)));
    let metrics = fetcher.fetch(" aapl ").await;

    profile.assert();
    income.assert();
    assert_eq!(metrics.ticker, "AAPL");
    assert!(!metrics.is_degraded());
    assert_eq!(metrics.company_name.as_deref(), Some("Apple Inc."));
    assert_eq!(metrics.pe_ratio, Some(28.0));
    assert_eq!(metrics.roe, Some(1.6459));
    assert_eq!(metrics.profit_margin, Some(0.2397));
    assert_eq!(metrics.debt_to_equity, Some(1.87));
    assert_eq!(metrics.sector.as_deref(), Some("Technology"));
    assert_eq!(metrics.market_cap, Some(2.35e12));
    assert_eq!(metrics.currency.as_deref(), Some("USD"));
    assert_eq!(metrics.revenue, Some(391_035_000_000.0));
    assert_eq!(metrics.total_debt, Some(106_629_000_000.0));
    assert_eq!(metrics.free_cash_flow, Some(108_807_000_000.0));
}

#[tokio::test]
async fn fmp_error_mapping_only_blanks_its_section() {
    let server = MockServer::start();
    serve_get(&server, "/profile/AAPL", "fmp_error.json");
    serve_get(&server, "/ratios/AAPL", "fmp_ratios_AAPL.json");
    serve_get(&server, "/income-statement/AAPL", "fmp_income_statement_AAPL.json");
    serve_get(&server, "/balance-sheet-statement/AAPL", "fmp_balance_sheet_AAPL.json");
    serve_get(&server, "/cash-flow-statement/AAPL", "fmp_cash_flow_AAPL.json");

    let metrics = MarketDataFetcher::new(Arc::new(fmp(&server)))
        .fetch("AAPL")
        .await;

    assert!(!metrics.is_degraded());
    assert_eq!(metrics.sector, None);
    assert_eq!(metrics.company_name, None);
    assert_eq!(metrics.pe_ratio, Some(28.0));
}

#[tokio::test]
async fn fmp_error_status_only_blanks_its_section() {
    let server = MockServer::start();
    serve_get(&server, "/profile/AAPL", "fmp_profile_AAPL.json");
    let ratios = server.mock(|when, then| {
        when.method(GET).path("/ratios/AAPL");
        then.status(403)
            .header("content-type", "application/json")
            .json_body(json!({
                "Error Message": "Exclusive Endpoint : This endpoint is not available under your current subscription"
            }));
    });
    serve_get(&server, "/income-statement/AAPL", "fmp_income_statement_AAPL.json");
    serve_get(&server, "/balance-sheet-statement/AAPL", "fmp_balance_sheet_AAPL.json");
    serve_get(&server, "/cash-flow-statement/AAPL", "fmp_cash_flow_AAPL.json");

    let metrics = MarketDataFetcher::new(Arc::new(fmp(&server)))
        .fetch("AAPL")
        .await;

    ratios.assert();
    assert!(!metrics.is_degraded());
    assert_eq!(metrics.sector.as_deref(), Some("Technology"));
    assert_eq!(metrics.company_name.as_deref(), Some("Apple Inc."));
    assert_eq!(metrics.revenue, Some(391_035_000_000.0));
    assert_eq!(metrics.free_cash_flow, Some(108_807_000_000.0));
    assert_eq!(metrics.roe, None);
}

#[tokio::test]
async fn fmp_non_json_failure_degrades_metrics() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/profile/AAPL");
        then.status(502).body("Bad Gateway");
    });

    let metrics = MarketDataFetcher::new(Arc::new(fmp(&server)))
        .fetch("AAPL")
        .await;

    assert!(metrics.is_degraded());
    assert_eq!(metrics.ticker, "AAPL");
    assert_eq!(metrics.pe_ratio, None);
}

#[tokio::test]
async fn fmp_quote_reads_price_from_list_only() {
    let server = MockServer::start();
    serve_get(&server, "/quote/AAPL", "fmp_quote_AAPL.json");
    serve_get(&server, "/quote/BAD", "fmp_error.json");
    let client = fmp(&server);

    let lookup = client.lookup("AAPL").await.unwrap();
    assert_eq!(lookup.price, Some(150.0));
    assert_eq!(lookup.currency, None);

    assert_eq!(client.lookup("BAD").await.unwrap().price, None);
}

#[tokio::test]
async fn yahoo_chart_gives_price_and_currency() {
    let server = MockServer::start();
    let chart = server.mock(|when, then| {
        when.method(GET)
            .path("/v8/finance/chart/AAPL")
            .query_param("interval", "1d")
            .query_param("range", "1d")
            .header("user-agent", "Mozilla/5.0");
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("yahoo_chart_AAPL.json"));
    });

    let quote = PriceFetcher::new(Arc::new(yahoo(&server)), ".NS")
        .fetch("AAPL")
        .await;

    chart.assert();
    assert_eq!(quote.ticker, "AAPL");
    assert_eq!(quote.price, Some(150.0));
    assert_eq!(quote.currency.as_deref(), Some("USD"));
}

#[tokio::test]
async fn yahoo_bare_ticker_retries_on_exchange() {
    let server = MockServer::start();
    let bare = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/INFY");
        then.status(404)
            .header("content-type", "application/json")
            .body(read_fixture("yahoo_chart_not_found.json"));
    });
    let suffixed = serve_get(&server, "/v8/finance/chart/INFY.NS", "yahoo_chart_INFY_NS.json");

    let quote = PriceFetcher::new(Arc::new(yahoo(&server)), ".NS")
        .fetch("infy")
        .await;

    bare.assert();
    suffixed.assert();
    assert_eq!(quote.ticker, "INFY");
    assert_eq!(quote.price, Some(1875.4));
    assert_eq!(quote.currency.as_deref(), Some("INR"));
}

#[tokio::test]
async fn yahoo_quote_summary_fundamentals() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v10/finance/quoteSummary/AAPL")
            .query_param(
                "modules",
                "summaryDetail,financialData,defaultKeyStatistics,assetProfile,price",
            );
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("yahoo_quote_summary_AAPL.json"));
    });

    let metrics = MarketDataFetcher::new(Arc::new(yahoo(&server)))
        .fetch("AAPL")
        .await;

    assert!(!metrics.is_degraded());
    assert_eq!(metrics.company_name.as_deref(), Some("Apple Inc."));
    assert_eq!(metrics.pe_ratio, Some(28.0));
    assert_eq!(metrics.debt_to_equity, Some(1.87));
    assert_eq!(metrics.net_income, Some(93_736_000_000.0));
    assert_eq!(metrics.market_cap, Some(2.35e12));
}

#[tokio::test]
async fn serper_news_is_capped_in_order() {
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(POST)
            .path("/news")
            .header("x-api-key", "serper-key")
            .json_body(json!({ "q": "Apple latest stock news earnings updates" }));
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("serper_news_apple.json"));
    });

    let client =
        SerperClient::new(Some("serper-key".to_string()), server.base_url(), TIMEOUT, 60).unwrap();
    let digest = NewsFetcher::new(Arc::new(client), 3).fetch("Apple").await;

    search.assert();
    assert!(!digest.is_degraded());
    assert_eq!(digest.company, "Apple");
    let titles: Vec<_> = digest
        .items
        .iter()
        .filter_map(|item| item.title.as_deref())
        .collect();
    assert_eq!(
        titles,
        [
            "Apple beats quarterly revenue estimates",
            "Apple expands buyback program",
            "Services revenue hits record",
        ]
    );
    assert_eq!(digest.items[0].source.as_deref(), Some("Reuters"));
}

#[tokio::test]
async fn serper_failure_degrades_digest() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/news");
        then.status(500).body("upstream error");
    });

    let client =
        SerperClient::new(Some("serper-key".to_string()), server.base_url(), TIMEOUT, 60).unwrap();
    let digest = NewsFetcher::new(Arc::new(client), 3).fetch("Apple").await;

    assert!(digest.is_degraded());
    assert!(digest.is_empty());
    assert_eq!(digest.company, "Apple");
}

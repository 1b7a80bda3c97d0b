//! Analysis prompt construction
//!
//! Templates are organized into:
//! - `system`: the fixed instruction enumerating the output schema
//! - `user`: the per-run message carrying metrics, price and news
//!
//! Every absent value is rendered as `N/A` before it reaches a template, so
//! the model always sees a complete form.

mod system;
mod user;

pub use system::{ANALYSIS_SYSTEM, ANALYSIS_SYSTEM_TEMPLATE};
pub use user::{ANALYSIS_USER, ANALYSIS_USER_TEMPLATE};

use crate::config::DecisionSchema;
use crate::error::Result;
use crate::market_data::MarketMetrics;
use crate::news::{NewsDigest, NewsItem};
use crate::price::PriceQuote;
use minijinja::{Environment, context};
use serde::Serialize;

const NOT_AVAILABLE: &str = "N/A";
const DESCRIPTION_LIMIT: usize = 280;
const SNIPPET_LIMIT: usize = 200;
const SUSTAINABILITY_LIMIT: usize = 600;

/// The two-part prompt for one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisPrompt {
    system: String,
    user: String,
}

impl AnalysisPrompt {
    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn into_parts(self) -> (String, String) {
        (self.system, self.user)
    }
}

/// Renders [`AnalysisPrompt`]s from normalized pipeline records
pub struct PromptBuilder {
    env: Environment<'static>,
    schema: DecisionSchema,
    news_limit: usize,
    max_reasons: usize,
}

impl PromptBuilder {
    /// Create a builder, compiling both templates up front
    pub fn new(schema: DecisionSchema, news_limit: usize, max_reasons: usize) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(ANALYSIS_SYSTEM, ANALYSIS_SYSTEM_TEMPLATE)?;
        env.add_template(ANALYSIS_USER, ANALYSIS_USER_TEMPLATE)?;

        Ok(Self {
            env,
            schema,
            news_limit,
            max_reasons,
        })
    }

    /// Build the prompt for `company`
    ///
    /// At most `news_limit` news items are included, in digest order.
    /// `sustainability` snippets are joined with `"; "`.
    pub fn build(
        &self,
        company: &str,
        metrics: &MarketMetrics,
        quote: &PriceQuote,
        news: &NewsDigest,
        sustainability: Option<&NewsDigest>,
    ) -> Result<AnalysisPrompt> {
        let price = format_amount(quote.price);

        let system = self.env.get_template(ANALYSIS_SYSTEM)?.render(context! {
            price => &price,
            max_reasons => self.max_reasons,
            green_score => self.schema == DecisionSchema::GreenScore,
        })?;

        let news_lines: Vec<String> = news
            .items
            .iter()
            .take(self.news_limit)
            .map(news_line)
            .filter(|line| !line.is_empty())
            .collect();

        let user = self.env.get_template(ANALYSIS_USER)?.render(context! {
            company => company,
            ticker => &quote.ticker,
            price => &price,
            currency => quote.currency.as_deref(),
            pe => format_amount(metrics.pe_ratio),
            roe => format_percent(metrics.roe),
            margin => format_percent(metrics.profit_margin),
            debt => format_amount(metrics.debt_to_equity),
            sector => metrics.sector.as_deref().unwrap_or(NOT_AVAILABLE),
            market_cap => format_large(metrics.market_cap),
            description => metrics
                .description
                .as_deref()
                .map_or_else(|| NOT_AVAILABLE.to_string(), |d| truncate(d, DESCRIPTION_LIMIT)),
            news => news_lines,
            sustainability => sustainability.map(sustainability_text),
        })?;

        Ok(AnalysisPrompt { system, user })
    }
}

fn format_amount(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}"))
}

fn format_percent(fraction: Option<f64>) -> String {
    fraction.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |v| format!("{:.2}%", v * 100.0),
    )
}

fn format_large(value: Option<f64>) -> String {
    let Some(v) = value else {
        return NOT_AVAILABLE.to_string();
    };
    let magnitude = v.abs();
    if magnitude >= 1e12 {
        format!("{:.2}T", v / 1e12)
    } else if magnitude >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else if magnitude >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else {
        format!("{v:.0}")
    }
}

/// Cut to `limit` characters on a char boundary, marking the cut
fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn news_line(item: &NewsItem) -> String {
    let attribution: Vec<&str> = [item.source.as_deref(), item.date.as_deref()]
        .into_iter()
        .flatten()
        .collect();

    let mut line = item.title.as_deref().unwrap_or_default().trim().to_string();
    if !attribution.is_empty() {
        line.push_str(&format!(" ({})", attribution.join(", ")));
    }
    if let Some(snippet) = item.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
        if !line.is_empty() {
            line.push_str(": ");
        }
        line.push_str(&truncate(snippet, SNIPPET_LIMIT));
    }
    line
}

fn sustainability_text(digest: &NewsDigest) -> String {
    let joined = digest
        .items
        .iter()
        .filter_map(|item| item.snippet.as_deref().or(item.title.as_deref()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    if joined.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        truncate(&joined, SUSTAINABILITY_LIMIT)
    }
}

//! Decision extraction from free-form model output
//!
//! Models wrap JSON in prose and code fences. [`extract_json_object`] isolates
//! the outermost brace-bounded span, [`parse_model_output`] turns it into a
//! [`ModelOutput`], and [`DecisionParser`] always produces a [`Decision`],
//! falling back to a fixed HOLD record when the reply is unusable.

use crate::config::DecisionSchema;
use crate::price::PriceQuote;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Trading recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
}

/// Risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "HOLD" => Ok(Self::Hold),
            "SELL" => Ok(Self::Sell),
            _ => Err(format!("expected BUY, HOLD or SELL, got {s:?}")),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("expected LOW, MEDIUM or HIGH, got {s:?}")),
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
        })
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        })
    }
}

fn case_insensitive<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

// A malformed score drops the score, not the whole decision.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(crate::market_data::coerce_number)
        .map(|score| score.clamp(0.0, 100.0)))
}

/// The object the model is asked to emit
///
/// Extra keys, including the model's own price echo, are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelDecision {
    #[serde(deserialize_with = "case_insensitive")]
    pub decision: Recommendation,
    #[serde(deserialize_with = "case_insensitive")]
    pub risk_level: RiskLevel,
    pub time_horizon: String,
    pub current_financial_condition: String,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub key_metrics_considered: Vec<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub green_score: Option<f64>,
    #[serde(default)]
    pub green_summary: Option<String>,
}

/// Why the fallback decision was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No `{ ... }` span in the reply
    NoJsonFound,
    /// A span was found but did not match the schema
    InvalidJson(String),
}

impl FallbackReason {
    fn condition(&self) -> &'static str {
        match self {
            Self::NoJsonFound => "LLM response did not contain valid JSON",
            Self::InvalidJson(_) => "Unable to parse LLM response",
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::NoJsonFound => "LLM response format error",
            Self::InvalidJson(_) => "JSON parsing failed",
        }
    }
}

/// Result of reading one model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Parsed(ModelDecision),
    Fallback(FallbackReason),
}

/// Span from the first `{` to the last `}`, inclusive
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Extract and strictly parse the decision object from `raw`
pub fn parse_model_output(raw: &str) -> ModelOutput {
    let Some(json) = extract_json_object(raw) else {
        return ModelOutput::Fallback(FallbackReason::NoJsonFound);
    };

    match serde_json::from_str::<ModelDecision>(json) {
        Ok(parsed) => ModelOutput::Parsed(parsed),
        Err(e) => ModelOutput::Fallback(FallbackReason::InvalidJson(e.to_string())),
    }
}

/// Validated decision record returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: Recommendation,
    pub current_stock_price: Option<f64>,
    pub risk_level: RiskLevel,
    pub time_horizon: String,
    pub current_financial_condition: String,
    pub reasons: Vec<String>,
    pub key_metrics_considered: Vec<String>,
    pub company: String,
    pub ticker: String,
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub green_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub green_summary: Option<String>,
}

/// Turns model text into a [`Decision`], never failing
#[derive(Debug, Clone)]
pub struct DecisionParser {
    max_reasons: usize,
    schema: DecisionSchema,
}

impl DecisionParser {
    pub fn new(max_reasons: usize, schema: DecisionSchema) -> Self {
        Self {
            max_reasons,
            schema,
        }
    }

    /// Parse `raw` and attach the requested company/ticker and fetched price
    ///
    /// Price and currency always come from `quote`, whatever the model said.
    pub fn parse(&self, raw: &str, company: &str, ticker: &str, quote: &PriceQuote) -> Decision {
        let mut decision = match parse_model_output(raw) {
            ModelOutput::Parsed(parsed) => {
                debug!(decision = %parsed.decision, "Parsed model decision");
                self.accept(parsed)
            }
            ModelOutput::Fallback(reason) => {
                match &reason {
                    FallbackReason::NoJsonFound => {
                        warn!(%ticker, "Model reply contained no JSON object");
                    }
                    FallbackReason::InvalidJson(detail) => {
                        warn!(%ticker, %detail, "Model reply JSON did not match the schema");
                    }
                }
                Self::fallback(&reason)
            }
        };

        decision.company = company.to_string();
        decision.ticker = ticker.to_string();
        decision.current_stock_price = quote.price;
        decision.currency.clone_from(&quote.currency);
        decision
    }

    fn accept(&self, parsed: ModelDecision) -> Decision {
        let mut reasons = parsed.reasons;
        reasons.truncate(self.max_reasons);

        let (green_score, green_summary) = match self.schema {
            DecisionSchema::GreenScore => (parsed.green_score, parsed.green_summary),
            DecisionSchema::Standard => (None, None),
        };

        Decision {
            decision: parsed.decision,
            current_stock_price: None,
            risk_level: parsed.risk_level,
            time_horizon: parsed.time_horizon.trim().to_string(),
            current_financial_condition: parsed.current_financial_condition,
            reasons,
            key_metrics_considered: parsed.key_metrics_considered,
            company: String::new(),
            ticker: String::new(),
            currency: None,
            green_score,
            green_summary,
        }
    }

    fn fallback(reason: &FallbackReason) -> Decision {
        Decision {
            decision: Recommendation::Hold,
            current_stock_price: None,
            risk_level: RiskLevel::Medium,
            time_horizon: "MEDIUM_TERM".to_string(),
            current_financial_condition: reason.condition().to_string(),
            reasons: vec![reason.reason().to_string()],
            key_metrics_considered: Vec::new(),
            company: String::new(),
            ticker: String::new(),
            currency: None,
            green_score: None,
            green_summary: None,
        }
    }
}

//! System instruction templates for the analysis call

/// Template name for the system instruction
pub const ANALYSIS_SYSTEM: &str = "analysis.system";

/// Decision schema the model must answer with
///
/// `green_score` adds the sustainability fields.
pub const ANALYSIS_SYSTEM_TEMPLATE: &str = r#"You are a stock analyst. Analyze the data and respond with ONLY valid JSON (no markdown, no extra text):
{
  "decision": "BUY|HOLD|SELL",
  "current_stock_price": "{{ price }}",
  "risk_level": "LOW|MEDIUM|HIGH",
  "time_horizon": "SHORT_TERM|MEDIUM_TERM|LONG_TERM",
  "current_financial_condition": "brief summary",
  "reasons": ["reason1", "reason2", "reason3"],
  "key_metrics_considered": ["metric1", "metric2"]{% if green_score %},
  "green_score": 0-100,
  "green_summary": "brief assessment of environmental and sustainability practices"{% endif %}
}
Give at most {{ max_reasons }} reasons. Treat any field marked N/A as unavailable.{% if green_score %}
Base green_score on the sustainability context; 100 is best in class.{% endif %}"#;

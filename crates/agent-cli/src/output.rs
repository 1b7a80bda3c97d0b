//! Table rendering for analysis outcomes

use agent_finance::{AnalysisOutcome, Decision};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);
    table
}

fn price_cell(decision: &Decision) -> String {
    match (decision.current_stock_price, decision.currency.as_deref()) {
        (Some(price), Some(currency)) => format!("{price:.2} {currency}"),
        (Some(price), None) => format!("{price:.2}"),
        (None, _) => "N/A".to_string(),
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-column table of either the decision or the failure record
pub fn outcome_table(outcome: &AnalysisOutcome) -> Table {
    let mut table = new_table();

    match outcome {
        AnalysisOutcome::Decision(decision) => {
            table
                .add_row(vec!["Company".to_string(), decision.company.clone()])
                .add_row(vec!["Ticker".to_string(), decision.ticker.clone()])
                .add_row(vec!["Price".to_string(), price_cell(decision)])
                .add_row(vec!["Decision".to_string(), decision.decision.to_string()])
                .add_row(vec!["Risk".to_string(), decision.risk_level.to_string()])
                .add_row(vec!["Horizon".to_string(), decision.time_horizon.clone()])
                .add_row(vec![
                    "Financial condition".to_string(),
                    decision.current_financial_condition.clone(),
                ])
                .add_row(vec!["Reasons".to_string(), numbered(&decision.reasons)])
                .add_row(vec![
                    "Metrics considered".to_string(),
                    decision.key_metrics_considered.join(", "),
                ]);

            if let Some(score) = decision.green_score {
                table.add_row(vec!["Green score".to_string(), format!("{score:.0}")]);
            }
            if let Some(summary) = &decision.green_summary {
                table.add_row(vec!["Green summary".to_string(), summary.clone()]);
            }
        }
        AnalysisOutcome::Failure(failure) => {
            table
                .add_row(vec!["Company".to_string(), failure.company.clone()])
                .add_row(vec!["Ticker".to_string(), failure.ticker.clone()])
                .add_row(vec!["Error".to_string(), failure.error.clone()]);
        }
    }

    table
}

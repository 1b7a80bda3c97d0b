//! Financial analysis CLI
//!
//! # Usage
//!
//! ```bash
//! # Keys are read from the environment or a .env file
//! export GOOGLE_API_KEY="..."
//! export FMP_API_KEY="..."
//! export SERPER_API_KEY="..."
//!
//! fin-agent analyze --company "Infosys"
//! fin-agent analyze --company "Apple" --ticker AAPL --format table
//! fin-agent resolve --company "Tata Consultancy Services"
//! ```
//!
//! `LLM_PROVIDER=openai` switches to an OpenAI-compatible endpoint
//! (`OPENAI_API_KEY`, `OPENAI_API_BASE`).

mod output;

use agent_finance::pipeline::UNRESOLVED_TICKER;
use agent_finance::{
    AnalysisRequest, FinanceConfig, FinancialAnalysisPipeline, TickerResolver, TickerTable,
};
use agent_llm::LLMProvider;
use agent_llm::providers::{GeminiProvider, OpenAIProvider};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fin-agent")]
#[command(about = "Company name in, BUY/HOLD/SELL decision out", long_about = None)]
struct Cli {
    /// Override the model from LLM_MODEL
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis for one company
    Analyze {
        /// Company name, e.g. "Infosys"
        #[arg(short, long)]
        company: String,

        /// Skip resolution and use this ticker
        #[arg(short, long)]
        ticker: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Resolve a company name to its ticker
    Resolve {
        #[arg(short, long)]
        company: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn llm_provider() -> anyhow::Result<Arc<dyn LLMProvider>> {
    let name = agent_utils::env_or("LLM_PROVIDER", "gemini").to_ascii_lowercase();
    let provider: Arc<dyn LLMProvider> = match name.as_str() {
        "gemini" => Arc::new(GeminiProvider::from_env().context("configuring Gemini")?),
        "openai" => Arc::new(OpenAIProvider::from_env().context("configuring OpenAI")?),
        other => bail!("unknown LLM_PROVIDER {other:?}, expected gemini or openai"),
    };
    Ok(provider)
}

/// Model and temperature for `resolve`, which needs no data provider keys
fn resolver_settings(model: Option<String>) -> (String, f32) {
    let defaults = FinanceConfig::default();
    let model = model
        .or_else(|| agent_utils::env_var("LLM_MODEL"))
        .unwrap_or(defaults.model);
    (model, defaults.resolver_temperature)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    agent_utils::init_tracing("warn,agent_finance=info");
    agent_utils::load_dotenv();

    let cli = Cli::parse();
    let llm = llm_provider()?;

    match cli.command {
        Commands::Analyze {
            company,
            ticker,
            format,
        } => {
            let mut config = FinanceConfig::from_env()?;
            if let Some(model) = cli.model {
                config.model = model;
            }
            info!(provider = llm.name(), model = %config.model, "Starting analysis");

            let pipeline = FinancialAnalysisPipeline::builder()
                .config(config)
                .llm(llm)
                .build()?;

            let mut request = AnalysisRequest::new(company);
            if let Some(ticker) = ticker {
                request = request.with_ticker(ticker);
            }

            let outcome = pipeline.analyze(request).await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                OutputFormat::Table => println!("{}", output::outcome_table(&outcome)),
            }

            Ok(if outcome.is_decision() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Resolve { company } => {
            let (model, temperature) = resolver_settings(cli.model);
            info!(provider = llm.name(), %model, "Resolving ticker");
            let resolver = TickerResolver::new(TickerTable::well_known(), llm, &model, temperature);

            let ticker = resolver.resolve(&company).await;
            if ticker.is_empty() {
                eprintln!("{company}: {UNRESOLVED_TICKER}");
                return Ok(ExitCode::FAILURE);
            }
            println!("{ticker}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

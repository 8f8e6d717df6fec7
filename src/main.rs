//! Stock Analyst - a supervisor-led team of LLM agents for stock questions
//!
//! A researcher, a stock analyzer and a chart generator answer questions
//! like "Should I buy Apple? Please analyze AAPL." in an interactive
//! terminal session, and a newsletter pipeline turns a keyword into an
//! edited newsletter.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, analysis failure, etc.)

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod llm;
mod market;
mod models;
mod newsletter;
mod report;
mod ui;

use anyhow::{Context, Result};
use cli::{Args, Command};
use config::{Config, CONFIG_FILE_NAME};
use llm::{HttpChatModel, LlmConfig};
use market::{LiveMarketData, TavilySearch};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use ui::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if args.command == Command::InitConfig {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Stock Analyst v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .stock-analyst.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, data sources, language and reports.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Build the session from configuration and dispatch the command.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let model = HttpChatModel::new(LlmConfig::from_model_config(&config.model))
        .context("Failed to initialize the chat model")?;
    let market = LiveMarketData::from_config(&config.data);
    let search = TavilySearch::from_env(&config.data.search_api_key_env)
        .context("Failed to initialize web search")?;

    if !args.quiet {
        println!("🤖 Model: {} ({:?})", config.model.name, config.model.provider);
        println!("   Endpoint: {}", config.model.base_url);
        println!("   Language: {}", config.general.language);
    }

    let mut session = Session::new(
        config,
        Arc::new(model),
        Arc::new(market),
        Arc::new(search),
        args.quiet,
    );

    match args.command {
        Command::Run => session.run_interactive().await,
        Command::Analyze { question } => session.analyze(&question).await.map(|_| ()),
        Command::Newsletter { keyword } => session.newsletter(&keyword).await.map(|_| ()),
        Command::InitConfig => Ok(()),
    }
}

#![allow(clippy::print_stdout, reason = "CLI prints results to stdout")]

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smart-query")]
#[command(about = "Answer business questions by adapting verified SQL queries", long_about = None)]
struct Cli {
    /// Load the verified query library from a JSON file instead of PostgreSQL
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: questions on stdin, events as JSON lines on stdout
    Chat,
    /// Answer a single question and exit
    Ask {
        question: String,
        /// Go straight to matching without checking for ambiguity
        #[arg(long)]
        no_clarify: bool,
    },
    /// Show the verified queries a question matches
    Match { question: String },
    /// Audit the verified query library
    Check,
}

fn get_api_key() -> Result<String> {
    std::env::var("SMART_QUERY_LLM_API_KEY")
        .map_err(|_| anyhow::anyhow!("SMART_QUERY_LLM_API_KEY environment variable must be set"))
}

fn get_base_url() -> String {
    std::env::var("SMART_QUERY_LLM_URL")
        .unwrap_or_else(|_| smart_query_llm::DEFAULT_BASE_URL.to_owned())
}

fn get_database_url(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{var} environment variable must be set"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let catalog = cli.catalog.as_deref();

    match cli.command {
        Commands::Chat => commands::chat::run_chat(catalog).await?,
        Commands::Ask { question, no_clarify } => {
            commands::chat::run_ask(catalog, question, !no_clarify).await?;
        },
        Commands::Match { question } => commands::inspect::run_match(catalog, &question).await?,
        Commands::Check => commands::inspect::run_check(catalog).await?,
    }

    Ok(())
}

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use twinserve_core::config::{self, Config};
use twinserve_core::service::http::{serve, AppState};

#[derive(Parser)]
#[command(
    name = "twinserve",
    about = "twinserve - digital-twin chat and analytics server",
    version = twinserve_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Initialize twinserve configuration
    Init,
    /// Print a summary of recorded analytics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("twinserve=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(port, host).await?,
        Commands::Init => cmd_init()?,
        Commands::Stats => cmd_stats()?,
    }

    Ok(())
}

async fn cmd_serve(port: Option<u16>, host: Option<String>) -> Result<()> {
    let mut cfg = config::load_config_from_env();
    if let Some(port) = port {
        cfg.server.port = port;
    }
    if let Some(host) = host {
        cfg.server.host = host;
    }

    if cfg.completion.api_key.is_empty() {
        eprintln!("Warning: no completion API key configured, /api/chat will be unavailable.");
        eprintln!("Set OPENAI_API_KEY or add it to ~/.twinserve/config.json");
    }

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let state = Arc::new(AppState::from_config(cfg));

    println!("Starting twinserve on {}...", addr);
    serve(&addr, state).await
}

fn cmd_init() -> Result<()> {
    let config_path = config::get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Delete it first to re-initialize.");
        return Ok(());
    }

    let cfg = Config::default();
    config::save_config(&cfg, None)?;
    println!("Created config at {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Add your completion API key to {}", config_path.display());
    println!("  2. Optionally set speech/avatar vendor keys for voice and video");
    println!("  3. Run: twinserve serve");
    Ok(())
}

fn cmd_stats() -> Result<()> {
    use twinserve_core::analytics::store::{AnalyticsStore, FileAnalyticsStore};

    let cfg = config::load_config_from_env();
    let path = cfg.analytics_path();
    let store = FileAnalyticsStore::new(path.clone());
    let data = store.load();

    println!("Analytics ({})\n", path.display());
    println!("  Total visits:    {}", data.summary.total_visits);
    println!("  Total messages:  {}", data.summary.total_messages);
    println!("  Unique sessions: {}", data.summary.unique_sessions);
    println!("  Events in log:   {}", data.events.len());

    if !data.summary.top_topics.is_empty() {
        println!("\nTop topics:");
        for topic in data.summary.top_topics.iter().take(10) {
            println!("  {:<25} {}", topic.topic, topic.count);
        }
    }

    if !data.summary.top_questions.is_empty() {
        println!("\nTop questions:");
        for q in data.summary.top_questions.iter().take(10) {
            println!("  ({:>3}) {}", q.count, q.question);
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use spotbot::api::BinanceClient;
use spotbot::audit::{AuditLogger, TracingAuditLogger};
use spotbot::config::Settings;
use spotbot::execution::PairCycleRunner;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "spotbot", about = "Signal-driven spot trading agent")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run a single pass over all pairs and exit
    #[arg(long)]
    once: bool,

    /// Run one task per pair instead of a sequential loop
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    if settings.exchange.credentials.api_key.is_empty() {
        anyhow::bail!("BINANCE_API_KEY / BINANCE_API_SECRET not found in environment");
    }

    tracing::info!(
        "🚀 spotbot starting - {} pairs on {}",
        settings.pairs.len(),
        settings.exchange.base_url
    );

    let transport =
        Arc::new(BinanceClient::new(&settings.exchange).context("Failed to build HTTP client")?);
    let audit: Arc<dyn AuditLogger> = Arc::new(TracingAuditLogger);
    let concurrent = cli.concurrent || settings.runner.concurrent;

    let runner = Arc::new(PairCycleRunner::new(settings, transport, audit.clone()));
    runner.log_startup().await;
    audit.action("START", "Trading agent started");

    if cli.once {
        let results = runner.run_pass(&mut HashMap::new()).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!("Single pass complete: {} pairs, {} failed", results.len(), failed);
        return Ok(());
    }

    tokio::select! {
        _ = async {
            if concurrent {
                runner.clone().run_concurrent().await
            } else {
                runner.run_forever().await
            }
        } => {
            tracing::warn!("Trading loop exited");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Shutdown signal received");
        }
    }

    audit.action("STOP", "Trading agent stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spotbot=info,audit=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

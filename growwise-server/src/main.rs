use clap::Parser;
use growwise_core::GrowConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use growwise_server::http;
use growwise_server::router::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "growwise.toml")]
    config: String,

    /// Check the store connection and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match GrowConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins; otherwise the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store = match growwise_core::store::open_store(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.ping().await {
            Ok(v) => println!("✅ {} store connected: {}", store.backend(), v),
            Err(e) => {
                println!("❌ {} store check failed: {}", store.backend(), e);
                std::process::exit(1);
            }
        }
        println!("✅ GrowWise health check passed");
        return Ok(());
    }

    let state = AppState::new(config, store)?;
    if let Some(report) = state.market.ensure_seeded().await? {
        tracing::info!(counts = ?report.counts, "Seeded empty market price table");
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}

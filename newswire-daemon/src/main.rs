//! Newswire Daemon
//!
//! Polls the configured news feeds on a fixed interval and keeps a bounded,
//! deduplicated RSS document of the newest stories.

use std::sync::Arc;

use anyhow::Context;
use newswire_core::NewswireConfig;
use newswire_embedding::SimilarityOracle;
use newswire_services::Scheduler;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,newswire_daemon=debug")),
        )
        .init();

    info!("Starting Newswire");

    let config = NewswireConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Loaded configuration: {} feeds, store {} (max {} items), {:?} similarity",
        config.feeds.len(),
        config.store_path,
        config.max_items,
        config.similarity.strategy
    );

    // OPENAI_API_KEY is only needed for semantic similarity
    let oracle = SimilarityOracle::from_config(
        &config.similarity,
        std::env::var("OPENAI_API_KEY").ok(),
        std::env::var("OPENAI_BASE_URL").ok(),
    )
    .context("Failed to initialize similarity oracle")?;

    // Refuse to start rather than let duplicates through
    oracle
        .probe()
        .await
        .context("Similarity oracle is unavailable")?;

    let mut scheduler = Scheduler::from_config(&config, Arc::new(oracle));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        if shutdown_tx.send(true).is_err() {
            warn!("Scheduler already stopped");
        }
    });

    if let Err(e) = scheduler.run(shutdown_rx).await {
        error!("Scheduler stopped on a fatal error: {}", e);
        return Err(e.into());
    }

    info!("Newswire stopped");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

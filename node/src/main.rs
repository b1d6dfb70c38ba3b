// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally Ledger Node
//!
//! Entry point for the `tally-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the store and serves the ledger over HTTP.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — open the store and serve the API and metrics
//! - `init`    — create the data directory and the ledger's global counters
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use tally_protocol::crypto::DigestAlgorithm;
use tally_protocol::storage::{LedgerStore, MemoryStore, SledStore};
use tally_protocol::{Ledger, LedgerConfig};

use cli::{Commands, StoreKind, TallyNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TallyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: store, ledger, API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_filter, args.log_format);

    let config = ledger_config(&args.hash_algorithms)?;
    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        store = ?args.store,
        data_dir = %args.data_dir.display(),
        hashes = ?config.valid_hashes,
        "starting tally-node"
    );

    // --- Store ---
    let (store, sled): (Arc<dyn LedgerStore>, Option<Arc<SledStore>>) = match args.store {
        StoreKind::Sled => {
            let db = Arc::new(open_sled(&args.data_dir)?);
            (db.clone() as Arc<dyn LedgerStore>, Some(db))
        }
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; state is lost on exit");
            (Arc::new(MemoryStore::new()) as Arc<dyn LedgerStore>, None)
        }
    };

    // --- Ledger ---
    let ledger = Ledger::new(store, config);
    if ledger
        .initialize()
        .await
        .context("failed to initialize ledger counters")?
    {
        tracing::info!("fresh ledger initialized");
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        ledger,
        metrics: Arc::clone(&node_metrics),
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            tally_protocol::config::PROTOCOL_VERSION,
        ),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Some(db) = sled {
        let bytes = db.flush().await.context("failed to flush store")?;
        tracing::info!(bytes, "store flushed");
    }
    tracing::info!("tally-node stopped");
    Ok(())
}

/// Creates the data directory, opens the store and writes the global
/// counters. Safe to run against an existing directory.
async fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("tally_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    let db = Arc::new(open_sled(data_dir)?);
    let ledger = Ledger::new(Arc::clone(&db), LedgerConfig::default());
    let created = ledger
        .initialize()
        .await
        .context("failed to initialize ledger counters")?;
    db.flush().await.context("failed to flush store")?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Database       : {}", data_dir.join("db").display());
    println!(
        "  Counters       : {}",
        if created { "created" } else { "already present" }
    );

    Ok(())
}

/// Open (creating if needed) the sled database under `<data_dir>/db`.
fn open_sled(data_dir: &Path) -> Result<SledStore> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = SledStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), documents = db.len(), "database opened");
    Ok(db)
}

/// Build the ledger configuration from the `--hash-algorithms` list.
fn ledger_config(hash_algorithms: &[String]) -> Result<LedgerConfig> {
    let hashes = hash_algorithms
        .iter()
        .map(|name| name.trim().parse::<DigestAlgorithm>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid --hash-algorithms")?;
    Ok(LedgerConfig::default().with_valid_hashes(hashes))
}

/// Prints version information to stdout.
fn print_version() {
    println!("tally-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", tally_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_algorithm_flags_parse() {
        let config = ledger_config(&["sha512".into()]).unwrap();
        assert!(config.accepts_digest(DigestAlgorithm::Sha512));
        assert!(config.accepts_digest(DigestAlgorithm::Sha256));

        assert!(ledger_config(&["md5".into()]).is_err());
    }

    #[tokio::test]
    async fn init_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(open_sled(dir.path()).unwrap());
        let ledger = Ledger::new(Arc::clone(&db), LedgerConfig::default());
        assert!(ledger.initialize().await.unwrap());
        db.flush().await.unwrap();
        drop(ledger);
        drop(db);

        let db = Arc::new(open_sled(dir.path()).unwrap());
        let ledger = Ledger::new(db, LedgerConfig::default());
        assert!(!ledger.initialize().await.unwrap());
    }
}

//! Theobroma - traceability and certification backend for cacao supply chains

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use theobroma::{
    config::Args,
    db::MongoClient,
    repo::{memory::memory_repositories, mongo::mongo_repositories, Repositories},
    store::{HttpSnapshotStore, MemorySnapshotStore, SnapshotStore},
    verifier::Ed25519Verifier,
    CertificationService, PhaseLedger, ReportAggregator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("theobroma={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Theobroma - Cacao Traceability");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    match args.snapshot_store_url {
        Some(ref url) => info!("Snapshot store: {}", url),
        None => info!("Snapshot store: in-memory (dev mode)"),
    }
    info!("======================================");

    // Connect to MongoDB (falls back to in-memory repositories in dev mode)
    let repos: Repositories = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            match mongo_repositories(&client).await {
                Ok(repos) => repos,
                Err(e) => {
                    error!("Failed to initialize collections: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "MongoDB connection failed (dev mode, using in-memory repositories): {}",
                    e
                );
                memory_repositories()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Snapshot store: remote content-addressable store in production,
    // in-memory store when dev mode runs without one
    let store: Arc<dyn SnapshotStore> = match args.snapshot_store_url {
        Some(ref url) => {
            let store =
                HttpSnapshotStore::new(url, Duration::from_millis(args.store_timeout_ms))?;
            info!("Snapshot store client created ({})", url);
            Arc::new(store)
        }
        None => {
            warn!("No snapshot store configured, using in-memory store");
            Arc::new(MemorySnapshotStore::new())
        }
    };

    let verifier = Arc::new(Ed25519Verifier::new());

    // Wire the services
    let ledger = PhaseLedger::new(
        Arc::clone(&repos.batches),
        Arc::clone(&repos.pulps),
        Arc::clone(&repos.producers),
    );
    let _certification = CertificationService::new(
        ledger.clone(),
        Arc::clone(&repos.certifications),
        Arc::clone(&repos.owners),
        store,
        verifier,
    );
    let _reports = ReportAggregator::new(
        Arc::clone(&repos.batches),
        Arc::clone(&repos.pulps),
        Arc::clone(&repos.producers),
    );

    info!("Services initialized, ready");

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}

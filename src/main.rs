//! crm-sync - Incremental CRM-to-analytics synchronization engine
//!
//! This is the main entry point: it loads configuration, wires the CRM
//! client, tenant store and event sink, runs one sync pass and exits.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crm_sync::config::Config;
use crm_sync::crm::HttpCrmClient;
use crm_sync::database::{DryRunStore, EventSink, LogSink, SqliteDatabase, TenantStore};
use crm_sync::sync::SyncOrchestrator;
use crm_sync::telemetry::init_tracing;

/// crm-sync - Incremental CRM-to-analytics synchronization engine
#[derive(Parser, Debug)]
#[command(name = "crm-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CRM_SYNC_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize tracing/logging
    init_tracing(&config.logging.level, &config.logging.format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting crm-sync");

    // Initialize database
    let database = SqliteDatabase::new(&config.database.path)
        .await?
        .with_tenant_id(config.database.tenant_id.clone());
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    if config.database.dry_run {
        info!("Dry run enabled, tenant saves and event writes are skipped");
    }
    let sink: Arc<dyn EventSink> = if config.database.dry_run {
        Arc::new(LogSink)
    } else {
        database.clone()
    };
    let store: Arc<dyn TenantStore> = if config.database.dry_run {
        Arc::new(DryRunStore::new(database))
    } else {
        database
    };

    // Initialize CRM client
    let api = Arc::new(HttpCrmClient::new(&config.crm)?);
    info!(base_url = %config.crm.api_base_url, "CRM client initialized");

    let orchestrator = SyncOrchestrator::new(&config, api, store, sink);
    match orchestrator.run().await {
        Ok(summary) => info!(
            tenant_id = %summary.tenant_id,
            accounts = summary.accounts.len(),
            events = summary.events_queued(),
            failed_phases = summary.failed_phases(),
            "crm-sync finished"
        ),
        Err(e) => error!(error = %e, "crm-sync aborted"),
    }

    std::process::exit(0)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

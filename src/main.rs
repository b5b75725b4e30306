//! Scriptorium - digital library backend
//!
//! Serves works, reviews, purchases and bookmarks over HTTP.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use scriptorium::{
    config::Args,
    db,
    ledger::{HttpLedgerGateway, InMemoryLedger, LedgerClientConfig, LedgerGateway},
    library::{Stores, SystemClock},
    server::{self, AppState},
    services::Library,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("scriptorium={},info", log_level).into()),
        )
        .with(args.log_json.then(|| fmt::layer().json()))
        .with((!args.log_json).then(fmt::layer))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }
    let config = args
        .library_config()
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    info!("======================================");
    info!("  Scriptorium - digital library");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Initial work status: {:?}", config.initial_status);
    info!("Review quorum: {:?}", config.review_quorum);
    info!("Purchase window: {}h", args.purchase_window_hours);
    info!("Admins configured: {}", config.admins.len());
    info!("======================================");

    let stores = if args.dev_mode {
        warn!("Using in-memory stores (dev mode)");
        Stores::in_memory()
    } else {
        info!("MongoDB: {} ({})", args.mongodb_uri, args.mongodb_db);
        let stores = db::connect(&args.mongodb_uri, &args.mongodb_db, &args.database_url).await?;
        info!("Databases connected");
        stores
    };

    let ledger: Arc<dyn LedgerGateway> = if args.dev_mode {
        warn!("Using in-memory ledger (dev mode)");
        Arc::new(InMemoryLedger::new())
    } else {
        info!("Ledger: {}", args.ledger_url);
        Arc::new(HttpLedgerGateway::new(LedgerClientConfig {
            base_url: args.ledger_url.clone(),
            timeout: args.ledger_timeout(),
        })?)
    };

    let admins = config.admins.clone();
    let library = Library::new(stores, ledger, Arc::new(SystemClock), config);
    library.identity.bootstrap_admins(&admins).await?;

    let state = Arc::new(AppState::new(args, library)?);
    server::run(state).await?;

    Ok(())
}

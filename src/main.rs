//! CastLab service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                CASTLAB SERVICE                │
//!                        │                                               │
//!     API Request        │  ┌─────────┐    ┌──────────┐   ┌───────────┐ │
//!     ───────────────────┼─▶│  http   │───▶│marketplace│   │  funding  │ │
//!                        │  │ server  │    │  catalog  │   │ sequencer │ │
//!                        │  └─────────┘    └──────────┘   └─────┬─────┘ │
//!                        │                                       │       │
//!                        │                                       ▼       │
//!                        │                                ┌───────────┐  │
//!                        │                                │blockchain │──┼──▶ JSON-RPC
//!                        │                                │  client   │  │    node
//!                        │                                └───────────┘  │
//!                        │                                               │
//!                        │  ┌─────────────────────────────────────────┐  │
//!                        │  │          Cross-Cutting Concerns          │  │
//!                        │  │  config · observability · lifecycle      │  │
//!                        │  └─────────────────────────────────────────┘  │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use castlab::blockchain::client::ChainClient;
use castlab::blockchain::contract::{ContractAddresses, FundingContract};
use castlab::blockchain::wallet::Wallet;
use castlab::config::{load_config, CastLabConfig};
use castlab::funding::service::FundingService;
use castlab::funding::submit::WalletSubmitter;
use castlab::funding::watcher::ReceiptWatcher;
use castlab::http::{AppState, HttpServer};
use castlab::lifecycle::{spawn_signal_listener, Shutdown};
use castlab::marketplace::store::ExperimentStore;
use castlab::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "castlab", about = "CastLab experiment funding service")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(std::path::Path::new(path))?,
        None => CastLabConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        chain_enabled = config.chain.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = match &config.store.persistence_path {
        Some(path) => ExperimentStore::load_from_file(path)?,
        None => ExperimentStore::new(None),
    };

    let funding = if config.chain.enabled {
        Some(build_funding_service(&config).await?)
    } else {
        tracing::warn!("Chain integration disabled, funding endpoints will answer 503");
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let state = AppState { store: store.clone(), funding };
    let server = HttpServer::new(config, state);
    server.run(listener, shutdown.subscribe()).await?;

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to persist catalog on shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wire the chain client, wallet, and funding collaborators from config.
async fn build_funding_service(
    config: &CastLabConfig,
) -> Result<Arc<FundingService>, Box<dyn std::error::Error>> {
    let client = ChainClient::new(config.chain.clone()).await?;

    if let Err(e) = client.verify_chain_id().await {
        tracing::warn!(error = %e, "Chain ID check failed, starting degraded");
    }

    let wallet = Wallet::from_env(config.chain.chain_id)?;
    let wallet_address = wallet.address();
    let wallet_chain_id = wallet.chain_id();

    let addrs = ContractAddresses {
        funding: config.contracts.funding_address.parse()?,
        token: config.contracts.token_address.parse()?,
    };

    let submitter = Arc::new(WalletSubmitter::new(client.clone(), wallet));
    let watcher = Arc::new(ReceiptWatcher::new(
        client.clone(),
        std::time::Duration::from_millis(config.funding.poll_interval_ms),
        std::time::Duration::from_secs(config.funding.confirm_timeout_secs),
    ));
    let reader = FundingContract::new(client, addrs);

    Ok(FundingService::new(
        submitter,
        watcher,
        addrs,
        wallet_address,
        wallet_chain_id,
        config.chain.chain_id,
        Some(reader),
        config.funding.clone(),
    ))
}

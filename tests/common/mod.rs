//! Shared utilities for integration testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, TxHash, B256};
use async_trait::async_trait;
use tokio::net::TcpListener;

use castlab::blockchain::contract::{ContractAddresses, ContractCall};
use castlab::config::{CastLabConfig, FundingConfig};
use castlab::funding::service::FundingService;
use castlab::funding::submit::TransactionSubmitter;
use castlab::funding::types::FundingError;
use castlab::funding::watcher::{ConfirmationWatcher, ConfirmedAt};
use castlab::http::{AppState, HttpServer};
use castlab::lifecycle::Shutdown;
use castlab::marketplace::store::ExperimentStore;

/// Pops a scripted outcome per submission; an exhausted script fails.
pub struct ScriptedSubmitter {
    outcomes: Mutex<VecDeque<Result<TxHash, FundingError>>>,
}

impl ScriptedSubmitter {
    pub fn new(outcomes: Vec<Result<TxHash, FundingError>>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into()) }
    }
}

#[async_trait]
impl TransactionSubmitter for ScriptedSubmitter {
    async fn submit(&self, _call: &ContractCall) -> Result<TxHash, FundingError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FundingError::Rpc("no scripted outcome".into())))
    }
}

/// Pops a scripted confirmation per wait; an exhausted script fails.
pub struct ScriptedWatcher {
    outcomes: Mutex<VecDeque<Result<ConfirmedAt, FundingError>>>,
}

impl ScriptedWatcher {
    pub fn new(outcomes: Vec<Result<ConfirmedAt, FundingError>>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into()) }
    }
}

#[async_trait]
impl ConfirmationWatcher for ScriptedWatcher {
    async fn wait(&self, _hash: TxHash) -> Result<ConfirmedAt, FundingError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FundingError::Rpc("no scripted confirmation".into())))
    }
}

/// Never resolves; models a confirmation that never arrives.
pub struct StuckWatcher;

#[async_trait]
impl ConfirmationWatcher for StuckWatcher {
    async fn wait(&self, _hash: TxHash) -> Result<ConfirmedAt, FundingError> {
        std::future::pending().await
    }
}

pub fn ok_hash(n: u8) -> Result<TxHash, FundingError> {
    Ok(B256::repeat_byte(n))
}

pub fn confirmed() -> Result<ConfirmedAt, FundingError> {
    Ok(ConfirmedAt { block_number: 1 })
}

/// A server under test. Dropping it stops accepting connections.
pub struct TestApp {
    pub base_url: String,
    _shutdown: Shutdown,
}

/// Spawn the API with scripted funding collaborators on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_app(
    submitter: Arc<dyn TransactionSubmitter>,
    watcher: Arc<dyn ConfirmationWatcher>,
    funding_config: FundingConfig,
) -> TestApp {
    let addrs = ContractAddresses {
        funding: Address::repeat_byte(0xaa),
        token: Address::repeat_byte(0xbb),
    };
    let funding = FundingService::new(
        submitter,
        watcher,
        addrs,
        Address::repeat_byte(0x01),
        31337,
        31337,
        None,
        funding_config,
    );
    serve(Some(funding)).await
}

/// Spawn the API with the chain integration disabled.
#[allow(dead_code)]
pub async fn spawn_catalog_only() -> TestApp {
    serve(None).await
}

async fn serve(funding: Option<Arc<FundingService>>) -> TestApp {
    let state = AppState {
        store: ExperimentStore::new(None),
        funding,
    };
    let server = HttpServer::new(CastLabConfig::default(), state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        _shutdown: shutdown,
    }
}

/// Create a listing over the API and return its id.
#[allow(dead_code)]
pub async fn create_experiment(client: &reqwest::Client, base_url: &str) -> u64 {
    let res = client
        .post(format!("{base_url}/api/experiments"))
        .json(&serde_json::json!({
            "title": "Sleep and memory replication",
            "summary": "Re-run of the 2019 consolidation study",
            "creator": "Nightlab",
            "funding_goal_usd": "2500",
        }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_u64()
        .unwrap()
}

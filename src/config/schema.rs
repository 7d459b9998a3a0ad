//! Configuration schema definitions.
//!
//! The complete configuration structure for the CastLab service. All types
//! derive Serde traits for deserialization from TOML config files, and every
//! section has defaults so a minimal config is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the CastLab service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CastLabConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Chain RPC settings.
    pub chain: ChainConfig,

    /// Deployed contract addresses.
    pub contracts: ContractsConfig,

    /// Funding flow tuning (confirmation waits, settle delay).
    pub funding: FundingConfig,

    /// Experiment catalog persistence.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Must comfortably exceed the funding confirmation wait, since a fund
    /// request drives both transactions inside one HTTP exchange.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Enable chain integration. When disabled the catalog still serves,
    /// but funding endpoints report the chain as unavailable.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 8453 for Base, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Deployed contract addresses.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContractsConfig {
    /// Address of the CastLab funding contract.
    pub funding_address: String,

    /// Address of the 6-decimal stablecoin contract.
    pub token_address: String,
}

/// Funding flow configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingConfig {
    /// Maximum wait for approval/deposit confirmation in seconds.
    pub confirm_timeout_secs: u64,

    /// Wall-clock timeout for the claim flow in seconds. A claim still
    /// pending after this is treated as failed and the flow resets.
    pub claim_timeout_secs: u64,

    /// Fixed delay before the one-shot re-read of on-chain totals after a
    /// completed deposit, in milliseconds.
    pub settle_delay_ms: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: 120,
            claim_timeout_secs: 15,
            settle_delay_ms: 3000,
            poll_interval_ms: 2000,
        }
    }
}

/// Experiment catalog persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the JSON catalog file. None keeps the catalog in memory.
    pub persistence_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

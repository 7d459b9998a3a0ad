//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key, RPC URL)
//!     → wallet.rs (key loading, nonce management)
//!     → client.rs (RPC connection with timeouts, failover)
//!     → contract.rs (ABI-typed reads + encoded write calls)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the chain is unreachable

pub mod client;
pub mod contract;
pub mod types;
pub mod wallet;

pub use client::ChainClient;
pub use contract::{ContractAddresses, ContractCall, FundingContract};
pub use types::{ChainConfig, ChainError, ChainId};
pub use wallet::Wallet;

//! Transaction submission seam and the wallet-backed implementation.
//!
//! # Responsibilities
//! - Build transactions with proper gas estimation
//! - Sign locally and broadcast raw
//! - Enforce the gas price ceiling before spending anything

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::blockchain::client::ChainClient;
use crate::blockchain::contract::ContractCall;
use crate::blockchain::types::ChainError;
use crate::blockchain::wallet::Wallet;
use crate::funding::types::{classify_submit_error, FundingError};

/// Base gas for a contract call, before calldata costs.
const GAS_LIMIT_BASE: u64 = 120_000;

/// Simplified calldata cost: 16 gas per byte.
const GAS_PER_CALLDATA_BYTE: u64 = 16;

/// Submits a signed transaction and reports its hash.
///
/// May fail synchronously (signer refusal, gas ceiling) or asynchronously
/// (broadcast error). Implemented by the wallet submitter in production and
/// by scripted fakes in tests.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, call: &ContractCall) -> Result<TxHash, FundingError>;
}

/// Production submitter: builds, signs, and broadcasts via the RPC client.
pub struct WalletSubmitter {
    client: ChainClient,
    wallet: Wallet,
}

impl WalletSubmitter {
    pub fn new(client: ChainClient, wallet: Wallet) -> Self {
        Self { client, wallet }
    }

    /// Get the submitting wallet address.
    pub fn address(&self) -> alloy::primitives::Address {
        self.wallet.address()
    }

    async fn build(&self, call: &ContractCall) -> Result<TransactionRequest, FundingError> {
        // Sync nonce with chain before each submission
        let chain_nonce = self.client.get_transaction_count(self.wallet.address()).await?;
        self.wallet.set_nonce(chain_nonce);

        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        let config = self.client.config();
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            }
            .into());
        }

        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;
        let nonce = self.wallet.get_and_increment_nonce();
        let gas_limit = GAS_LIMIT_BASE + call.data.len() as u64 * GAS_PER_CALLDATA_BYTE;

        Ok(TransactionRequest::default()
            .with_to(call.to)
            .with_value(U256::ZERO)
            .with_input(call.data.clone())
            .with_nonce(nonce)
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(self.wallet.chain_id())
            .with_gas_limit(gas_limit))
    }
}

#[async_trait]
impl TransactionSubmitter for WalletSubmitter {
    async fn submit(&self, call: &ContractCall) -> Result<TxHash, FundingError> {
        let tx = self.build(call).await?;

        let envelope = tx
            .build(&self.wallet.network_wallet())
            .await
            .map_err(|e| classify_submit_error(&e.to_string()))?;

        let hash = self.client.send_raw_transaction(&envelope.encoded_2718()).await?;

        tracing::info!(
            kind = call.kind.as_str(),
            to = %call.to,
            tx_hash = %hash,
            "Transaction broadcast"
        );
        Ok(hash)
    }
}

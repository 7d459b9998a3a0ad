//! Confirmation watching seam and the receipt-polling implementation.
//!
//! One watcher call per transaction handle. Abandoning an attempt simply
//! drops the future; the poll loop dies with it and nothing leaks.

use std::time::Duration;

use alloy::primitives::TxHash;
use async_trait::async_trait;
use tokio::time::{interval, timeout};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::ConfirmationStatus;
use crate::funding::types::FundingError;

/// Where a transaction was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedAt {
    pub block_number: u64,
}

/// Observes a submitted transaction until it is mined.
///
/// Returns `Ok` once the required confirmation depth is reached; a revert,
/// RPC failure, or wait timeout is an `Err` the caller treats as step
/// failure.
#[async_trait]
pub trait ConfirmationWatcher: Send + Sync {
    async fn wait(&self, hash: TxHash) -> Result<ConfirmedAt, FundingError>;
}

/// Production watcher: polls receipts at a fixed interval.
pub struct ReceiptWatcher {
    client: ChainClient,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ReceiptWatcher {
    pub fn new(client: ChainClient, poll_interval: Duration, max_wait: Duration) -> Self {
        Self { client, poll_interval, max_wait }
    }

    async fn poll_until_confirmed(&self, hash: TxHash) -> Result<ConfirmedAt, FundingError> {
        let required = self.client.confirmation_blocks();
        // Jitter keeps concurrent watchers from aligning their RPC bursts
        let jitter = Duration::from_millis(fastrand::u64(0..250));
        let mut ticker = interval(self.poll_interval + jitter);

        loop {
            ticker.tick().await;

            let receipt = match self.client.get_transaction_receipt(hash).await? {
                Some(r) => r,
                None => {
                    tracing::debug!(tx_hash = %hash, "Transaction pending");
                    continue;
                }
            };

            if !receipt.status() {
                return Err(FundingError::Reverted("transaction reverted".to_string()));
            }

            let current_block = self.client.get_block_number().await?;
            let tx_block = receipt.block_number.unwrap_or(current_block);
            let confirmations = current_block.saturating_sub(tx_block) as u32 + 1;

            if confirmations >= required {
                return Ok(ConfirmedAt { block_number: tx_block });
            }

            let status = ConfirmationStatus::Confirming { current: confirmations, required };
            tracing::debug!(tx_hash = %hash, ?status, "Waiting for confirmations");
        }
    }
}

#[async_trait]
impl ConfirmationWatcher for ReceiptWatcher {
    async fn wait(&self, hash: TxHash) -> Result<ConfirmedAt, FundingError> {
        match timeout(self.max_wait, self.poll_until_confirmed(hash)).await {
            Ok(result) => result,
            Err(_) => Err(FundingError::Timeout(self.max_wait.as_secs())),
        }
    }
}

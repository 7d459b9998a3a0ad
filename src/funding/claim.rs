//! Single-step transaction flows (withdraw, bet, claim).
//!
//! The approve→confirm pattern of the funding sequencer, reduced to one
//! transaction: `Idle/Pending ↔ Confirmed`. The claim variant imposes a
//! fixed wall-clock timeout after which a pending confirmation is treated
//! as failed and the flow resets, regardless of whether the transaction
//! might still land later. The orphaned hash stays on the handle so a late
//! confirmation can be reconciled by the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::blockchain::contract::ContractCall;
use crate::funding::submit::TransactionSubmitter;
use crate::funding::types::{FundingError, TransactionHandle};
use crate::funding::watcher::ConfirmationWatcher;
use crate::observability::metrics;

/// State of a single-step flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Pending,
    Confirmed,
}

/// A two-state machine for one-transaction operations.
pub struct SingleStepFlow {
    submitter: Arc<dyn TransactionSubmitter>,
    watcher: Arc<dyn ConfirmationWatcher>,
    /// Wall-clock cap on the confirmation wait; None waits as long as the
    /// watcher does.
    confirm_timeout: Option<Duration>,
    state: FlowState,
    handle: TransactionHandle,
}

impl SingleStepFlow {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        watcher: Arc<dyn ConfirmationWatcher>,
        confirm_timeout: Option<Duration>,
    ) -> Self {
        Self {
            submitter,
            watcher,
            confirm_timeout,
            state: FlowState::Idle,
            handle: TransactionHandle::default(),
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn handle(&self) -> &TransactionHandle {
        &self.handle
    }

    /// Submit the call and wait for confirmation.
    ///
    /// Any failure (rejection, revert, RPC error, timeout) resets the flow
    /// to `Idle` so the operation can be re-attempted as a whole.
    pub async fn run(&mut self, call: ContractCall) -> Result<&TransactionHandle, FundingError> {
        if self.state == FlowState::Pending {
            return Err(FundingError::Busy);
        }

        self.state = FlowState::Pending;
        self.handle.reset();

        let kind = call.kind;
        let hash = match self.submitter.submit(&call).await {
            Ok(hash) => hash,
            Err(e) => {
                self.handle.mark_failed(e.to_string());
                self.state = FlowState::Idle;
                return Err(e);
            }
        };
        self.handle.mark_submitted(hash);

        let wait = self.watcher.wait(hash);
        let result = match self.confirm_timeout {
            Some(limit) => match timeout(limit, wait).await {
                Ok(inner) => inner,
                Err(_) => {
                    // The transaction may still land; we stop watching and
                    // accept the user-visible false negative.
                    metrics::record_flow_timeout(kind.as_str());
                    tracing::warn!(
                        kind = kind.as_str(),
                        tx_hash = %hash,
                        "Confirmation wait timed out; resetting flow with hash retained"
                    );
                    Err(FundingError::Timeout(limit.as_secs()))
                }
            },
            None => wait.await,
        };

        match result {
            Ok(confirmed) => {
                self.handle.mark_confirmed();
                self.state = FlowState::Confirmed;
                tracing::info!(
                    kind = kind.as_str(),
                    tx_hash = %hash,
                    block = confirmed.block_number,
                    "Transaction confirmed"
                );
                Ok(&self.handle)
            }
            Err(e) => {
                self.handle.mark_failed(e.to_string());
                self.state = FlowState::Idle;
                Err(e)
            }
        }
    }
}

//! Funding service: owns in-flight attempts and single-step flows.
//!
//! One funding attempt may be in flight per experiment at a time; attempts
//! for different experiments are independent and share no mutable state.
//! The service also holds the advisory cache of on-chain totals that the
//! HTTP layer merges into catalog responses.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::blockchain::contract::{
    ContractAddresses, ContractCall, ExperimentInfo, FundingContract, UserPosition,
};
use crate::config::schema::FundingConfig;
use crate::funding::amount::TokenAmount;
use crate::funding::claim::SingleStepFlow;
use crate::funding::sequencer::FundingSequencer;
use crate::funding::submit::TransactionSubmitter;
use crate::funding::types::{FundingError, SequencerState, TransactionHandle};
use crate::funding::watcher::ConfirmationWatcher;
use crate::observability::metrics;

/// Result of driving one fund request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FundOutcome {
    pub state: SequencerState,
    pub approval: TransactionHandle,
    pub deposit: TransactionHandle,
    /// Step failure message, if the attempt stopped short of `Complete`.
    pub error: Option<String>,
}

/// Result of a single-step operation (withdraw, bet, claim, mint).
#[derive(Debug, Clone, serde::Serialize)]
pub struct FlowOutcome {
    pub transaction: TransactionHandle,
    pub error: Option<String>,
}

/// The service wallet's token holdings and standing allowance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WalletOverview {
    pub address: Address,
    pub balance: TokenAmount,
    pub balance_usd: String,
    /// Allowance currently granted to the funding contract.
    pub allowance: TokenAmount,
}

pub struct FundingService {
    submitter: Arc<dyn TransactionSubmitter>,
    watcher: Arc<dyn ConfirmationWatcher>,
    addrs: ContractAddresses,
    wallet_address: Address,
    wallet_chain_id: u64,
    expected_chain_id: u64,
    /// Read-only contract queries; None when running without a reachable
    /// chain (catalog-only mode, or tests with scripted collaborators).
    reader: Option<FundingContract>,
    config: FundingConfig,
    /// Sequencers for attempts that have not completed. Presence of an
    /// entry is the one-attempt-per-experiment guard.
    active: DashMap<u64, Arc<Mutex<FundingSequencer>>>,
    /// Advisory cache of on-chain totals, refreshed on reads and by the
    /// post-deposit settle task.
    chain_cache: DashMap<u64, ExperimentInfo>,
}

impl FundingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        watcher: Arc<dyn ConfirmationWatcher>,
        addrs: ContractAddresses,
        wallet_address: Address,
        wallet_chain_id: u64,
        expected_chain_id: u64,
        reader: Option<FundingContract>,
        config: FundingConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            submitter,
            watcher,
            addrs,
            wallet_address,
            wallet_chain_id,
            expected_chain_id,
            reader,
            config,
            active: DashMap::new(),
            chain_cache: DashMap::new(),
        })
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    /// Drive a funding attempt for `amount` on one experiment.
    ///
    /// From `Idle` this runs the full approve→deposit sequence. If a prior
    /// attempt is parked in `Approved` (deposit failed), the same amount
    /// retries just the deposit, and a different amount restarts the
    /// sequence with a fresh approval.
    pub async fn fund(
        self: &Arc<Self>,
        experiment_id: u64,
        amount: TokenAmount,
    ) -> Result<FundOutcome, FundingError> {
        let sequencer = self.attempt_for(experiment_id);
        let mut seq = sequencer.try_lock().map_err(|_| FundingError::Busy)?;

        seq.set_amount(amount);
        let result = match seq.state() {
            SequencerState::Idle => seq.submit().await,
            SequencerState::Approved => seq.retry_deposit().await,
            other => Err(FundingError::InvalidState { expected: "idle or approved", actual: other }),
        };

        let outcome = FundOutcome {
            state: seq.state(),
            approval: seq.approval_handle().clone(),
            deposit: seq.deposit_handle().clone(),
            error: result.as_ref().err().map(ToString::to_string),
        };

        match result {
            Ok(SequencerState::Complete) => {
                drop(seq);
                self.active.remove(&experiment_id);
                self.schedule_settle_read(experiment_id);
                Ok(outcome)
            }
            Ok(_) => Ok(outcome),
            // Step failures keep the attempt parked for retry and are
            // reported inside the outcome; pre-flight errors propagate.
            Err(e) if e.is_step_failure() => Ok(outcome),
            Err(e) => {
                if seq.state() == SequencerState::Idle && seq.requested_amount().is_none() {
                    drop(seq);
                    self.active.remove(&experiment_id);
                }
                Err(e)
            }
        }
    }

    /// Explicit deposit retry for an attempt parked in `Approved`.
    pub async fn retry_deposit(
        self: &Arc<Self>,
        experiment_id: u64,
    ) -> Result<FundOutcome, FundingError> {
        let sequencer = self
            .active
            .get(&experiment_id)
            .map(|entry| entry.value().clone())
            .ok_or(FundingError::InvalidState {
                expected: "approved",
                actual: SequencerState::Idle,
            })?;
        let mut seq = sequencer.try_lock().map_err(|_| FundingError::Busy)?;

        let result = seq.retry_deposit().await;
        let outcome = FundOutcome {
            state: seq.state(),
            approval: seq.approval_handle().clone(),
            deposit: seq.deposit_handle().clone(),
            error: result.as_ref().err().map(ToString::to_string),
        };

        match result {
            Ok(SequencerState::Complete) => {
                drop(seq);
                self.active.remove(&experiment_id);
                self.schedule_settle_read(experiment_id);
                Ok(outcome)
            }
            Ok(_) => Ok(outcome),
            Err(e) if e.is_step_failure() => Ok(outcome),
            Err(e) => Err(e),
        }
    }

    /// Withdraw previously deposited funds.
    pub async fn withdraw(
        &self,
        experiment_id: u64,
        amount: TokenAmount,
    ) -> Result<FlowOutcome, FundingError> {
        if amount.is_zero() {
            return Err(FundingError::ZeroAmount);
        }
        let call = ContractCall::withdraw(&self.addrs, experiment_id, amount);
        self.run_single_step(call, None).await
    }

    /// Place a parimutuel bet on one outcome.
    pub async fn place_bet(
        &self,
        experiment_id: u64,
        outcome: u8,
        amount: TokenAmount,
    ) -> Result<FlowOutcome, FundingError> {
        if amount.is_zero() {
            return Err(FundingError::ZeroAmount);
        }
        let call = ContractCall::place_bet(&self.addrs, experiment_id, outcome, amount);
        self.run_single_step(call, None).await
    }

    /// Claim winnings from a resolved bet pool.
    ///
    /// Bounded by the configured claim timeout; a claim still pending after
    /// that resets and surfaces a timeout error, with the hash retained.
    pub async fn claim(&self, experiment_id: u64) -> Result<FlowOutcome, FundingError> {
        let call = ContractCall::claim(&self.addrs, experiment_id);
        let limit = Duration::from_secs(self.config.claim_timeout_secs);
        self.run_single_step(call, Some(limit)).await
    }

    /// Mint test tokens to the service wallet.
    pub async fn mint(&self, amount: TokenAmount) -> Result<FlowOutcome, FundingError> {
        if amount.is_zero() {
            return Err(FundingError::ZeroAmount);
        }
        let call = ContractCall::mint(&self.addrs, self.wallet_address, amount);
        self.run_single_step(call, None).await
    }

    async fn run_single_step(
        &self,
        call: ContractCall,
        limit: Option<Duration>,
    ) -> Result<FlowOutcome, FundingError> {
        let mut flow =
            SingleStepFlow::new(self.submitter.clone(), self.watcher.clone(), limit);
        match flow.run(call).await {
            Ok(handle) => Ok(FlowOutcome { transaction: handle.clone(), error: None }),
            Err(e) if e.is_step_failure() => Ok(FlowOutcome {
                transaction: flow.handle().clone(),
                error: Some(e.to_string()),
            }),
            Err(e) => Err(e),
        }
    }

    /// On-chain totals for an experiment, refreshing the advisory cache.
    /// Falls back to the last cached value when the RPC is unreachable.
    pub async fn experiment_info(&self, experiment_id: u64) -> Option<ExperimentInfo> {
        let reader = self.reader.as_ref()?;
        match reader.experiment_info(experiment_id).await {
            Ok(info) => {
                self.chain_cache.insert(experiment_id, info);
                Some(info)
            }
            Err(e) => {
                tracing::warn!(experiment_id, error = %e, "On-chain read failed, serving cached totals");
                self.chain_cache.get(&experiment_id).map(|r| *r.value())
            }
        }
    }

    /// Whether the chain is reachable. False when reads are disabled.
    pub async fn chain_healthy(&self) -> bool {
        match &self.reader {
            Some(reader) => reader.is_healthy().await,
            None => false,
        }
    }

    /// The service wallet's balance and funding-contract allowance.
    pub async fn wallet_overview(&self) -> Result<WalletOverview, FundingError> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| FundingError::Unavailable("chain reads disabled".to_string()))?;
        let balance = reader.balance_of(self.wallet_address).await?;
        let allowance = reader.allowance(self.wallet_address).await?;
        Ok(WalletOverview {
            address: self.wallet_address,
            balance,
            balance_usd: balance.to_usd_string(),
            allowance,
        })
    }

    /// A user's on-chain position for an experiment.
    pub async fn user_position(
        &self,
        experiment_id: u64,
        user: Address,
    ) -> Result<UserPosition, FundingError> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| FundingError::Unavailable("chain reads disabled".to_string()))?;
        Ok(reader.user_position(experiment_id, user).await?)
    }

    /// Current sequencer state for an experiment, if an attempt is parked.
    pub fn attempt_state(&self, experiment_id: u64) -> Option<SequencerState> {
        let entry = self.active.get(&experiment_id)?;
        let state = entry.value().try_lock().ok().map(|seq| seq.state());
        state
    }

    fn attempt_for(self: &Arc<Self>, experiment_id: u64) -> Arc<Mutex<FundingSequencer>> {
        self.active
            .entry(experiment_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(FundingSequencer::new(
                    experiment_id,
                    self.addrs,
                    self.wallet_chain_id,
                    self.expected_chain_id,
                    self.submitter.clone(),
                    self.watcher.clone(),
                )))
            })
            .value()
            .clone()
    }

    /// One delayed re-read of on-chain totals after a completed deposit,
    /// letting the ledger settle before displayed totals refresh. A single
    /// fixed delay, not a poll loop.
    fn schedule_settle_read(self: &Arc<Self>, experiment_id: u64) {
        let service = self.clone();
        let delay = Duration::from_millis(self.config.settle_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if service.experiment_info(experiment_id).await.is_some() {
                metrics::record_settle_read(experiment_id);
            }
        });
    }
}

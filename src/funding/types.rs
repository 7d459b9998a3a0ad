//! Funding flow state and error definitions.

use alloy::primitives::TxHash;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::types::ChainError;
use crate::funding::amount::{AmountError, TokenAmount};

/// The funding sequencer's authoritative state, one per attempt.
///
/// Transitions only move forward except on error, which returns to the
/// nearest safely-retryable prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    Approving,
    Approved,
    Depositing,
    Complete,
}

impl std::fmt::Display for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SequencerState::Idle => "idle",
            SequencerState::Approving => "approving",
            SequencerState::Approved => "approved",
            SequencerState::Depositing => "depositing",
            SequencerState::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// The amount a user asked to fund, and what has been approved for it.
///
/// `approved_amount` is cleared whenever it no longer equals the requested
/// amount: an approval for a smaller amount cannot cover a larger deposit
/// and must not be silently reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingIntent {
    pub amount_requested: TokenAmount,
    pub approved_amount: Option<TokenAmount>,
}

impl FundingIntent {
    pub fn new(amount_requested: TokenAmount) -> Self {
        Self { amount_requested, approved_amount: None }
    }
}

/// Observable state of one submitted transaction.
///
/// Owned exclusively by the flow that created it; reset on retry so a later
/// retry never observes a stale error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionHandle {
    pub hash: Option<TxHash>,
    pub is_pending: bool,
    pub is_confirmed: bool,
    pub error: Option<String>,
}

impl TransactionHandle {
    /// Clear everything, including any prior error.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn mark_submitted(&mut self, hash: TxHash) {
        self.hash = Some(hash);
        self.is_pending = true;
        self.is_confirmed = false;
        self.error = None;
    }

    pub fn mark_confirmed(&mut self) {
        self.is_pending = false;
        self.is_confirmed = true;
        self.error = None;
    }

    /// Record a failure. The hash is kept so a caller can reconcile a
    /// transaction that lands after we stopped watching it.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.is_pending = false;
        self.is_confirmed = false;
        self.error = Some(error.into());
    }
}

/// Errors surfaced by funding flows.
///
/// All are non-fatal and scoped to the single in-flight attempt; nothing
/// here escalates past the flow that produced it.
#[derive(Debug, Error)]
pub enum FundingError {
    /// The user (or signer) declined to sign the transaction.
    #[error("transaction was rejected in the wallet")]
    Rejected(String),

    /// The transaction was mined but reverted.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// Network or RPC failure while submitting or waiting.
    #[error("chain communication failed: {0}")]
    Rpc(String),

    /// No confirmation arrived within the allowed wait.
    #[error("no confirmation within {0} seconds")]
    Timeout(u64),

    /// Wallet is connected to a different network than expected.
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    WrongChain { expected: u64, actual: u64 },

    /// Requested amount failed validation.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Amount must be positive to start a funding attempt.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// Another attempt is already in flight for this experiment.
    #[error("a funding attempt is already in flight for this experiment")]
    Busy,

    /// Operation is not valid in the current state.
    #[error("operation not valid in state '{actual}' (expected {expected})")]
    InvalidState { expected: &'static str, actual: SequencerState },

    /// Chain integration is disabled or unavailable.
    #[error("chain not available: {0}")]
    Unavailable(String),
}

impl FundingError {
    /// Failures the user may retry at the same step (vs. re-validate input).
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            FundingError::Rejected(_)
                | FundingError::Reverted(_)
                | FundingError::Rpc(_)
                | FundingError::Timeout(_)
        )
    }
}

impl From<ChainError> for FundingError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Reverted(reason) => FundingError::Reverted(reason),
            ChainError::NotAvailable(reason) => FundingError::Unavailable(reason),
            other => classify_submit_error(&other.to_string()),
        }
    }
}

/// Pattern-match a raw submitter error into the taxonomy. Rejection detection
/// exists only to pick friendlier display text; rejection and any other
/// failure follow the same retry path.
pub fn classify_submit_error(raw: &str) -> FundingError {
    let lower = raw.to_lowercase();
    if lower.contains("rejected") || lower.contains("denied") || lower.contains("cancelled") {
        FundingError::Rejected(raw.to_string())
    } else {
        FundingError::Rpc(raw.to_string())
    }
}

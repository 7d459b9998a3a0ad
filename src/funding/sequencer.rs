//! The funding transaction sequencer.
//!
//! Drives a two-step on-chain operation (token-allowance approval, then
//! deposit) as one user-perceived action, recovering from either step's
//! failure without repeating a step that already succeeded:
//!
//! ```text
//! Idle --submit--> Approving --confirmed--> Approved --auto once--> Depositing --confirmed--> Complete
//!                      |                        ^                       |
//!                      +--failed--> Idle        +------failed-----------+
//! ```
//!
//! An approval failure restarts the whole sequence; a deposit failure keeps
//! the confirmed approval and retries only the deposit. Editing the amount
//! after approval invalidates the approval (it is amount-specific) and
//! forces the sequence back to `Idle`. No step is retried automatically:
//! the design optimizes for least wasted signing cost, never forcing a
//! redundant approval.

use std::sync::Arc;

use crate::blockchain::contract::{ContractAddresses, ContractCall};
use crate::funding::amount::TokenAmount;
use crate::funding::submit::TransactionSubmitter;
use crate::funding::types::{FundingError, FundingIntent, SequencerState, TransactionHandle};
use crate::funding::watcher::ConfirmationWatcher;
use crate::observability::metrics;

/// State machine for one funding attempt on one experiment.
///
/// Single logical owner: all transitions run on the caller's task, never
/// concurrently for the same attempt. Attempts for different experiments
/// share no mutable state.
pub struct FundingSequencer {
    experiment_id: u64,
    addrs: ContractAddresses,
    wallet_chain_id: u64,
    expected_chain_id: u64,
    submitter: Arc<dyn TransactionSubmitter>,
    watcher: Arc<dyn ConfirmationWatcher>,
    state: SequencerState,
    intent: Option<FundingIntent>,
    approval: TransactionHandle,
    deposit: TransactionHandle,
    /// Idempotent re-entry guard: the automatic deposit fires at most once
    /// per distinct approval, even if the owner re-drives while `Approved`.
    deposit_fired: bool,
}

impl FundingSequencer {
    pub fn new(
        experiment_id: u64,
        addrs: ContractAddresses,
        wallet_chain_id: u64,
        expected_chain_id: u64,
        submitter: Arc<dyn TransactionSubmitter>,
        watcher: Arc<dyn ConfirmationWatcher>,
    ) -> Self {
        Self {
            experiment_id,
            addrs,
            wallet_chain_id,
            expected_chain_id,
            submitter,
            watcher,
            state: SequencerState::Idle,
            intent: None,
            approval: TransactionHandle::default(),
            deposit: TransactionHandle::default(),
            deposit_fired: false,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn experiment_id(&self) -> u64 {
        self.experiment_id
    }

    pub fn approved_amount(&self) -> Option<TokenAmount> {
        self.intent.as_ref().and_then(|i| i.approved_amount)
    }

    pub fn requested_amount(&self) -> Option<TokenAmount> {
        self.intent.as_ref().map(|i| i.amount_requested)
    }

    pub fn approval_handle(&self) -> &TransactionHandle {
        &self.approval
    }

    pub fn deposit_handle(&self) -> &TransactionHandle {
        &self.deposit
    }

    /// Record the requested amount.
    ///
    /// If an approval exists for a different amount, the whole sequence is
    /// forced back to `Idle` and the approval record and auto-deposit guard
    /// are cleared.
    pub fn set_amount(&mut self, amount: TokenAmount) {
        if let Some(intent) = &mut self.intent {
            if intent.approved_amount.is_some_and(|approved| approved != amount) {
                tracing::debug!(
                    experiment_id = self.experiment_id,
                    "Requested amount diverged from approval; restarting sequence"
                );
                self.reset();
            } else {
                intent.amount_requested = amount;
                return;
            }
        }
        self.intent = Some(FundingIntent::new(amount));
    }

    /// Full reset to `Idle`: intent, both handles, and the auto-deposit
    /// guard, so a fresh submit starts clean.
    fn reset(&mut self) {
        self.state = SequencerState::Idle;
        self.intent = None;
        self.approval.reset();
        self.deposit.reset();
        self.deposit_fired = false;
    }

    /// Start the sequence: request approval, and on confirmation self-trigger
    /// the deposit.
    ///
    /// Valid only from `Idle` with a positive amount and the wallet on the
    /// expected network. On approval failure the state returns to `Idle` so
    /// the whole sequence can be re-attempted.
    pub async fn submit(&mut self) -> Result<SequencerState, FundingError> {
        if self.state != SequencerState::Idle {
            return Err(FundingError::InvalidState { expected: "idle", actual: self.state });
        }
        let amount = self.intent.as_ref().map(|i| i.amount_requested).unwrap_or(TokenAmount::ZERO);
        if amount.is_zero() {
            return Err(FundingError::ZeroAmount);
        }
        if self.wallet_chain_id != self.expected_chain_id {
            return Err(FundingError::WrongChain {
                expected: self.expected_chain_id,
                actual: self.wallet_chain_id,
            });
        }

        self.state = SequencerState::Approving;
        self.approval.reset();
        metrics::record_funding_step("approve");

        let call = ContractCall::approve(&self.addrs, amount);
        let hash = match self.submitter.submit(&call).await {
            Ok(hash) => hash,
            Err(e) => {
                // Clear partial submitter state so a fresh submit starts clean
                self.approval.mark_failed(e.to_string());
                self.state = SequencerState::Idle;
                metrics::record_funding_failure("approve");
                return Err(e);
            }
        };
        self.approval.mark_submitted(hash);

        match self.watcher.wait(hash).await {
            Ok(confirmed) => {
                self.approval.mark_confirmed();
                if let Some(intent) = &mut self.intent {
                    intent.approved_amount = Some(amount);
                }
                self.state = SequencerState::Approved;
                tracing::info!(
                    experiment_id = self.experiment_id,
                    amount = %amount,
                    block = confirmed.block_number,
                    "Approval confirmed"
                );
            }
            Err(e) => {
                self.approval.mark_failed(e.to_string());
                self.state = SequencerState::Idle;
                if let Some(intent) = &mut self.intent {
                    intent.approved_amount = None;
                }
                metrics::record_funding_failure("approve");
                return Err(e);
            }
        }

        self.drive().await
    }

    /// Fire the automatic deposit if it hasn't fired for this approval yet.
    ///
    /// Safe to call any number of times; a no-op unless the sequence sits in
    /// `Approved` with the guard unset. This is what prevents a duplicate
    /// deposit submission when the owner re-enters `Approved`.
    pub async fn drive(&mut self) -> Result<SequencerState, FundingError> {
        if self.state == SequencerState::Approved && !self.deposit_fired {
            self.deposit_fired = true;
            return self.run_deposit().await;
        }
        Ok(self.state)
    }

    /// Explicit user retry of a failed deposit. Valid only from `Approved`;
    /// the confirmed approval is reused, never re-requested.
    pub async fn retry_deposit(&mut self) -> Result<SequencerState, FundingError> {
        if self.state != SequencerState::Approved {
            return Err(FundingError::InvalidState { expected: "approved", actual: self.state });
        }
        self.run_deposit().await
    }

    async fn run_deposit(&mut self) -> Result<SequencerState, FundingError> {
        let amount = self
            .approved_amount()
            .ok_or(FundingError::InvalidState { expected: "approved", actual: self.state })?;

        self.state = SequencerState::Depositing;
        self.deposit.reset();
        metrics::record_funding_step("deposit");

        let call = ContractCall::deposit(&self.addrs, self.experiment_id, amount);
        let hash = match self.submitter.submit(&call).await {
            Ok(hash) => hash,
            Err(e) => {
                // Approval is unaffected by a failed deposit
                self.deposit.mark_failed(e.to_string());
                self.state = SequencerState::Approved;
                metrics::record_funding_failure("deposit");
                return Err(e);
            }
        };
        self.deposit.mark_submitted(hash);

        match self.watcher.wait(hash).await {
            Ok(confirmed) => {
                self.deposit.mark_confirmed();
                self.state = SequencerState::Complete;
                // Completion clears both the approval record and the amount
                self.intent = None;
                metrics::record_funding_complete();
                tracing::info!(
                    experiment_id = self.experiment_id,
                    amount = %amount,
                    block = confirmed.block_number,
                    "Deposit confirmed, funding complete"
                );
                Ok(self.state)
            }
            Err(e) => {
                self.deposit.mark_failed(e.to_string());
                self.state = SequencerState::Approved;
                metrics::record_funding_failure("deposit");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::contract::CallKind;
    use crate::funding::watcher::ConfirmedAt;
    use alloy::primitives::{Address, TxHash, B256};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn addrs() -> ContractAddresses {
        ContractAddresses {
            funding: Address::repeat_byte(0xaa),
            token: Address::repeat_byte(0xbb),
        }
    }

    fn hash(n: u8) -> TxHash {
        B256::repeat_byte(n)
    }

    /// Submitter fake: pops scripted outcomes, records submitted call kinds.
    struct ScriptedSubmitter {
        outcomes: Mutex<VecDeque<Result<TxHash, FundingError>>>,
        submitted: Mutex<Vec<CallKind>>,
    }

    impl ScriptedSubmitter {
        fn new(outcomes: Vec<Result<TxHash, FundingError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                submitted: Mutex::new(Vec::new()),
            })
        }

        fn submitted(&self) -> Vec<CallKind> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionSubmitter for ScriptedSubmitter {
        async fn submit(&self, call: &ContractCall) -> Result<TxHash, FundingError> {
            self.submitted.lock().unwrap().push(call.kind);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FundingError::Rpc("no scripted outcome".into())))
        }
    }

    /// Watcher fake: pops scripted confirmations in submission order.
    struct ScriptedWatcher {
        outcomes: Mutex<VecDeque<Result<ConfirmedAt, FundingError>>>,
    }

    impl ScriptedWatcher {
        fn new(outcomes: Vec<Result<ConfirmedAt, FundingError>>) -> Arc<Self> {
            Arc::new(Self { outcomes: Mutex::new(outcomes.into()) })
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

    fn sequencer(
        submitter: Arc<ScriptedSubmitter>,
        watcher: Arc<ScriptedWatcher>,
    ) -> FundingSequencer {
        FundingSequencer::new(1, addrs(), 31337, 31337, submitter, watcher)
    }

    fn usd(s: &str) -> TokenAmount {
        TokenAmount::from_usd_str(s).unwrap()
    }

    fn confirmed() -> Result<ConfirmedAt, FundingError> {
        Ok(ConfirmedAt { block_number: 100 })
    }

    #[tokio::test]
    async fn test_happy_path_completes_and_clears_intent() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![confirmed(), confirmed()]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(usd("50"));
        let state = seq.submit().await.unwrap();

        assert_eq!(state, SequencerState::Complete);
        // approval then deposit, never deposit first
        assert_eq!(submitted_order(&submitter), vec![CallKind::Approve, CallKind::Deposit]);
        assert_eq!(seq.approved_amount(), None);
        assert_eq!(seq.requested_amount(), None);
        assert!(seq.approval_handle().is_confirmed);
        assert!(seq.deposit_handle().is_confirmed);
    }

    fn submitted_order(submitter: &ScriptedSubmitter) -> Vec<CallKind> {
        submitter.submitted()
    }

    #[tokio::test]
    async fn test_submit_never_skips_to_deposit() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1))]);
        let watcher = ScriptedWatcher::new(vec![]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(usd("1"));
        // approval confirmation errs (empty script) so we stop mid-flow, but
        // the first submitted call must be the approval
        let _ = seq.submit().await;
        assert_eq!(submitted_order(&submitter)[0], CallKind::Approve);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_from_idle() {
        let submitter = ScriptedSubmitter::new(vec![]);
        let watcher = ScriptedWatcher::new(vec![]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(TokenAmount::ZERO);
        let err = seq.submit().await.unwrap_err();
        assert!(matches!(err, FundingError::ZeroAmount));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(submitted_order(&submitter).is_empty());
    }

    #[tokio::test]
    async fn test_wrong_chain_rejected_before_submitting() {
        let submitter = ScriptedSubmitter::new(vec![]);
        let watcher = ScriptedWatcher::new(vec![]);
        let mut seq = FundingSequencer::new(1, addrs(), 1, 31337, submitter.clone(), watcher);

        seq.set_amount(usd("5"));
        let err = seq.submit().await.unwrap_err();
        assert!(matches!(err, FundingError::WrongChain { expected: 31337, actual: 1 }));
        assert!(submitted_order(&submitter).is_empty());
    }

    #[tokio::test]
    async fn test_approval_submit_failure_returns_to_idle() {
        let submitter =
            ScriptedSubmitter::new(vec![Err(FundingError::Rejected("user rejected".into()))]);
        let watcher = ScriptedWatcher::new(vec![]);
        let mut seq = sequencer(submitter, watcher);

        seq.set_amount(usd("50"));
        let err = seq.submit().await.unwrap_err();

        assert!(matches!(err, FundingError::Rejected(_)));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.approved_amount(), None);
        assert!(seq.approval_handle().error.is_some());
    }

    #[tokio::test]
    async fn test_approval_revert_returns_to_idle_never_approved() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1))]);
        let watcher =
            ScriptedWatcher::new(vec![Err(FundingError::Reverted("reverted".into()))]);
        let mut seq = sequencer(submitter, watcher);

        seq.set_amount(usd("50"));
        let err = seq.submit().await.unwrap_err();

        assert!(matches!(err, FundingError::Reverted(_)));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.approved_amount(), None);
    }

    #[tokio::test]
    async fn test_deposit_failure_preserves_approval() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Reverted("deposit reverted".into())),
        ]);
        let mut seq = sequencer(submitter, watcher);

        seq.set_amount(usd("50"));
        let err = seq.submit().await.unwrap_err();

        assert!(matches!(err, FundingError::Reverted(_)));
        assert_eq!(seq.state(), SequencerState::Approved);
        // the confirmed approval is untouched by the failed deposit
        assert_eq!(seq.approved_amount(), Some(usd("50")));
        assert!(seq.approval_handle().is_confirmed);
        assert!(seq.deposit_handle().error.is_some());
    }

    #[tokio::test]
    async fn test_auto_deposit_fires_exactly_once() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Rpc("rpc down".into())),
        ]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(usd("50"));
        let _ = seq.submit().await;
        assert_eq!(seq.state(), SequencerState::Approved);

        // Re-driving while back in Approved (the re-render case) must not
        // submit a second deposit
        for _ in 0..3 {
            let state = seq.drive().await.unwrap();
            assert_eq!(state, SequencerState::Approved);
        }
        assert_eq!(submitted_order(&submitter), vec![CallKind::Approve, CallKind::Deposit]);
    }

    #[tokio::test]
    async fn test_retry_deposit_after_failure_completes() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2)), Ok(hash(3))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Reverted("first deposit reverted".into())),
            confirmed(),
        ]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(usd("50"));
        let _ = seq.submit().await;
        assert_eq!(seq.state(), SequencerState::Approved);

        let state = seq.retry_deposit().await.unwrap();
        assert_eq!(state, SequencerState::Complete);
        // one approval total: the retry reused the confirmed approval
        assert_eq!(
            submitted_order(&submitter),
            vec![CallKind::Approve, CallKind::Deposit, CallKind::Deposit]
        );
        // retry reset the handle, so no stale error remains
        assert!(seq.deposit_handle().error.is_none());
    }

    #[tokio::test]
    async fn test_amount_change_after_approval_forces_idle() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Rpc("down".into())),
        ]);
        let mut seq = sequencer(submitter.clone(), watcher);

        seq.set_amount(usd("50"));
        let _ = seq.submit().await;
        assert_eq!(seq.approved_amount(), Some(usd("50")));

        seq.set_amount(usd("75"));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.approved_amount(), None);
        assert_eq!(seq.requested_amount(), Some(usd("75")));
        assert_eq!(*seq.approval_handle(), TransactionHandle::default());

        // guard was cleared too: a full resubmit runs approve then deposit
        let submitter2 = ScriptedSubmitter::new(vec![Ok(hash(3)), Ok(hash(4))]);
        seq.submitter = submitter2.clone();
        seq.watcher = ScriptedWatcher::new(vec![confirmed(), confirmed()]);
        let state = seq.submit().await.unwrap();
        assert_eq!(state, SequencerState::Complete);
        assert_eq!(submitted_order(&submitter2), vec![CallKind::Approve, CallKind::Deposit]);
    }

    #[tokio::test]
    async fn test_amount_unchanged_keeps_approval() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Rpc("down".into())),
        ]);
        let mut seq = sequencer(submitter, watcher);

        seq.set_amount(usd("50"));
        let _ = seq.submit().await;

        // re-setting the same amount is not a divergence
        seq.set_amount(usd("50"));
        assert_eq!(seq.state(), SequencerState::Approved);
        assert_eq!(seq.approved_amount(), Some(usd("50")));
    }

    #[tokio::test]
    async fn test_submit_invalid_outside_idle() {
        let submitter = ScriptedSubmitter::new(vec![Ok(hash(1)), Ok(hash(2))]);
        let watcher = ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Rpc("down".into())),
        ]);
        let mut seq = sequencer(submitter, watcher);

        seq.set_amount(usd("50"));
        let _ = seq.submit().await;
        assert_eq!(seq.state(), SequencerState::Approved);

        let err = seq.submit().await.unwrap_err();
        assert!(matches!(err, FundingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_retry_deposit_invalid_from_idle() {
        let submitter = ScriptedSubmitter::new(vec![]);
        let watcher = ScriptedWatcher::new(vec![]);
        let mut seq = sequencer(submitter, watcher);

        let err = seq.retry_deposit().await.unwrap_err();
        assert!(matches!(err, FundingError::InvalidState { .. }));
    }
}

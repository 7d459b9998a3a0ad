//! ABI-typed client for the CastLab funding contract and its stablecoin.
//!
//! The funding contract owns all settlement math (deposits, parimutuel
//! pools, payouts). This module only encodes calls against it and decodes
//! advisory read results; nothing here is authoritative for flow state.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ChainError, ChainResult};
use crate::funding::amount::TokenAmount;

sol! {
    // CastLab funding contract
    function getExperimentInfo(uint256 id) returns (uint256 deposited, uint256 bet0, uint256 bet1, uint8 outcome, bool isOpen);
    function getUserPosition(uint256 id, address user) returns (uint256 deposit, uint256 bet0, uint256 bet1);
    function deposit(uint256 id, uint256 amount);
    function withdraw(uint256 id, uint256 amount);
    function placeBet(uint256 id, uint8 outcome, uint256 amount);
    function claim(uint256 id);

    // 6-decimal stablecoin (ERC-20 subset + test faucet)
    function approve(address spender, uint256 amount) returns (bool);
    function allowance(address owner, address spender) returns (uint256);
    function balanceOf(address account) returns (uint256);
    function mint(address to, uint256 amount);
}

/// Addresses of the deployed contracts.
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    /// The funding contract (spender of approved tokens).
    pub funding: Address,
    /// The stablecoin contract.
    pub token: Address,
}

/// What a submitted transaction does, for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Approve,
    Deposit,
    Withdraw,
    Bet,
    Claim,
    Mint,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Approve => "approve",
            CallKind::Deposit => "deposit",
            CallKind::Withdraw => "withdraw",
            CallKind::Bet => "bet",
            CallKind::Claim => "claim",
            CallKind::Mint => "mint",
        }
    }
}

/// An encoded write call ready for the transaction submitter.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub kind: CallKind,
}

impl ContractCall {
    /// Token-allowance grant letting the funding contract pull `amount`.
    pub fn approve(addrs: &ContractAddresses, amount: TokenAmount) -> Self {
        Self {
            to: addrs.token,
            data: approveCall { spender: addrs.funding, amount: amount.as_u256() }
                .abi_encode()
                .into(),
            kind: CallKind::Approve,
        }
    }

    /// Stablecoin deposit into an experiment's pool.
    pub fn deposit(addrs: &ContractAddresses, experiment_id: u64, amount: TokenAmount) -> Self {
        Self {
            to: addrs.funding,
            data: depositCall { id: U256::from(experiment_id), amount: amount.as_u256() }
                .abi_encode()
                .into(),
            kind: CallKind::Deposit,
        }
    }

    /// Withdrawal of previously deposited funds.
    pub fn withdraw(addrs: &ContractAddresses, experiment_id: u64, amount: TokenAmount) -> Self {
        Self {
            to: addrs.funding,
            data: withdrawCall { id: U256::from(experiment_id), amount: amount.as_u256() }
                .abi_encode()
                .into(),
            kind: CallKind::Withdraw,
        }
    }

    /// Parimutuel bet on one of the two outcomes.
    pub fn place_bet(
        addrs: &ContractAddresses,
        experiment_id: u64,
        outcome: u8,
        amount: TokenAmount,
    ) -> Self {
        Self {
            to: addrs.funding,
            data: placeBetCall { id: U256::from(experiment_id), outcome, amount: amount.as_u256() }
                .abi_encode()
                .into(),
            kind: CallKind::Bet,
        }
    }

    /// Claim of the caller's share of a resolved bet pool.
    pub fn claim(addrs: &ContractAddresses, experiment_id: u64) -> Self {
        Self {
            to: addrs.funding,
            data: claimCall { id: U256::from(experiment_id) }.abi_encode().into(),
            kind: CallKind::Claim,
        }
    }

    /// Test-token faucet mint.
    pub fn mint(addrs: &ContractAddresses, to: Address, amount: TokenAmount) -> Self {
        Self {
            to: addrs.token,
            data: mintCall { to, amount: amount.as_u256() }.abi_encode().into(),
            kind: CallKind::Mint,
        }
    }
}

/// On-chain state of one experiment's pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    /// Total stablecoin deposited to the funding pool.
    pub deposited: TokenAmount,
    /// Total bet on outcome 0.
    pub bet0: TokenAmount,
    /// Total bet on outcome 1.
    pub bet1: TokenAmount,
    /// Resolved outcome index; meaningful only once `is_open` is false.
    pub outcome: u8,
    /// Whether the experiment still accepts deposits and bets.
    pub is_open: bool,
}

impl ExperimentInfo {
    /// Combined bet pool across both outcomes.
    pub fn total_pool(&self) -> TokenAmount {
        TokenAmount::from_base_units(self.bet0.base_units() + self.bet1.base_units())
    }

    /// Total stake on the winning outcome, if resolved.
    pub fn winning_pool(&self) -> Option<TokenAmount> {
        if self.is_open {
            return None;
        }
        match self.outcome {
            0 => Some(self.bet0),
            1 => Some(self.bet1),
            _ => None,
        }
    }
}

/// A user's on-chain position in one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    pub deposit: TokenAmount,
    pub bet0: TokenAmount,
    pub bet1: TokenAmount,
}

impl UserPosition {
    /// The user's stake on the given outcome.
    pub fn bet_on(&self, outcome: u8) -> TokenAmount {
        match outcome {
            0 => self.bet0,
            _ => self.bet1,
        }
    }
}

/// Client-side mirror of the contract's parimutuel payout:
/// `claimable = user_bet * total_pool / total_bet_on_outcome`.
///
/// Advisory display math only; the contract computes the real payout.
pub fn estimate_claimable(
    user_bet: TokenAmount,
    total_pool: TokenAmount,
    bet_on_outcome: TokenAmount,
) -> TokenAmount {
    if bet_on_outcome.is_zero() {
        return TokenAmount::ZERO;
    }
    // U256 intermediate: the product can overflow u128
    let claimable = user_bet.as_u256() * total_pool.as_u256() / bet_on_outcome.as_u256();
    TokenAmount::from_u256(claimable).unwrap_or(TokenAmount::ZERO)
}

/// Read-only query client for the funding contract.
#[derive(Debug, Clone)]
pub struct FundingContract {
    client: ChainClient,
    addrs: ContractAddresses,
}

impl FundingContract {
    pub fn new(client: ChainClient, addrs: ContractAddresses) -> Self {
        Self { client, addrs }
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addrs
    }

    /// Whether the underlying RPC is currently reachable.
    pub async fn is_healthy(&self) -> bool {
        self.client.is_healthy().await
    }

    /// Query an experiment's pool totals and status.
    pub async fn experiment_info(&self, experiment_id: u64) -> ChainResult<ExperimentInfo> {
        let call = getExperimentInfoCall { id: U256::from(experiment_id) };
        let out = self.read(self.addrs.funding, call.abi_encode()).await?;
        let ret = getExperimentInfoCall::abi_decode_returns(&out)
            .map_err(|e| ChainError::Rpc(format!("Undecodable getExperimentInfo result: {}", e)))?;
        Ok(ExperimentInfo {
            deposited: decode_amount(ret.deposited)?,
            bet0: decode_amount(ret.bet0)?,
            bet1: decode_amount(ret.bet1)?,
            outcome: ret.outcome,
            is_open: ret.isOpen,
        })
    }

    /// Query a user's deposits and bets for one experiment.
    pub async fn user_position(
        &self,
        experiment_id: u64,
        user: Address,
    ) -> ChainResult<UserPosition> {
        let call = getUserPositionCall { id: U256::from(experiment_id), user };
        let out = self.read(self.addrs.funding, call.abi_encode()).await?;
        let ret = getUserPositionCall::abi_decode_returns(&out)
            .map_err(|e| ChainError::Rpc(format!("Undecodable getUserPosition result: {}", e)))?;
        Ok(UserPosition {
            deposit: decode_amount(ret.deposit)?,
            bet0: decode_amount(ret.bet0)?,
            bet1: decode_amount(ret.bet1)?,
        })
    }

    /// Query the current allowance granted to the funding contract.
    pub async fn allowance(&self, owner: Address) -> ChainResult<TokenAmount> {
        let call = allowanceCall { owner, spender: self.addrs.funding };
        let out = self.read(self.addrs.token, call.abi_encode()).await?;
        let value = allowanceCall::abi_decode_returns(&out)
            .map_err(|e| ChainError::Rpc(format!("Undecodable allowance result: {}", e)))?;
        decode_amount(value)
    }

    /// Query a user's stablecoin balance.
    pub async fn balance_of(&self, account: Address) -> ChainResult<TokenAmount> {
        let call = balanceOfCall { account };
        let out = self.read(self.addrs.token, call.abi_encode()).await?;
        let value = balanceOfCall::abi_decode_returns(&out)
            .map_err(|e| ChainError::Rpc(format!("Undecodable balanceOf result: {}", e)))?;
        decode_amount(value)
    }

    async fn read(&self, to: Address, data: Vec<u8>) -> ChainResult<Bytes> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .input(TransactionInput::new(Bytes::from(data)));
        self.client.call(tx).await
    }
}

fn decode_amount(value: U256) -> ChainResult<TokenAmount> {
    TokenAmount::from_u256(value)
        .map_err(|_| ChainError::Rpc("Amount exceeds representable range".to_string()))
}

//! Experiment catalog types.

use serde::{Deserialize, Serialize};

use crate::blockchain::contract::{estimate_claimable, ExperimentInfo, UserPosition};
use crate::funding::amount::TokenAmount;

/// A listed experiment. Catalog metadata only; pool totals live on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: u64,
    pub title: String,
    pub summary: String,
    /// Display name of the lab or researcher behind the experiment.
    pub creator: String,
    pub funding_goal: TokenAmount,
    /// Labels for the two bet outcomes, e.g. ["replicates", "fails"].
    pub outcome_labels: [String; 2],
    pub image_url: Option<String>,
    /// Seconds since epoch.
    pub created_at: u64,
}

/// Request body for creating a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExperiment {
    pub title: String,
    pub summary: String,
    pub creator: String,
    /// Display USD, e.g. "2500" or "2500.00".
    pub funding_goal_usd: String,
    #[serde(default = "default_outcome_labels")]
    pub outcome_labels: [String; 2],
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_outcome_labels() -> [String; 2] {
    ["replicates".to_string(), "fails".to_string()]
}

/// Catalog entry merged with advisory on-chain totals.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentView {
    #[serde(flatten)]
    pub experiment: Experiment,
    pub funding_goal_usd: String,
    /// None while the chain is unreachable and nothing is cached.
    pub chain: Option<ChainTotals>,
}

/// On-chain totals shaped for display.
#[derive(Debug, Clone, Serialize)]
pub struct ChainTotals {
    pub deposited: TokenAmount,
    pub deposited_usd: String,
    pub bet0: TokenAmount,
    pub bet1: TokenAmount,
    pub total_pool_usd: String,
    pub outcome: u8,
    pub is_open: bool,
}

impl ChainTotals {
    pub fn from_info(info: &ExperimentInfo) -> Self {
        Self {
            deposited: info.deposited,
            deposited_usd: info.deposited.to_usd_string(),
            bet0: info.bet0,
            bet1: info.bet1,
            total_pool_usd: info.total_pool().to_usd_string(),
            outcome: info.outcome,
            is_open: info.is_open,
        }
    }
}

/// A user's position merged with the payout estimate.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub deposit: TokenAmount,
    pub deposit_usd: String,
    pub bet0: TokenAmount,
    pub bet1: TokenAmount,
    /// Estimated claim for the resolved outcome; zero while the experiment
    /// is open or the user backed the losing side.
    pub estimated_claimable: TokenAmount,
    pub estimated_claimable_usd: String,
}

impl PositionView {
    pub fn build(position: &UserPosition, info: Option<&ExperimentInfo>) -> Self {
        let estimated = info
            .and_then(|info| {
                info.winning_pool().map(|winning| {
                    estimate_claimable(position.bet_on(info.outcome), info.total_pool(), winning)
                })
            })
            .unwrap_or(TokenAmount::ZERO);

        Self {
            deposit: position.deposit,
            deposit_usd: position.deposit.to_usd_string(),
            bet0: position.bet0,
            bet1: position.bet1,
            estimated_claimable: estimated,
            estimated_claimable_usd: estimated.to_usd_string(),
        }
    }
}

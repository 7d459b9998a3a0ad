//! API route handlers.

use std::sync::Arc;

use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::funding::amount::TokenAmount;
use crate::funding::service::{FlowOutcome, FundOutcome, FundingService, WalletOverview};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::marketplace::types::{
    ChainTotals, Experiment, ExperimentView, NewExperiment, PositionView,
};

#[derive(Debug, Deserialize)]
pub struct FundRequest {
    /// Display USD, e.g. "50" or "50.25".
    pub amount_usd: String,
}

#[derive(Debug, Deserialize)]
pub struct BetRequest {
    pub outcome: u8,
    pub amount_usd: String,
}

fn parse_amount(usd: &str) -> Result<TokenAmount, ApiError> {
    TokenAmount::from_usd_str(usd).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn funding(state: &AppState) -> Result<&Arc<FundingService>, ApiError> {
    state
        .funding
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("chain integration is disabled"))
}

fn require_experiment(state: &AppState, id: u64) -> Result<Experiment, ApiError> {
    state
        .store
        .get(id)
        .ok_or_else(|| ApiError::not_found(format!("no experiment with id {id}")))
}

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let chain = match &state.funding {
        Some(service) => {
            if service.chain_healthy().await {
                "healthy"
            } else {
                "unreachable"
            }
        }
        None => "disabled",
    };
    Json(json!({ "status": "ok", "chain": chain, "experiments": state.store.count() }))
}

/// GET /api/experiments
pub async fn list_experiments(State(state): State<AppState>) -> Json<Vec<ExperimentView>> {
    // List serves catalog data only; per-experiment chain totals come from
    // the detail endpoint to keep this a single cheap read.
    let views = state
        .store
        .list()
        .into_iter()
        .map(|experiment| {
            let funding_goal_usd = experiment.funding_goal.to_usd_string();
            ExperimentView { experiment, funding_goal_usd, chain: None }
        })
        .collect();
    Json(views)
}

/// POST /api/experiments
pub async fn create_experiment(
    State(state): State<AppState>,
    Json(new): Json<NewExperiment>,
) -> Result<Json<Experiment>, ApiError> {
    if new.title.trim().is_empty() {
        return Err(ApiError::bad_request("title must not be empty"));
    }
    let goal = parse_amount(&new.funding_goal_usd)?;
    let experiment = state.store.create(new, goal);
    Ok(Json(experiment))
}

/// GET /api/experiments/{id}
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ExperimentView>, ApiError> {
    let experiment = require_experiment(&state, id)?;
    let funding_goal_usd = experiment.funding_goal.to_usd_string();

    let chain = match &state.funding {
        Some(service) => service.experiment_info(id).await.map(|info| ChainTotals::from_info(&info)),
        None => None,
    };

    Ok(Json(ExperimentView { experiment, funding_goal_usd, chain }))
}

/// GET /api/experiments/{id}/position/{address}
pub async fn get_position(
    State(state): State<AppState>,
    Path((id, address)): Path<(u64, String)>,
) -> Result<Json<PositionView>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;

    let user: Address = address
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{address}' is not an address")))?;

    let position = service.user_position(id, user).await?;
    let info = service.experiment_info(id).await;
    Ok(Json(PositionView::build(&position, info.as_ref())))
}

/// POST /api/experiments/{id}/fund
pub async fn fund(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<FundRequest>,
) -> Result<Json<FundOutcome>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;
    let amount = parse_amount(&req.amount_usd)?;

    let outcome = service.fund(id, amount).await?;
    Ok(Json(outcome))
}

/// POST /api/experiments/{id}/deposit/retry
pub async fn retry_deposit(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<FundOutcome>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;

    let outcome = service.retry_deposit(id).await?;
    Ok(Json(outcome))
}

/// POST /api/experiments/{id}/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<FundRequest>,
) -> Result<Json<FlowOutcome>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;
    let amount = parse_amount(&req.amount_usd)?;

    let outcome = service.withdraw(id, amount).await?;
    Ok(Json(outcome))
}

/// POST /api/experiments/{id}/bet
pub async fn place_bet(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<BetRequest>,
) -> Result<Json<FlowOutcome>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;
    if req.outcome > 1 {
        return Err(ApiError::bad_request("outcome must be 0 or 1"));
    }
    let amount = parse_amount(&req.amount_usd)?;

    let outcome = service.place_bet(id, req.outcome, amount).await?;
    Ok(Json(outcome))
}

/// POST /api/experiments/{id}/claim
pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<FlowOutcome>, ApiError> {
    require_experiment(&state, id)?;
    let service = funding(&state)?;

    let outcome = service.claim(id).await?;
    Ok(Json(outcome))
}

/// GET /api/wallet
pub async fn wallet(
    State(state): State<AppState>,
) -> Result<Json<WalletOverview>, ApiError> {
    let service = funding(&state)?;
    let overview = service.wallet_overview().await?;
    Ok(Json(overview))
}

/// POST /api/faucet/mint
pub async fn mint(
    State(state): State<AppState>,
    Json(req): Json<FundRequest>,
) -> Result<Json<FlowOutcome>, ApiError> {
    let service = funding(&state)?;
    let amount = parse_amount(&req.amount_usd)?;

    let outcome = service.mint(amount).await?;
    Ok(Json(outcome))
}

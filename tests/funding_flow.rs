//! End-to-end tests of the HTTP API with scripted chain collaborators.

mod common;

use std::sync::Arc;

use serde_json::Value;

use castlab::config::FundingConfig;
use castlab::funding::types::FundingError;

use common::{
    confirmed, create_experiment, ok_hash, spawn_app, spawn_catalog_only, ScriptedSubmitter,
    ScriptedWatcher, StuckWatcher,
};

#[tokio::test]
async fn test_healthz_reports_chain_mode() {
    let app = spawn_catalog_only().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/healthz", app.base_url)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain"], "disabled");
}

#[tokio::test]
async fn test_catalog_create_list_get() {
    let app = spawn_catalog_only().await;
    let client = reqwest::Client::new();

    let id = create_experiment(&client, &app.base_url).await;
    assert_eq!(id, 1);

    let res = client
        .get(format!("{}/api/experiments", app.base_url))
        .send()
        .await
        .unwrap();
    let listings: Vec<Value> = res.json().await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["title"], "Sleep and memory replication");
    assert_eq!(listings[0]["funding_goal_usd"], "2500.00");

    let res = client
        .get(format!("{}/api/experiments/{id}", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    // no chain data while the integration is disabled
    assert!(body["chain"].is_null());

    let res = client
        .get(format!("{}/api/experiments/999", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let app = spawn_catalog_only().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/experiments", app.base_url))
        .json(&serde_json::json!({
            "title": "  ",
            "summary": "",
            "creator": "x",
            "funding_goal_usd": "100",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .post(format!("{}/api/experiments", app.base_url))
        .json(&serde_json::json!({
            "title": "ok",
            "summary": "",
            "creator": "x",
            "funding_goal_usd": "12.3456789",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_funding_endpoints_answer_503_when_chain_disabled() {
    let app = spawn_catalog_only().await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/fund", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
}

#[tokio::test]
async fn test_fund_happy_path_completes() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![ok_hash(1), ok_hash(2)])),
        Arc::new(ScriptedWatcher::new(vec![confirmed(), confirmed()])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/fund", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["state"], "complete");
    assert_eq!(body["approval"]["is_confirmed"], true);
    assert_eq!(body["deposit"]["is_confirmed"], true);
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn test_deposit_failure_parks_then_retry_completes() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![ok_hash(1), ok_hash(2), ok_hash(3)])),
        Arc::new(ScriptedWatcher::new(vec![
            confirmed(),
            Err(FundingError::Reverted("deposit reverted".into())),
            confirmed(),
        ])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/fund", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["state"], "approved");
    assert_eq!(body["approval"]["is_confirmed"], true);
    assert!(body["error"].as_str().unwrap().contains("reverted"));

    let res = client
        .post(format!("{}/api/experiments/{id}/deposit/retry", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["state"], "complete");
}

#[tokio::test]
async fn test_retry_without_parked_attempt_conflicts() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/deposit/retry", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 409);
}

#[tokio::test]
async fn test_fund_validates_amount() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    for bad in ["abc", "-5", "1.2345678", ""] {
        let res = client
            .post(format!("{}/api/experiments/{id}/fund", app.base_url))
            .json(&serde_json::json!({ "amount_usd": bad }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "amount {bad:?} should be rejected");
    }

    let res = client
        .post(format!("{}/api/experiments/{id}/fund", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "0" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_fund_unknown_experiment_is_404() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/experiments/42/fund", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_claim_timeout_is_reported_in_outcome() {
    let config = FundingConfig {
        claim_timeout_secs: 1,
        ..FundingConfig::default()
    };
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![ok_hash(1)])),
        Arc::new(StuckWatcher),
        config,
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/claim", app.base_url))
        .send()
        .await
        .unwrap();
    // a timeout is a retryable step failure; it travels inside the outcome
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no confirmation"));
    // orphaned hash retained for reconciliation
    assert!(body["transaction"]["hash"].is_string());
}

#[tokio::test]
async fn test_bet_validates_outcome_index() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/bet", app.base_url))
        .json(&serde_json::json!({ "outcome": 2, "amount_usd": "10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_bet_and_withdraw_confirm() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![ok_hash(1), ok_hash(2)])),
        Arc::new(ScriptedWatcher::new(vec![confirmed(), confirmed()])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .post(format!("{}/api/experiments/{id}/bet", app.base_url))
        .json(&serde_json::json!({ "outcome": 0, "amount_usd": "10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["is_confirmed"], true);

    let res = client
        .post(format!("{}/api/experiments/{id}/withdraw", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["is_confirmed"], true);
}

#[tokio::test]
async fn test_mint_confirms() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![ok_hash(1)])),
        Arc::new(ScriptedWatcher::new(vec![confirmed()])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/faucet/mint", app.base_url))
        .json(&serde_json::json!({ "amount_usd": "1000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["is_confirmed"], true);
}

#[tokio::test]
async fn test_wallet_answers_503_without_reader() {
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/api/wallet", app.base_url)).send().await.unwrap();
    assert_eq!(res.status(), 503);
}

#[tokio::test]
async fn test_position_answers_503_without_reader() {
    // scripted services run without a contract reader, so position reads
    // surface the chain as unavailable
    let app = spawn_app(
        Arc::new(ScriptedSubmitter::new(vec![])),
        Arc::new(ScriptedWatcher::new(vec![])),
        FundingConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();
    let id = create_experiment(&client, &app.base_url).await;

    let res = client
        .get(format!(
            "{}/api/experiments/{id}/position/0x0000000000000000000000000000000000000001",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_catalog_only().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/healthz", app.base_url)).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

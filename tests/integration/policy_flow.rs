//! Policy evaluation through the facade and the engine task.

use std::time::Duration;
use tokio::time::Instant;

use payout_sentinel::config::EngineConfig;
use payout_sentinel::engine::service::spawn_engine;
use payout_sentinel::engine::{AcquisitionEngine, Command, Response};
use payout_sentinel::types::{AssetId, ErrorKind, Observation, PolicyOutcome, PolicyRequest};

use crate::mock_surface::MockPage;

fn engine(page: &MockPage) -> AcquisitionEngine<MockPage> {
    AcquisitionEngine::new(page.clone(), &EngineConfig::default())
}

async fn evaluate(page: &MockPage, req: PolicyRequest) -> PolicyOutcome {
    engine(page).evaluate_policy(&req).await
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reads_once() {
    let page = MockPage::new(&[("EUR/USD", Some(78.0))]);
    let out = evaluate(&page, PolicyRequest::new("cancel", 80.0, 10_000, 100)).await;

    assert!(!out.success);
    assert_eq!(out.error, Some(ErrorKind::BelowMinPayout));
    assert_eq!(out.payout, Some(78.0));
    assert_eq!(page.payout_reads(), 1);
    assert_eq!(page.clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_with_zero_budget_reads_once() {
    let page = MockPage::new(&[("EUR/USD", None)]);
    let out = evaluate(&page, PolicyRequest::new("wait", 80.0, 0, 100)).await;

    assert_eq!(out.error, Some(ErrorKind::TimeoutMinPayout));
    assert_eq!(out.last_observation, Some(Observation::NotFound));
    assert_eq!(page.payout_reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_respects_budget() {
    let page = MockPage::new(&[("EUR/USD", Some(72.0))]);
    let started = Instant::now();
    let out = evaluate(&page, PolicyRequest::new("wait", 80.0, 2_000, 800)).await;

    assert_eq!(out.error, Some(ErrorKind::TimeoutMinPayout));
    assert_eq!(out.last_observation, Some(Observation::BelowThreshold));
    assert!(started.elapsed() >= Duration::from_millis(2_000));
    // Reads at 0, 800, 1600, 2400.
    assert_eq!(page.payout_reads(), 4);
    assert_eq!(out.attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_picks_up_rising_payout() {
    let page = MockPage::new(&[("EUR/USD", Some(60.0))])
        .script_payouts(&[None, Some(70.0), Some(88.0)]);
    let out = evaluate(&page, PolicyRequest::new("wait", 85.0, 10_000, 500)).await;

    assert!(out.success);
    assert_eq!(out.payout, Some(88.0));
    assert_eq!(out.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_switch_keeps_qualifying_asset() {
    let page = MockPage::new(&[("EUR/USD", Some(90.0)), ("GBP/USD", Some(95.0))]);
    let out = evaluate(&page, PolicyRequest::new("switch", 90.0, 0, 100)).await;

    assert!(out.success);
    assert_eq!(out.payout, Some(90.0));
    assert!(out.asset.is_none());
    assert_eq!(page.clicks(), 0);
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_switch_takes_first_qualifying_candidate() {
    let page = MockPage::new(&[("A", Some(70.0)), ("B", Some(90.0)), ("C", Some(95.0))]);
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert!(out.success);
    assert_eq!(out.asset, Some(AssetId::from("B")));
    assert_eq!(out.payout, Some(90.0));
    assert_eq!(out.attempts, 3);
    assert_eq!(page.activations(), vec!["A", "B"]);
    assert_eq!(page.current_asset(), "B");
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_switch_exhausts_catalog() {
    let page = MockPage::new(&[("A", Some(60.0)), ("B", Some(70.0))]).transition_delay(2);
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert!(!out.success);
    assert_eq!(out.error, Some(ErrorKind::NoAssetMeetsMinPayout));
    assert_eq!(out.payout, Some(70.0));
    assert_eq!(out.attempts, 3);
    assert_eq!(page.activations(), vec!["A", "B"]);
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_switch_skips_candidate_that_fails_to_activate() {
    let page = MockPage::new(&[("A", Some(60.0)), ("B", Some(90.0))]).detached("A");
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert!(out.success, "{out}");
    assert_eq!(out.asset, Some(AssetId::from("B")));
    assert_eq!(out.payout, Some(90.0));
    assert_eq!(page.activations(), vec!["B"]);
    // Initial read plus B; A never got as far as a read.
    assert_eq!(out.attempts, 2);
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_switch_moves_past_unreadable_candidate() {
    let page = MockPage::new(&[("A", None), ("B", Some(90.0))]);
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert!(out.success);
    assert_eq!(out.asset, Some(AssetId::from("B")));
    assert_eq!(page.activations(), vec!["A", "B"]);
    assert_eq!(out.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_switch_reports_unreadable_last_candidate() {
    let page = MockPage::new(&[("A", Some(60.0)), ("B", None)]);
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert!(!out.success);
    assert_eq!(out.error, Some(ErrorKind::NoAssetMeetsMinPayout));
    assert_eq!(out.last_observation, Some(Observation::NotFound));
    assert!(out.payout.is_none());
    assert_eq!(page.activations(), vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_without_trigger() {
    let page = MockPage::new(&[("A", Some(60.0))]).without_trigger();
    let out = evaluate(&page, PolicyRequest::new("switch", 85.0, 0, 100)).await;

    assert_eq!(out.error, Some(ErrorKind::TriggerNotFound));
    assert_eq!(page.clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_switch_deadline_stops_walk() {
    let page = MockPage::new(&[("A", Some(60.0)), ("B", Some(61.0)), ("C", Some(62.0))]);
    let cfg = EngineConfig {
        switch_deadline_ms: Some(400),
        ..EngineConfig::default()
    };
    let mut engine = AcquisitionEngine::new(page.clone(), &cfg);
    let out = engine
        .evaluate_policy(&PolicyRequest::new("switch", 85.0, 0, 100))
        .await;

    assert_eq!(out.error, Some(ErrorKind::SwitchTimeout));
    assert_eq!(page.activations(), vec!["A"]);
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_policy_touches_nothing() {
    let page = MockPage::new(&[("A", Some(99.0))]);
    let out = evaluate(&page, PolicyRequest::new("martingale", 80.0, 0, 100)).await;

    assert_eq!(out.error, Some(ErrorKind::UnknownPolicy));
    assert_eq!(page.payout_reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_policy_via_engine_task() {
    let page = MockPage::new(&[("A", Some(70.0)), ("B", Some(92.0))]);
    let (handle, _task) = spawn_engine(engine(&page), 4);

    let cmd: Command = serde_json::from_str(
        r#"{"action":"CHECK_PAYOUT_BEFORE_ANALYSIS","policy":"switch","minPayout":90,"waitMs":0}"#,
    )
    .unwrap();
    let resp = handle.call(cmd).await.unwrap();

    let Response::Policy(out) = resp else {
        panic!("expected a policy outcome, got {resp:?}");
    };
    assert!(out.success);
    assert_eq!(out.asset, Some(AssetId::from("B")));

    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["strategy"], "switch");
    assert_eq!(json["asset"], "B");
    assert!(json.get("error").is_none());
}

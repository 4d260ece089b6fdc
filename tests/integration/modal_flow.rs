//! Modal and catalog commands through the facade.

use std::time::Duration;
use tokio::time::Instant;

use payout_sentinel::config::EngineConfig;
use payout_sentinel::engine::{AcquisitionEngine, Command};
use payout_sentinel::types::{AssetId, ErrorKind};

use crate::mock_surface::MockPage;

fn engine(page: &MockPage) -> AcquisitionEngine<MockPage> {
    AcquisitionEngine::new(page.clone(), &EngineConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_open_close_round_trip_with_slow_page() {
    let page = MockPage::new(&[("A", Some(80.0))]).transition_delay(3);
    let mut engine = engine(&page);

    let open = engine.open_modal().await;
    assert!(open.success);
    assert_eq!(open.action, Some("open"));
    assert!(engine.modal_status().await.is_open);

    let again = engine.open_modal().await;
    assert_eq!(again.action, Some("ALREADY_OPEN"));

    let close = engine.close_modal().await;
    assert_eq!(close.action, Some("close"));
    assert!(!engine.modal_status().await.is_open);
    assert_eq!(page.clicks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout() {
    let page = MockPage::new(&[("A", Some(80.0))]).unresponsive();
    let mut engine = engine(&page);
    let started = Instant::now();

    let resp = engine.open_modal().await;
    assert!(!resp.success);
    assert_eq!(resp.error, Some(ErrorKind::OpenTimeout));
    assert!(started.elapsed() >= Duration::from_millis(2_000));
    assert!(!engine.modal_status().await.is_open);
}

#[tokio::test(start_paused = true)]
async fn test_close_uses_escape_without_close_button() {
    let page = MockPage::new(&[("A", Some(80.0))])
        .modal_open()
        .without_close_button();
    let mut engine = engine(&page);

    let resp = engine.handle(Command::CloseAssetModal).await;
    assert!(resp.is_success());
    assert_eq!(page.keydowns(), 1);
    assert_eq!(page.clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_twice_returns_to_closed() {
    let page = MockPage::new(&[("A", Some(80.0))]);
    let mut engine = engine(&page);

    assert_eq!(engine.toggle_modal().await.action, Some("open"));
    assert_eq!(engine.toggle_modal().await.action, Some("close"));
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_list_assets_dedups_and_restores_closed_modal() {
    let page = MockPage::new(&[("X", None), ("X", None), ("Y", None)]);
    let mut engine = engine(&page);

    let resp = engine.list_assets().await;
    assert!(resp.success);
    assert_eq!(resp.assets, vec![AssetId::from("X"), AssetId::from("Y")]);
    assert_eq!(resp.count, 2);
    assert!(!page.is_modal_open());
}

#[tokio::test(start_paused = true)]
async fn test_list_assets_leaves_open_modal_open() {
    let page = MockPage::new(&[("X", None)]).modal_open();
    let mut engine = engine(&page);

    assert!(engine.list_assets().await.success);
    assert!(page.is_modal_open());
    assert_eq!(page.clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_list_assets_falls_back_without_trigger() {
    let page = MockPage::new(&[("X", None), ("Y", None)]).without_trigger();
    let mut engine = engine(&page);

    let resp = engine.list_assets().await;
    assert!(resp.success);
    assert_eq!(resp.count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_switch_asset_command() {
    let page = MockPage::new(&[("A", Some(70.0)), ("B", Some(90.0))]);
    let mut engine = engine(&page);

    let resp = engine.switch_asset(&AssetId::from("B")).await;
    assert!(resp.success);
    assert_eq!(resp.asset, Some(AssetId::from("B")));
    assert_eq!(page.current_asset(), "B");

    let missing = engine.switch_asset(&AssetId::from("Z")).await;
    assert_eq!(missing.error, Some(ErrorKind::AssetNotFound));
}

#[tokio::test(start_paused = true)]
async fn test_current_payout_command() {
    let page = MockPage::new(&[("A", Some(87.5))]);
    let engine = engine(&page);

    let resp = engine.get_current_payout().await;
    assert!(resp.success);
    assert_eq!(resp.payout, Some(87.5));
    assert_eq!(resp.probe.map(|p| p.as_str()), Some("structural"));
}

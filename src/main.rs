//! Payout Sentinel
//!
//! Entry point. Loads configuration, initialises structured logging,
//! attaches to the trading tab in a running Chromium, and serves engine
//! commands until Ctrl+C.
//!
//! `payout-sentinel probe-file <page.html>` runs the probe chain once over
//! a saved page instead and prints the reading as JSON.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use payout_sentinel::config;
use payout_sentinel::control::{self, routes::ControlState};
use payout_sentinel::engine::probe::ProbeChain;
use payout_sentinel::engine::service::spawn_engine;
use payout_sentinel::engine::AcquisitionEngine;
use payout_sentinel::surface::chromium::ChromiumSurface;
use payout_sentinel::surface::snapshot::SnapshotSurface;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => run_service().await,
        [mode, path] if mode == "probe-file" => probe_file(Path::new(path)).await,
        _ => bail!("usage: payout-sentinel [probe-file <page.html>]"),
    }
}

/// Attach to the browser and serve commands until Ctrl+C.
async fn run_service() -> Result<()> {
    let cfg = config::AppConfig::load(CONFIG_PATH)?;

    info!(
        devtools_url = %cfg.browser.devtools_url,
        page = %cfg.browser.page_url_contains,
        modal_attempts = cfg.engine.modal_attempts,
        modal_poll_ms = cfg.engine.modal_poll_ms,
        switch_deadline_ms = ?cfg.engine.switch_deadline_ms,
        "Payout Sentinel starting up"
    );

    let surface = ChromiumSurface::connect(&cfg.browser)
        .await
        .context("Failed to attach to the trading page")?;

    let engine = AcquisitionEngine::new(surface, &cfg.engine);
    let (handle, mut engine_task) = spawn_engine(engine, cfg.engine.command_queue);

    let control_task = if cfg.control.enabled {
        let state = Arc::new(ControlState::new(handle.clone()));
        Some(control::spawn_control(state, cfg.control.port).await?)
    } else {
        warn!("Control API disabled; engine reachable in-process only");
        None
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Engine ready. Press Ctrl+C to stop.");

    tokio::select! {
        res = &mut engine_task => {
            if let Err(e) = res {
                error!(error = %e, "Engine task ended unexpectedly");
            }
        }
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
    }

    if let Some(task) = control_task {
        task.abort();
    }
    drop(handle);
    engine_task.abort();

    info!("Payout Sentinel shut down cleanly.");
    Ok(())
}

/// Run the probe chain once over a saved page and print the reading.
async fn probe_file(path: &Path) -> Result<()> {
    let band = match config::AppConfig::load(CONFIG_PATH) {
        Ok(cfg) => cfg.engine.payout_band,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Using default payout band");
            Default::default()
        }
    };

    let surface = SnapshotSurface::from_file(path)?;
    info!(path = %path.display(), elements = surface.element_count(), "Loaded page snapshot");

    let chain = ProbeChain::standard(band);
    debug!(probes = ?chain.order(), "Probe order");
    let reading = chain.acquire(&surface).await;
    let json = match &reading {
        Ok(r) => serde_json::json!({ "success": true, "payout": r.value, "probe": r.source_probe, "rawText": r.raw_text }),
        Err(e) => serde_json::json!({ "success": false, "error": e.kind() }),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("payout_sentinel=info"));

    let json_logging = std::env::var("PAYOUT_SENTINEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

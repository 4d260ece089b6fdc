//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every engine setting has a default, so a file containing only the
//! `[browser]` table is enough to start.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::PayoutBand;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub browser: BrowserConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// Timing and validation knobs of the acquisition engine.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Observations made after a modal click before giving up.
    pub modal_attempts: u32,
    /// Delay between modal observations.
    pub modal_poll_ms: u64,
    /// Pause after activating a candidate asset before re-probing.
    pub switch_settle_ms: u64,
    /// Overall bound on one `switch` evaluation. Unset means every
    /// catalog entry is tried.
    pub switch_deadline_ms: Option<u64>,
    /// Percentages accepted as payout readings.
    pub payout_band: PayoutBand,
    /// Queue depth of the engine task.
    pub command_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            modal_attempts: 10,
            modal_poll_ms: 200,
            switch_settle_ms: 300,
            switch_deadline_ms: None,
            payout_band: PayoutBand::default(),
            command_queue: 32,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    /// DevTools HTTP endpoint of the running Chromium.
    pub devtools_url: String,
    /// Substring identifying the trading tab's URL.
    pub page_url_contains: String,
    /// Opened in a new tab when no existing tab matches.
    #[serde(default)]
    pub open_url: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 7171,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        config.engine.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.modal_attempts == 0 {
            bail!("engine.modal_attempts must be at least 1");
        }
        if self.modal_poll_ms == 0 {
            bail!("engine.modal_poll_ms must be positive");
        }
        let band = self.payout_band;
        if !(band.min > 0.0 && band.min <= band.max) {
            bail!("engine.payout_band must satisfy 0 < min <= max (got {band:?})");
        }
        if self.command_queue == 0 {
            bail!("engine.command_queue must be at least 1");
        }
        Ok(())
    }
}

//! Shared types for the payout sentinel.
//!
//! These types form the data model used across the probe chain, modal
//! controller, catalog enumerator, and policy evaluator. Everything here
//! lives for a single evaluation; nothing is retained between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Payout band
// ---------------------------------------------------------------------------

/// Lowest percentage accepted as a plausible payout.
pub const PAYOUT_MIN: f64 = 50.0;

/// Highest percentage accepted as a plausible payout.
pub const PAYOUT_MAX: f64 = 200.0;

/// Inclusive range of percentages treated as real payout readings.
///
/// Anything outside the band is a non-match, not an extreme value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutBand {
    pub min: f64,
    pub max: f64,
}

impl Default for PayoutBand {
    fn default() -> Self {
        Self {
            min: PAYOUT_MIN,
            max: PAYOUT_MAX,
        }
    }
}

impl PayoutBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

// ---------------------------------------------------------------------------
// Signal readings
// ---------------------------------------------------------------------------

/// Tag naming the probe strategy that produced a reading.
///
/// Diagnostic only: the chain never uses it to decide correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProbeId(pub &'static str);

impl ProbeId {
    pub const STRUCTURAL: ProbeId = ProbeId("structural");
    pub const ATTRIBUTE: ProbeId = ProbeId("attribute");
    pub const LEAF_SCAN: ProbeId = ProbeId("leaf-scan");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A validated payout reading taken from the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReading {
    /// Percentage value, always inside the configured payout band.
    pub value: f64,
    pub source_probe: ProbeId,
    /// Text of the node the value was parsed from.
    pub raw_text: String,
}

impl fmt::Display for SignalReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% via {}", self.value, self.source_probe)
    }
}

// ---------------------------------------------------------------------------
// Modal
// ---------------------------------------------------------------------------

/// State of the asset chooser modal.
///
/// `Opening` and `Closing` are never observed on the surface; they mark a
/// requested transition that has not been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModalState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for ModalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModalState::Closed => "closed",
            ModalState::Opening => "opening",
            ModalState::Open => "open",
            ModalState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// What a modal operation actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModalAction {
    Open,
    Close,
    AlreadyOpen,
    AlreadyClosed,
}

impl ModalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModalAction::Open => "open",
            ModalAction::Close => "close",
            ModalAction::AlreadyOpen => "ALREADY_OPEN",
            ModalAction::AlreadyClosed => "ALREADY_CLOSED",
        }
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Display identifier of a tradable instrument, e.g. `"EUR/USD OTC"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Policy request / outcome
// ---------------------------------------------------------------------------

/// Named strategy for reaching a qualifying payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Poll the current asset until the payout qualifies or time runs out.
    Wait,
    /// Walk the asset catalog until one qualifies.
    Switch,
    /// Single best-effort read, no waiting and no switching.
    Cancel,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Wait => "wait",
            Policy::Switch => "switch",
            Policy::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(Policy::Wait),
            "switch" => Ok(Policy::Switch),
            "cancel" => Ok(Policy::Cancel),
            other => Err(EngineError::UnknownPolicy(other.to_string())),
        }
    }
}

pub const DEFAULT_MIN_PAYOUT: f64 = 80.0;
pub const DEFAULT_WAIT_MS: u64 = 10_000;
pub const DEFAULT_POLL_MS: u64 = 800;

fn default_min_payout() -> f64 {
    DEFAULT_MIN_PAYOUT
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

fn default_poll_ms() -> u64 {
    DEFAULT_POLL_MS
}

/// Caller parameters for one policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    pub policy: String,
    #[serde(default = "default_min_payout")]
    pub min_payout: f64,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl PolicyRequest {
    pub fn new(policy: &str, min_payout: f64, wait_ms: u64, poll_ms: u64) -> Self {
        Self {
            policy: policy.to_string(),
            min_payout,
            wait_ms,
            poll_ms,
        }
    }

    /// Parse the policy name, then check the numeric constraints.
    ///
    /// The name is checked first so an unknown policy is always reported
    /// as such, whatever the other parameters are.
    pub fn validate(&self) -> Result<Policy, EngineError> {
        let policy: Policy = self.policy.parse()?;
        if self.min_payout.is_nan() || self.min_payout <= 0.0 {
            return Err(EngineError::InvalidRequest(format!(
                "minPayout must be positive, got {}",
                self.min_payout
            )));
        }
        if self.poll_ms == 0 {
            return Err(EngineError::InvalidRequest(
                "pollMs must be positive".to_string(),
            ));
        }
        Ok(policy)
    }
}

/// Why the last acquisition of a failed evaluation did not qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Observation {
    /// No probe produced an in-band reading.
    NotFound,
    /// A reading was found but it was under the minimum.
    BelowThreshold,
}

/// Result of one policy evaluation. Owned by the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetId>,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observation: Option<Observation>,
    /// Probe acquisitions performed during the evaluation.
    pub attempts: u32,
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyOutcome {
    pub fn qualified(strategy: &str, payout: f64, asset: Option<AssetId>, attempts: u32) -> Self {
        Self {
            success: true,
            payout: Some(payout),
            asset,
            strategy: strategy.to_string(),
            error: None,
            detail: None,
            last_observation: None,
            attempts,
            evaluated_at: Utc::now(),
        }
    }

    pub fn failed(strategy: &str, err: &EngineError, attempts: u32) -> Self {
        Self {
            success: false,
            payout: None,
            asset: None,
            strategy: strategy.to_string(),
            error: Some(err.kind()),
            detail: err.detail(),
            last_observation: None,
            attempts,
            evaluated_at: Utc::now(),
        }
    }

    /// Attach the last non-qualifying acquisition to a failure report.
    pub fn with_last(mut self, last: Option<&SignalReading>) -> Self {
        match last {
            Some(reading) => {
                self.payout = Some(reading.value);
                self.last_observation = Some(Observation::BelowThreshold);
            }
            None => {
                self.last_observation = Some(Observation::NotFound);
            }
        }
        self
    }
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "[{}] OK payout={:?}", self.strategy, self.payout)?;
            if let Some(asset) = &self.asset {
                write!(f, " asset={asset}")?;
            }
            Ok(())
        } else {
            write!(
                f,
                "[{}] FAILED {} after {} attempt(s)",
                self.strategy,
                self.error.map(|k| k.as_str()).unwrap_or("UNKNOWN"),
                self.attempts
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error tags surfaced to callers in the `error` field of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SignalNotFound,
    TriggerNotFound,
    NoSuitableElementFound,
    OpenTimeout,
    CloseTimeout,
    ModalNotOpen,
    NoAssetsFound,
    TimeoutMinPayout,
    NoAssetMeetsMinPayout,
    UnknownPolicy,
    BelowMinPayout,
    AssetNotFound,
    InvalidRequest,
    SwitchTimeout,
    EngineUnavailable,
    Fault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SignalNotFound => "SIGNAL_NOT_FOUND",
            ErrorKind::TriggerNotFound => "TRIGGER_NOT_FOUND",
            ErrorKind::NoSuitableElementFound => "NO_SUITABLE_ELEMENT_FOUND",
            ErrorKind::OpenTimeout => "OPEN_TIMEOUT",
            ErrorKind::CloseTimeout => "CLOSE_TIMEOUT",
            ErrorKind::ModalNotOpen => "MODAL_NOT_OPEN",
            ErrorKind::NoAssetsFound => "NO_ASSETS_FOUND",
            ErrorKind::TimeoutMinPayout => "TIMEOUT_MIN_PAYOUT",
            ErrorKind::NoAssetMeetsMinPayout => "NO_ASSET_MEETS_MIN_PAYOUT",
            ErrorKind::UnknownPolicy => "UNKNOWN_POLICY",
            ErrorKind::BelowMinPayout => "BELOW_MIN_PAYOUT",
            ErrorKind::AssetNotFound => "ASSET_NOT_FOUND",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::SwitchTimeout => "SWITCH_TIMEOUT",
            ErrorKind::EngineUnavailable => "ENGINE_UNAVAILABLE",
            ErrorKind::Fault => "FAULT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain errors raised inside the engine.
///
/// These never cross the facade boundary as `Err`; the facade turns each
/// one into a `{success: false, error}` envelope.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no probe produced an in-band payout reading")]
    SignalNotFound,

    #[error("modal trigger control not found")]
    TriggerNotFound,

    #[error("no close control or escape route available")]
    NoSuitableElementFound,

    #[error("modal did not open after {attempts} polls")]
    OpenTimeout { attempts: u32 },

    #[error("modal did not close after {attempts} polls")]
    CloseTimeout { attempts: u32 },

    #[error("asset modal is not open")]
    ModalNotOpen,

    #[error("asset list is empty")]
    NoAssetsFound,

    #[error("payout stayed below {min_payout}% for {wait_ms}ms")]
    TimeoutMinPayout { min_payout: f64, wait_ms: u64 },

    #[error("no asset in a catalog of {tried} reached {min_payout}%")]
    NoAssetMeetsMinPayout { min_payout: f64, tried: usize },

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("payout {payout}% is below {min_payout}%")]
    BelowMinPayout { payout: f64, min_payout: f64 },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("switch deadline of {deadline_ms}ms reached after {tried} candidate(s)")]
    SwitchTimeout { deadline_ms: u64, tried: usize },

    #[error("engine task is not running")]
    EngineUnavailable,

    #[error("surface fault: {0}")]
    Fault(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::SignalNotFound => ErrorKind::SignalNotFound,
            EngineError::TriggerNotFound => ErrorKind::TriggerNotFound,
            EngineError::NoSuitableElementFound => ErrorKind::NoSuitableElementFound,
            EngineError::OpenTimeout { .. } => ErrorKind::OpenTimeout,
            EngineError::CloseTimeout { .. } => ErrorKind::CloseTimeout,
            EngineError::ModalNotOpen => ErrorKind::ModalNotOpen,
            EngineError::NoAssetsFound => ErrorKind::NoAssetsFound,
            EngineError::TimeoutMinPayout { .. } => ErrorKind::TimeoutMinPayout,
            EngineError::NoAssetMeetsMinPayout { .. } => ErrorKind::NoAssetMeetsMinPayout,
            EngineError::UnknownPolicy(_) => ErrorKind::UnknownPolicy,
            EngineError::BelowMinPayout { .. } => ErrorKind::BelowMinPayout,
            EngineError::AssetNotFound(_) => ErrorKind::AssetNotFound,
            EngineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            EngineError::SwitchTimeout { .. } => ErrorKind::SwitchTimeout,
            EngineError::EngineUnavailable => ErrorKind::EngineUnavailable,
            EngineError::Fault(_) => ErrorKind::Fault,
        }
    }

    /// Free-form detail for the envelope; only faults and invalid
    /// requests carry one.
    pub fn detail(&self) -> Option<String> {
        match self {
            EngineError::Fault(msg) | EngineError::InvalidRequest(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Convert a surface failure into a fault at the step boundary.
    pub fn fault(err: anyhow::Error) -> Self {
        EngineError::Fault(format!("{err:#}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

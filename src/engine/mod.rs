//! Acquisition engine: probe → modal → catalog → policy.
//!
//! [`AcquisitionEngine`] is the only entry point callers use. Every
//! operation answers with a `{success, ...}` envelope; engine errors and
//! surface faults are folded into the envelope's `error` tag.

pub mod catalog;
pub mod modal;
pub mod policy;
pub mod probe;
pub mod service;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::surface::Surface;
use crate::types::{AssetId, EngineError, ErrorKind, ModalAction, PolicyOutcome, PolicyRequest, ProbeId};
use catalog::CatalogEnumerator;
use modal::{ModalBudget, ModalController};
use policy::{PolicyEvaluator, SwitchTiming};
use probe::ProbeChain;

// ---------------------------------------------------------------------------
// Commands and responses
// ---------------------------------------------------------------------------

/// Inbound command, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    GetCurrentPayout,
    CheckPayoutBeforeAnalysis(PolicyRequest),
    ListAssets,
    SwitchAsset { asset: AssetId },
    ToggleAssetModal,
    OpenAssetModal,
    CloseAssetModal,
    CheckModalStatus,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetCurrentPayout => "GET_CURRENT_PAYOUT",
            Command::CheckPayoutBeforeAnalysis(_) => "CHECK_PAYOUT_BEFORE_ANALYSIS",
            Command::ListAssets => "LIST_ASSETS",
            Command::SwitchAsset { .. } => "SWITCH_ASSET",
            Command::ToggleAssetModal => "TOGGLE_ASSET_MODAL",
            Command::OpenAssetModal => "OPEN_ASSET_MODAL",
            Command::CloseAssetModal => "CLOSE_ASSET_MODAL",
            Command::CheckModalStatus => "CHECK_MODAL_STATUS",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListResponse {
    pub success: bool,
    pub assets: Vec<AssetId>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Bare failure, for requests that never reached an operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub success: bool,
    pub error: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Payout(PayoutResponse),
    Policy(PolicyOutcome),
    Assets(AssetListResponse),
    Switch(SwitchResponse),
    Modal(ModalResponse),
    Status(StatusResponse),
    Failure(FailureResponse),
}

impl Response {
    pub fn failure(err: &EngineError) -> Self {
        Response::Failure(FailureResponse {
            success: false,
            error: err.kind(),
            detail: err.detail(),
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Payout(r) => r.success,
            Response::Policy(r) => r.success,
            Response::Assets(r) => r.success,
            Response::Switch(r) => r.success,
            Response::Modal(r) => r.success,
            Response::Status(r) => r.success,
            Response::Failure(_) => false,
        }
    }

    /// Error tag of a failed response.
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Response::Payout(r) => r.error,
            Response::Policy(r) => r.error,
            Response::Assets(r) => r.error,
            Response::Switch(r) => r.error,
            Response::Modal(r) => r.error,
            Response::Status(r) => r.error,
            Response::Failure(r) => Some(r.error),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the surface and the stateless components built over it.
pub struct AcquisitionEngine<S: Surface> {
    surface: S,
    chain: ProbeChain,
    modal: ModalController,
    catalog: CatalogEnumerator,
    timing: SwitchTiming,
}

impl<S: Surface> AcquisitionEngine<S> {
    pub fn new(surface: S, cfg: &EngineConfig) -> Self {
        Self {
            surface,
            chain: ProbeChain::standard(cfg.payout_band),
            modal: ModalController::new(ModalBudget::from_config(cfg)),
            catalog: CatalogEnumerator::default(),
            timing: SwitchTiming::from_config(cfg),
        }
    }

    pub async fn get_current_payout(&self) -> PayoutResponse {
        match self.chain.acquire(&self.surface).await {
            Ok(reading) => PayoutResponse {
                success: true,
                payout: Some(reading.value),
                probe: Some(reading.source_probe),
                error: None,
                detail: None,
            },
            Err(e) => PayoutResponse {
                success: false,
                payout: None,
                probe: None,
                error: Some(e.kind()),
                detail: e.detail(),
            },
        }
    }

    pub async fn evaluate_policy(&mut self, req: &PolicyRequest) -> PolicyOutcome {
        PolicyEvaluator::new(&self.surface, &self.chain, &mut self.modal, &self.catalog, self.timing)
            .evaluate(req)
            .await
    }

    /// List the catalog, opening the chooser when needed and closing it
    /// again if it was closed before. Falls back to a page-wide scan when
    /// the chooser has no trigger.
    pub async fn list_assets(&mut self) -> AssetListResponse {
        let listed = match self.modal.open(&self.surface).await {
            Ok(action) => {
                let listed = self.catalog.list(&self.surface, &mut self.modal).await;
                if action == ModalAction::Open {
                    if let Err(e) = self.modal.close(&self.surface).await {
                        error!(source = "engine", error = %e, "Could not restore closed modal");
                    }
                }
                listed
            }
            Err(EngineError::TriggerNotFound) => {
                info!(source = "engine", "No modal trigger, scanning page for assets");
                self.catalog.fallback_list(&self.surface).await
            }
            Err(e) => Err(e),
        };

        match listed {
            Ok(assets) => AssetListResponse {
                success: true,
                count: assets.len(),
                assets,
                error: None,
                detail: None,
            },
            Err(e) => AssetListResponse {
                success: false,
                assets: Vec::new(),
                count: 0,
                error: Some(e.kind()),
                detail: e.detail(),
            },
        }
    }

    pub async fn switch_asset(&mut self, asset: &AssetId) -> SwitchResponse {
        let switched = match self.modal.open(&self.surface).await {
            Ok(_) => self.catalog.activate(&self.surface, asset).await,
            Err(e) => Err(e),
        };

        match switched {
            Ok(()) => {
                info!(source = "engine", asset = %asset, "Switched asset");
                SwitchResponse {
                    success: true,
                    asset: Some(asset.clone()),
                    error: None,
                    detail: None,
                }
            }
            Err(e) => SwitchResponse {
                success: false,
                asset: None,
                error: Some(e.kind()),
                detail: e.detail(),
            },
        }
    }

    pub async fn toggle_modal(&mut self) -> ModalResponse {
        modal_response(self.modal.toggle(&self.surface).await)
    }

    pub async fn open_modal(&mut self) -> ModalResponse {
        modal_response(self.modal.open(&self.surface).await)
    }

    pub async fn close_modal(&mut self) -> ModalResponse {
        modal_response(self.modal.close(&self.surface).await)
    }

    pub async fn modal_status(&mut self) -> StatusResponse {
        match self.modal.is_open(&self.surface).await {
            Ok(is_open) => StatusResponse {
                success: true,
                is_open,
                error: None,
                detail: None,
            },
            Err(e) => StatusResponse {
                success: false,
                is_open: false,
                error: Some(e.kind()),
                detail: e.detail(),
            },
        }
    }

    /// Dispatch one inbound command.
    pub async fn handle(&mut self, command: Command) -> Response {
        let name = command.name();
        let response = match command {
            Command::GetCurrentPayout => Response::Payout(self.get_current_payout().await),
            Command::CheckPayoutBeforeAnalysis(req) => Response::Policy(self.evaluate_policy(&req).await),
            Command::ListAssets => Response::Assets(self.list_assets().await),
            Command::SwitchAsset { asset } => Response::Switch(self.switch_asset(&asset).await),
            Command::ToggleAssetModal => Response::Modal(self.toggle_modal().await),
            Command::OpenAssetModal => Response::Modal(self.open_modal().await),
            Command::CloseAssetModal => Response::Modal(self.close_modal().await),
            Command::CheckModalStatus => Response::Status(self.modal_status().await),
        };

        match response.error() {
            None => info!(source = "engine", command = name, "Command succeeded"),
            Some(kind) => info!(source = "engine", command = name, error = %kind, "Command failed"),
        }
        response
    }
}

fn modal_response(result: Result<ModalAction, EngineError>) -> ModalResponse {
    match result {
        Ok(action) => ModalResponse {
            success: true,
            action: Some(action.as_str()),
            error: None,
            detail: None,
        },
        Err(e) => ModalResponse {
            success: false,
            action: None,
            error: Some(e.kind()),
            detail: e.detail(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

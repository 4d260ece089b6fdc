//! Asset chooser modal controller.
//!
//! Drives the chooser through `Closed → Opening → Open → Closing → Closed`
//! by clicking and then polling the open indicator under a fixed budget.
//! `Opening`/`Closing` are held only between the click and the
//! confirmation; on timeout or fault the state falls back to the last
//! confirmed one.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::surface::selectors::{ESCAPE_KEY, MODAL_CLOSE, MODAL_OPEN_INDICATOR, MODAL_TRIGGER};
use crate::surface::{first_visible, Surface};
use crate::types::{EngineError, ModalAction, ModalState};

/// Poll budget for one open or close transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalBudget {
    pub attempts: u32,
    pub poll_interval: Duration,
}

impl Default for ModalBudget {
    fn default() -> Self {
        Self {
            attempts: 10,
            poll_interval: Duration::from_millis(200),
        }
    }
}

impl ModalBudget {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            attempts: cfg.modal_attempts,
            poll_interval: Duration::from_millis(cfg.modal_poll_ms),
        }
    }
}

pub struct ModalController {
    state: ModalState,
    budget: ModalBudget,
}

impl ModalController {
    pub fn new(budget: ModalBudget) -> Self {
        Self {
            state: ModalState::Closed,
            budget,
        }
    }

    /// Last confirmed (or in-flight) state.
    pub fn state(&self) -> ModalState {
        self.state
    }

    async fn observe(&self, surface: &dyn Surface) -> Result<bool, EngineError> {
        let indicator = first_visible(surface, &MODAL_OPEN_INDICATOR)
            .await
            .map_err(EngineError::fault)?;
        Ok(indicator.is_some())
    }

    /// Observe the surface and sync the stored state with it.
    pub async fn is_open(&mut self, surface: &dyn Surface) -> Result<bool, EngineError> {
        let open = self.observe(surface).await?;
        self.state = if open { ModalState::Open } else { ModalState::Closed };
        Ok(open)
    }

    /// Sleep then observe, up to the budget. `true` once the indicator
    /// matches `want_open`.
    async fn confirm(&self, surface: &dyn Surface, want_open: bool) -> Result<bool, EngineError> {
        for attempt in 1..=self.budget.attempts {
            tokio::time::sleep(self.budget.poll_interval).await;
            if self.observe(surface).await? == want_open {
                debug!(source = "modal", attempt, want_open, "Modal transition confirmed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn open(&mut self, surface: &dyn Surface) -> Result<ModalAction, EngineError> {
        if self.is_open(surface).await? {
            return Ok(ModalAction::AlreadyOpen);
        }

        let trigger = first_visible(surface, &MODAL_TRIGGER)
            .await
            .map_err(EngineError::fault)?;
        let Some(trigger) = trigger else {
            error!(source = "modal", "Modal trigger not found");
            return Err(EngineError::TriggerNotFound);
        };

        self.state = ModalState::Opening;
        debug!(source = "modal", node = %trigger, "Clicking modal trigger");

        let confirmed = match surface.click(trigger).await {
            Ok(()) => self.confirm(surface, true).await,
            Err(e) => Err(EngineError::fault(e)),
        };

        match confirmed {
            Ok(true) => {
                self.state = ModalState::Open;
                info!(source = "modal", "Asset modal opened");
                Ok(ModalAction::Open)
            }
            Ok(false) => {
                self.state = ModalState::Closed;
                error!(source = "modal", attempts = self.budget.attempts, "Timed out waiting for modal to open");
                Err(EngineError::OpenTimeout {
                    attempts: self.budget.attempts,
                })
            }
            Err(e) => {
                self.state = ModalState::Closed;
                error!(source = "modal", error = %e, "Modal open failed");
                Err(e)
            }
        }
    }

    pub async fn close(&mut self, surface: &dyn Surface) -> Result<ModalAction, EngineError> {
        if !self.is_open(surface).await? {
            return Ok(ModalAction::AlreadyClosed);
        }

        let close_btn = first_visible(surface, &MODAL_CLOSE)
            .await
            .map_err(EngineError::fault)?;

        self.state = ModalState::Closing;

        let dismissed = match close_btn {
            Some(node) => {
                debug!(source = "modal", node = %node, "Clicking modal close control");
                surface.click(node).await.map_err(EngineError::fault)
            }
            None => {
                debug!(source = "modal", "No close control, sending Escape");
                surface.dispatch_keydown(ESCAPE_KEY).await.map_err(|e| {
                    debug!(source = "modal", error = %e, "Escape dispatch failed");
                    EngineError::NoSuitableElementFound
                })
            }
        };

        let confirmed = match dismissed {
            Ok(()) => self.confirm(surface, false).await,
            Err(e) => Err(e),
        };

        match confirmed {
            Ok(true) => {
                self.state = ModalState::Closed;
                info!(source = "modal", "Asset modal closed");
                Ok(ModalAction::Close)
            }
            Ok(false) => {
                self.state = ModalState::Open;
                error!(source = "modal", attempts = self.budget.attempts, "Timed out waiting for modal to close");
                Err(EngineError::CloseTimeout {
                    attempts: self.budget.attempts,
                })
            }
            Err(e) => {
                self.state = ModalState::Open;
                error!(source = "modal", error = %e, "Modal close failed");
                Err(e)
            }
        }
    }

    /// Open when observed closed, close when observed open.
    pub async fn toggle(&mut self, surface: &dyn Surface) -> Result<ModalAction, EngineError> {
        if self.is_open(surface).await? {
            self.close(surface).await
        } else {
            self.open(surface).await
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

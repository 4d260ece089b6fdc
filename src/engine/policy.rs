//! Switching policy evaluator.
//!
//! Given a minimum payout, decides how to reach it:
//! - `cancel`: one acquisition, report what was seen
//! - `wait`: re-acquire on a fixed interval until the payout qualifies
//!   or the wait budget runs out
//! - `switch`: keep the current asset if it qualifies, otherwise walk the
//!   catalog in order until an asset does
//!
//! A reading qualifies when `value >= min_payout`.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::CatalogEnumerator;
use super::modal::ModalController;
use super::probe::ProbeChain;
use crate::config::EngineConfig;
use crate::surface::Surface;
use crate::types::{AssetId, EngineError, Policy, PolicyOutcome, PolicyRequest, SignalReading};

/// Timing of the `switch` policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchTiming {
    /// Pause after activating a candidate before acquiring.
    pub settle: Duration,
    /// Overall bound on one switch evaluation.
    pub deadline: Option<Duration>,
}

impl Default for SwitchTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            deadline: None,
        }
    }
}

impl SwitchTiming {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            settle: Duration::from_millis(cfg.switch_settle_ms),
            deadline: cfg.switch_deadline_ms.map(Duration::from_millis),
        }
    }
}

/// One policy evaluation over borrowed engine components.
pub struct PolicyEvaluator<'a> {
    surface: &'a dyn Surface,
    chain: &'a ProbeChain,
    modal: &'a mut ModalController,
    catalog: &'a CatalogEnumerator,
    timing: SwitchTiming,
    attempts: u32,
}

impl<'a> PolicyEvaluator<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        chain: &'a ProbeChain,
        modal: &'a mut ModalController,
        catalog: &'a CatalogEnumerator,
        timing: SwitchTiming,
    ) -> Self {
        Self {
            surface,
            chain,
            modal,
            catalog,
            timing,
            attempts: 0,
        }
    }

    /// Run the requested policy to completion. Failures are reported in
    /// the outcome, never as `Err`.
    pub async fn evaluate(mut self, req: &PolicyRequest) -> PolicyOutcome {
        let evaluation_id = Uuid::new_v4();

        let policy = match req.validate() {
            Ok(policy) => policy,
            Err(e) => {
                warn!(source = "policy", %evaluation_id, policy = %req.policy, error = %e, "Rejected policy request");
                return PolicyOutcome::failed(&req.policy, &e, 0);
            }
        };

        info!(
            source = "policy",
            %evaluation_id,
            policy = %policy,
            min_payout = req.min_payout,
            wait_ms = req.wait_ms,
            poll_ms = req.poll_ms,
            "Evaluating payout policy"
        );

        let outcome = match policy {
            Policy::Cancel => self.cancel(req.min_payout).await,
            Policy::Wait => self.wait(req.min_payout, req.wait_ms, req.poll_ms).await,
            Policy::Switch => self.switch(req.min_payout).await,
        };

        if outcome.success {
            info!(source = "policy", %evaluation_id, outcome = %outcome, "Policy satisfied");
        } else {
            warn!(source = "policy", %evaluation_id, outcome = %outcome, "Policy not satisfied");
        }
        outcome
    }

    async fn acquire(&mut self) -> Option<SignalReading> {
        self.attempts += 1;
        self.chain.acquire(self.surface).await.ok()
    }

    async fn cancel(&mut self, min_payout: f64) -> PolicyOutcome {
        let strategy = Policy::Cancel.as_str();
        match self.acquire().await {
            Some(r) if r.value >= min_payout => {
                PolicyOutcome::qualified(strategy, r.value, None, self.attempts)
            }
            Some(r) => {
                let err = EngineError::BelowMinPayout { payout: r.value, min_payout };
                PolicyOutcome::failed(strategy, &err, self.attempts).with_last(Some(&r))
            }
            None => PolicyOutcome::failed(strategy, &EngineError::SignalNotFound, self.attempts)
                .with_last(None),
        }
    }

    async fn wait(&mut self, min_payout: f64, wait_ms: u64, poll_ms: u64) -> PolicyOutcome {
        let strategy = Policy::Wait.as_str();
        let budget = Duration::from_millis(wait_ms);
        let interval = Duration::from_millis(poll_ms);
        let started = Instant::now();

        loop {
            let last = self.acquire().await;
            if let Some(r) = &last {
                if r.value >= min_payout {
                    return PolicyOutcome::qualified(strategy, r.value, None, self.attempts);
                }
            }

            if started.elapsed() >= budget {
                let err = EngineError::TimeoutMinPayout { min_payout, wait_ms };
                return PolicyOutcome::failed(strategy, &err, self.attempts).with_last(last.as_ref());
            }

            debug!(
                source = "policy",
                attempt = self.attempts,
                payout = ?last.as_ref().map(|r| r.value),
                "Payout below minimum, polling again"
            );
            tokio::time::sleep(interval).await;
        }
    }

    async fn switch(&mut self, min_payout: f64) -> PolicyOutcome {
        let strategy = Policy::Switch.as_str();
        let started = Instant::now();

        let mut last = self.acquire().await;
        if let Some(r) = &last {
            if r.value >= min_payout {
                return PolicyOutcome::qualified(strategy, r.value, None, self.attempts);
            }
        }

        let walked = self.walk_catalog(min_payout, started, &mut last).await;
        self.close_quietly().await;

        match walked {
            Ok((asset, reading)) => {
                PolicyOutcome::qualified(strategy, reading.value, Some(asset), self.attempts)
            }
            Err(e) => PolicyOutcome::failed(strategy, &e, self.attempts).with_last(last.as_ref()),
        }
    }

    async fn walk_catalog(
        &mut self,
        min_payout: f64,
        started: Instant,
        last: &mut Option<SignalReading>,
    ) -> Result<(AssetId, SignalReading), EngineError> {
        self.modal.open(self.surface).await?;
        let candidates = self.catalog.list(self.surface, self.modal).await?;
        info!(source = "policy", candidates = candidates.len(), "Current asset below minimum, switching");

        for (tried, asset) in candidates.iter().enumerate() {
            if let Some(deadline) = self.timing.deadline {
                if started.elapsed() >= deadline {
                    return Err(EngineError::SwitchTimeout {
                        deadline_ms: millis(deadline),
                        tried,
                    });
                }
            }

            if let Err(e) = self.activate_candidate(asset).await {
                warn!(source = "policy", asset = %asset, error = %e, "Could not activate candidate, skipping");
                continue;
            }
            tokio::time::sleep(self.timing.settle).await;

            *last = self.acquire().await;
            match last.as_ref() {
                Some(r) if r.value >= min_payout => {
                    info!(source = "policy", asset = %asset, payout = r.value, "Found qualifying asset");
                    return Ok((asset.clone(), r.clone()));
                }
                Some(r) => debug!(source = "policy", asset = %asset, payout = r.value, "Candidate below minimum"),
                None => debug!(source = "policy", asset = %asset, "No payout reading for candidate"),
            }
        }

        Err(EngineError::NoAssetMeetsMinPayout {
            min_payout,
            tried: candidates.len(),
        })
    }

    /// One attempt at making `asset` current: reopen the chooser if the
    /// last pick dismissed it, then click the entry.
    async fn activate_candidate(&mut self, asset: &AssetId) -> Result<(), EngineError> {
        self.modal.open(self.surface).await?;
        self.catalog.activate(self.surface, asset).await
    }

    async fn close_quietly(&mut self) {
        if let Err(e) = self.modal.close(self.surface).await {
            warn!(source = "policy", error = %e, "Could not close asset modal");
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

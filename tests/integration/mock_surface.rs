//! Mock trading page for integration testing.
//!
//! Provides a deterministic `Surface` implementation with an asset
//! chooser, per-asset payouts, and a payout cell, all in-memory. Modal
//! transitions can be delayed by a number of observations, and every
//! click, key press, and payout read is counted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use payout_sentinel::surface::{NodeHandle, Rect, SelectorSet, Surface};

const INDICATOR: u64 = 1;
const TRIGGER: u64 = 2;
const CLOSE: u64 = 3;
const PAYOUT_CELL: u64 = 10;
const FIRST_ENTRY: u64 = 100;

struct PageState {
    assets: Vec<(String, Option<f64>)>,
    current: usize,
    /// Payout values served before falling back to the current asset's.
    script: VecDeque<Option<f64>>,
    /// Value displayed in the payout cell since the last read.
    shown: Option<f64>,
    modal_open: bool,
    /// Target state and observations left before it becomes visible.
    pending: Option<(bool, u32)>,
    delay: u32,
    has_trigger: bool,
    has_close_button: bool,
    responsive: bool,
    /// Entries whose click fails as if the node went away.
    detached: Vec<String>,
    clicks: usize,
    keydowns: usize,
    payout_reads: usize,
    activations: Vec<String>,
}

/// A scripted page. Clones share state, so tests keep one clone for
/// inspection while the engine owns another.
#[derive(Clone)]
pub struct MockPage {
    state: Arc<Mutex<PageState>>,
}

impl MockPage {
    /// A page showing `assets` (name, payout) with the first one active.
    pub fn new(assets: &[(&str, Option<f64>)]) -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                assets: assets.iter().map(|(n, p)| (n.to_string(), *p)).collect(),
                current: 0,
                script: VecDeque::new(),
                shown: None,
                modal_open: false,
                pending: None,
                delay: 0,
                has_trigger: true,
                has_close_button: true,
                responsive: true,
                detached: Vec::new(),
                clicks: 0,
                keydowns: 0,
                payout_reads: 0,
                activations: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PageState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Serve these payout values on successive reads, repeating the last.
    pub fn script_payouts(self, values: &[Option<f64>]) -> Self {
        self.with(|s| s.script = values.iter().copied().collect());
        self
    }

    /// Modal transitions become visible after `n` extra observations.
    pub fn transition_delay(self, n: u32) -> Self {
        self.with(|s| s.delay = n);
        self
    }

    pub fn without_trigger(self) -> Self {
        self.with(|s| s.has_trigger = false);
        self
    }

    pub fn without_close_button(self) -> Self {
        self.with(|s| s.has_close_button = false);
        self
    }

    /// Ignore clicks and key presses on modal controls.
    pub fn unresponsive(self) -> Self {
        self.with(|s| s.responsive = false);
        self
    }

    /// Clicking this entry fails with a surface error.
    pub fn detached(self, asset: &str) -> Self {
        self.with(|s| s.detached.push(asset.to_string()));
        self
    }

    pub fn modal_open(self) -> Self {
        self.with(|s| s.modal_open = true);
        self
    }

    pub fn clicks(&self) -> usize {
        self.with(|s| s.clicks)
    }

    pub fn keydowns(&self) -> usize {
        self.with(|s| s.keydowns)
    }

    pub fn payout_reads(&self) -> usize {
        self.with(|s| s.payout_reads)
    }

    pub fn activations(&self) -> Vec<String> {
        self.with(|s| s.activations.clone())
    }

    pub fn current_asset(&self) -> String {
        self.with(|s| s.assets[s.current].0.clone())
    }

    pub fn is_modal_open(&self) -> bool {
        self.with(|s| s.modal_open)
    }
}

impl PageState {
    fn schedule(&mut self, open: bool) {
        if self.responsive {
            self.pending = Some((open, self.delay));
        }
    }

    fn observe(&mut self) -> bool {
        if let Some((target, left)) = self.pending {
            if left == 0 {
                self.modal_open = target;
                self.pending = None;
            } else {
                self.pending = Some((target, left - 1));
            }
        }
        self.modal_open
    }

    fn current_payout(&mut self) -> Option<f64> {
        match self.script.len() {
            0 => self.assets.get(self.current).and_then(|(_, p)| *p),
            1 => self.script[0],
            _ => self.script.pop_front().flatten(),
        }
    }

    fn entries(&self) -> Vec<NodeHandle> {
        (0..self.assets.len() as u64)
            .map(|i| NodeHandle(FIRST_ENTRY + i))
            .collect()
    }

    fn entry(&self, node: NodeHandle) -> Result<usize> {
        let index = node
            .0
            .checked_sub(FIRST_ENTRY)
            .ok_or_else(|| anyhow!("unknown node {node}"))? as usize;
        if index < self.assets.len() {
            Ok(index)
        } else {
            Err(anyhow!("unknown node {node}"))
        }
    }
}

#[async_trait]
impl Surface for MockPage {
    async fn query_all(&self, set: &SelectorSet) -> Result<Vec<NodeHandle>> {
        Ok(self.with(|s| match set.name {
            "payout-structural" => {
                s.payout_reads += 1;
                s.shown = s.current_payout();
                if s.shown.is_some() {
                    vec![NodeHandle(PAYOUT_CELL)]
                } else {
                    vec![]
                }
            }
            "modal-open-indicator" => {
                if s.observe() {
                    vec![NodeHandle(INDICATOR)]
                } else {
                    vec![]
                }
            }
            "modal-trigger" if s.has_trigger => vec![NodeHandle(TRIGGER)],
            "modal-close" if s.has_close_button => vec![NodeHandle(CLOSE)],
            "asset-entries" if s.modal_open => s.entries(),
            "asset-fallback" => s.entries(),
            _ => vec![],
        }))
    }

    async fn click(&self, node: NodeHandle) -> Result<()> {
        self.with(|s| {
            s.clicks += 1;
            match node.0 {
                TRIGGER => s.schedule(true),
                CLOSE => s.schedule(false),
                _ => {
                    let index = s.entry(node)?;
                    if s.detached.contains(&s.assets[index].0) {
                        return Err(anyhow!("entry detached"));
                    }
                    s.current = index;
                    s.script.clear();
                    s.activations.push(s.assets[index].0.clone());
                    // Picking an asset dismisses the chooser.
                    s.modal_open = false;
                    s.pending = None;
                }
            }
            Ok(())
        })
    }

    async fn bounding_rect(&self, _node: NodeHandle) -> Result<Rect> {
        Ok(Rect::new(0.0, 0.0, 120.0, 24.0))
    }

    async fn text_of(&self, node: NodeHandle) -> Result<String> {
        self.with(|s| match node.0 {
            PAYOUT_CELL => s
                .shown
                .map(|v| format!("+{v}%"))
                .ok_or_else(|| anyhow!("payout cell is empty")),
            _ => Ok(s.assets[s.entry(node)?].0.clone()),
        })
    }

    async fn attribute(&self, _node: NodeHandle, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn leaf_texts(&self, _set: &SelectorSet, _needle: &str, _max_len: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn dispatch_keydown(&self, key: &str) -> Result<()> {
        self.with(|s| {
            s.keydowns += 1;
            if key == "Escape" {
                s.schedule(false);
            }
        });
        Ok(())
    }
}

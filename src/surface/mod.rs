//! Surface capability.
//!
//! Defines the `Surface` trait, the only I/O boundary of the engine,
//! and provides implementations for:
//! - Chromium: a live trading page driven over the DevTools protocol
//! - Snapshot: a saved HTML document, read-only
//!
//! The engine never locates elements itself; it asks for a named
//! `SelectorSet` and works with opaque node handles.

pub mod chromium;
pub mod selectors;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque reference to an element on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Elements with no area are rendered hidden.
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// A named, ordered list of alternative selectors for one kind of element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSet {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Abstraction over the page the engine reads from and clicks on.
///
/// Implementors only perform primitive reads and actions; every decision
/// lives in the engine. Any implementation satisfying the contract (live
/// browser, snapshot, test fixture) is interchangeable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Surface: Send + Sync {
    /// Try the set's selectors in order and return the matches of the
    /// first selector that matches anything. Empty when none match.
    async fn query_all(&self, set: &SelectorSet) -> Result<Vec<NodeHandle>>;

    /// Activate the element as a user click would.
    async fn click(&self, node: NodeHandle) -> Result<()>;

    /// Current layout box; zero-sized when the element is hidden.
    async fn bounding_rect(&self, node: NodeHandle) -> Result<Rect>;

    /// Full text content of the element.
    async fn text_of(&self, node: NodeHandle) -> Result<String>;

    /// Attribute value, if present.
    async fn attribute(&self, node: NodeHandle, name: &str) -> Result<Option<String>>;

    /// Trimmed texts of the set's leaf matches (no child elements) that
    /// contain `needle` and are shorter than `max_len` characters.
    ///
    /// One batched read over the first selector that matches anything.
    /// Matches are not tagged and get no handles.
    async fn leaf_texts(&self, set: &SelectorSet, needle: &str, max_len: usize) -> Result<Vec<String>>;

    /// Dispatch a keydown event on the document.
    async fn dispatch_keydown(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: Surface + ?Sized> Surface for Arc<T> {
    async fn query_all(&self, set: &SelectorSet) -> Result<Vec<NodeHandle>> {
        (**self).query_all(set).await
    }

    async fn click(&self, node: NodeHandle) -> Result<()> {
        (**self).click(node).await
    }

    async fn bounding_rect(&self, node: NodeHandle) -> Result<Rect> {
        (**self).bounding_rect(node).await
    }

    async fn text_of(&self, node: NodeHandle) -> Result<String> {
        (**self).text_of(node).await
    }

    async fn attribute(&self, node: NodeHandle, name: &str) -> Result<Option<String>> {
        (**self).attribute(node, name).await
    }

    async fn leaf_texts(&self, set: &SelectorSet, needle: &str, max_len: usize) -> Result<Vec<String>> {
        (**self).leaf_texts(set, needle, max_len).await
    }

    async fn dispatch_keydown(&self, key: &str) -> Result<()> {
        (**self).dispatch_keydown(key).await
    }
}

/// First element of the set that currently has a visible layout box.
pub async fn first_visible(surface: &dyn Surface, set: &SelectorSet) -> Result<Option<NodeHandle>> {
    for node in surface.query_all(set).await? {
        if surface.bounding_rect(node).await?.is_visible() {
            return Ok(Some(node));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

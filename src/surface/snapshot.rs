//! Read-only surface over a saved HTML document.
//!
//! Used for offline diagnostics (`probe-file`) and for probe tests with
//! real markup. Layout is not available, so visibility is approximated
//! from the `hidden` attribute and inline `display:none` on the element
//! or any ancestor. Clicks and key events are rejected.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::{NodeHandle, Rect, SelectorSet, Surface};

/// Owned copy of everything the engine may read from one element.
#[derive(Debug, Clone)]
struct SnapshotNode {
    text: String,
    attrs: HashMap<String, String>,
    children: usize,
    visible: bool,
}

/// A parsed HTML snapshot.
///
/// Node handles are positions in document order, so they are stable for
/// the lifetime of the snapshot.
pub struct SnapshotSurface {
    html: String,
    nodes: Vec<SnapshotNode>,
}

impl SnapshotSurface {
    pub fn from_html(html: impl Into<String>) -> Self {
        let html = html.into();
        let doc = Html::parse_document(&html);
        let nodes = elements(&doc)
            .into_iter()
            .map(|el| SnapshotNode {
                text: el.text().collect(),
                attrs: el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                children: el.children().filter_map(ElementRef::wrap).count(),
                visible: is_rendered(el),
            })
            .collect();
        Self { html, nodes }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Ok(Self::from_html(html))
    }

    /// Number of elements in the document.
    pub fn element_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, handle: NodeHandle) -> Result<&SnapshotNode> {
        self.nodes
            .get(handle.0 as usize)
            .ok_or_else(|| anyhow!("node {handle} not in snapshot"))
    }
}

/// All elements in document order.
fn elements(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn hides_itself(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    value
        .attr("style")
        .map(|style| {
            let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            compact.contains("display:none") || compact.contains("visibility:hidden")
        })
        .unwrap_or(false)
}

fn is_rendered(el: ElementRef<'_>) -> bool {
    if hides_itself(&el) {
        return false;
    }
    !el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| hides_itself(&a))
}

impl SnapshotSurface {
    /// Handles of the first selector in `set` that matches anything.
    ///
    /// The parsed tree is not `Send`, so each query parses the stored
    /// document again and maps matches back to document positions.
    fn select(&self, set: &SelectorSet) -> Vec<NodeHandle> {
        let doc = Html::parse_document(&self.html);
        let positions: HashMap<_, usize> = elements(&doc)
            .into_iter()
            .enumerate()
            .map(|(pos, el)| (el.id(), pos))
            .collect();

        for raw in set.selectors {
            let selector = match Selector::parse(raw) {
                Ok(s) => s,
                Err(_) => {
                    debug!(selector = raw, set = set.name, "Skipping unparseable selector");
                    continue;
                }
            };
            let matched: Vec<NodeHandle> = doc
                .select(&selector)
                .filter_map(|el| positions.get(&el.id()))
                .map(|&pos| NodeHandle(pos as u64))
                .collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        Vec::new()
    }
}

#[async_trait]
impl Surface for SnapshotSurface {
    async fn query_all(&self, set: &SelectorSet) -> Result<Vec<NodeHandle>> {
        Ok(self.select(set))
    }

    async fn click(&self, node: NodeHandle) -> Result<()> {
        bail!("snapshot surface is read-only (click {node})")
    }

    async fn bounding_rect(&self, node: NodeHandle) -> Result<Rect> {
        let visible = self.node(node)?.visible;
        Ok(if visible {
            Rect::new(0.0, 0.0, 1.0, 1.0)
        } else {
            Rect::default()
        })
    }

    async fn text_of(&self, node: NodeHandle) -> Result<String> {
        Ok(self.node(node)?.text.clone())
    }

    async fn attribute(&self, node: NodeHandle, name: &str) -> Result<Option<String>> {
        Ok(self.node(node)?.attrs.get(name).cloned())
    }

    async fn leaf_texts(&self, set: &SelectorSet, needle: &str, max_len: usize) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for handle in self.select(set) {
            let node = self.node(handle)?;
            if node.children > 0 {
                continue;
            }
            let text = node.text.trim();
            if text.contains(needle) && text.chars().count() < max_len {
                texts.push(text.to_string());
            }
        }
        Ok(texts)
    }

    async fn dispatch_keydown(&self, key: &str) -> Result<()> {
        bail!("snapshot surface is read-only (keydown {key})")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

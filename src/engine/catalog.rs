//! Asset catalog enumeration.
//!
//! Lists the instruments shown in the open chooser and activates one of
//! them by identifier.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::modal::ModalController;
use crate::surface::selectors::{ASSET_ENTRIES, ASSET_FALLBACK};
use crate::surface::{NodeHandle, SelectorSet, Surface};
use crate::types::{AssetId, EngineError};

/// Attributes that carry a stable identifier, most preferred first.
const ID_ATTRIBUTES: [&str; 2] = ["data-asset", "data-symbol"];

pub struct CatalogEnumerator {
    entries: SelectorSet,
    fallback: SelectorSet,
}

impl Default for CatalogEnumerator {
    fn default() -> Self {
        Self {
            entries: ASSET_ENTRIES,
            fallback: ASSET_FALLBACK,
        }
    }
}

impl CatalogEnumerator {
    /// Ordered, de-duplicated identifiers from the open chooser.
    ///
    /// Never opens the chooser itself.
    pub async fn list(
        &self,
        surface: &dyn Surface,
        modal: &mut ModalController,
    ) -> Result<Vec<AssetId>, EngineError> {
        if !modal.is_open(surface).await? {
            return Err(EngineError::ModalNotOpen);
        }
        let assets = self.collect(surface, &self.entries).await?;
        info!(source = "catalog", count = assets.len(), "Listed assets");
        Ok(assets)
    }

    /// Scan asset-like nodes anywhere on the page, without the chooser.
    pub async fn fallback_list(&self, surface: &dyn Surface) -> Result<Vec<AssetId>, EngineError> {
        let assets = self.collect(surface, &self.fallback).await?;
        info!(source = "catalog", count = assets.len(), "Listed assets from page fallback");
        Ok(assets)
    }

    /// Click the first chooser entry whose identifier equals `asset`.
    pub async fn activate(&self, surface: &dyn Surface, asset: &AssetId) -> Result<(), EngineError> {
        let nodes = surface
            .query_all(&self.entries)
            .await
            .map_err(EngineError::fault)?;

        for node in nodes {
            if identify(surface, node).await?.as_ref() == Some(asset) {
                debug!(source = "catalog", asset = %asset, node = %node, "Activating asset");
                surface.click(node).await.map_err(EngineError::fault)?;
                return Ok(());
            }
        }

        warn!(source = "catalog", asset = %asset, "Asset not present in catalog");
        Err(EngineError::AssetNotFound(asset.to_string()))
    }

    async fn collect(&self, surface: &dyn Surface, set: &SelectorSet) -> Result<Vec<AssetId>, EngineError> {
        let nodes = surface.query_all(set).await.map_err(EngineError::fault)?;
        if nodes.is_empty() {
            return Err(EngineError::NoAssetsFound);
        }

        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            match identify(surface, node).await? {
                Some(id) => ids.push(id),
                None => debug!(source = "catalog", node = %node, "Entry has no identifier"),
            }
        }

        let assets = dedup_ordered(ids);
        if assets.is_empty() {
            return Err(EngineError::NoAssetsFound);
        }
        Ok(assets)
    }
}

/// Identifier of one entry: identifier attributes first, then its text.
async fn identify(surface: &dyn Surface, node: NodeHandle) -> Result<Option<AssetId>, EngineError> {
    for name in ID_ATTRIBUTES {
        let value = surface
            .attribute(node, name)
            .await
            .map_err(EngineError::fault)?;
        if let Some(value) = value {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Some(AssetId::new(value)));
            }
        }
    }

    let text = surface.text_of(node).await.map_err(EngineError::fault)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| AssetId::new(text)))
}

/// Drop repeats, keeping the first occurrence of each identifier.
fn dedup_ordered(ids: Vec<AssetId>) -> Vec<AssetId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

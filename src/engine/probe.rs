//! Probe chain: payout extraction from the surface.
//!
//! Tries a ranked list of independent strategies and returns the first
//! reading that falls inside the payout band. Higher-ranked probes encode
//! more structural confidence, so readings are never averaged or compared
//! across probes.
//!
//! Order:
//! 1. Structural: the payout value cell of the trade panel
//! 2. Attribute: payout/profit classes, ids and test ids
//! 3. Leaf scan: every short leaf text containing `%`

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::surface::selectors::{LEAF_CANDIDATES, PAYOUT_ATTRIBUTE, PAYOUT_STRUCTURAL};
use crate::surface::{NodeHandle, SelectorSet, Surface};
use crate::types::{EngineError, PayoutBand, ProbeId, SignalReading};

/// Leaf texts this long or longer are prose, not a payout label.
const LEAF_TEXT_MAX_LEN: usize = 50;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn percent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(\d{1,3})(?:[.,](\d{1,2}))?\s*%").expect("payout pattern is valid")
    })
}

/// Extract the first in-band percentage from `text`.
///
/// Accepts `85%`, `85.5 %`, `87,25%`. A comma is a decimal separator.
/// Out-of-band matches are skipped, not clamped.
pub fn parse_percentage(text: &str, band: &PayoutBand) -> Option<f64> {
    percent_pattern().captures_iter(text).find_map(|caps| {
        let int = caps.get(1)?.as_str();
        let value: f64 = match caps.get(2) {
            Some(frac) => format!("{int}.{}", frac.as_str()).parse().ok()?,
            None => int.parse().ok()?,
        };
        band.contains(value).then_some(value)
    })
}

// ---------------------------------------------------------------------------
// Probe trait and strategies
// ---------------------------------------------------------------------------

/// One strategy for locating and parsing the payout.
#[async_trait]
pub trait Probe: Send + Sync {
    fn id(&self) -> ProbeId;

    /// Read-only attempt. `Ok(None)` when nothing in band was found.
    async fn probe(&self, surface: &dyn Surface, band: &PayoutBand) -> Result<Option<SignalReading>>;
}

/// Parse each node's text in order; first in-band value wins.
async fn first_reading(
    surface: &dyn Surface,
    nodes: &[NodeHandle],
    band: &PayoutBand,
    id: ProbeId,
) -> Result<Option<SignalReading>> {
    for &node in nodes {
        let text = surface.text_of(node).await?;
        if let Some(value) = parse_percentage(&text, band) {
            return Ok(Some(SignalReading {
                value,
                source_probe: id,
                raw_text: text.trim().to_string(),
            }));
        }
    }
    Ok(None)
}

/// Highest-confidence locator: the value cell of the trade panel.
pub struct StructuralProbe;

#[async_trait]
impl Probe for StructuralProbe {
    fn id(&self) -> ProbeId {
        ProbeId::STRUCTURAL
    }

    async fn probe(&self, surface: &dyn Surface, band: &PayoutBand) -> Result<Option<SignalReading>> {
        let nodes = surface.query_all(&PAYOUT_STRUCTURAL).await?;
        first_reading(surface, &nodes, band, self.id()).await
    }
}

/// Class/attribute containers, one selector set at a time.
///
/// Falls back to the `title` attribute for nodes whose text is empty or
/// unparseable (tooltips often carry the full value).
pub struct SelectorProbe {
    sets: &'static [SelectorSet],
}

impl SelectorProbe {
    pub fn new(sets: &'static [SelectorSet]) -> Self {
        Self { sets }
    }
}

impl Default for SelectorProbe {
    fn default() -> Self {
        Self::new(PAYOUT_ATTRIBUTE)
    }
}

#[async_trait]
impl Probe for SelectorProbe {
    fn id(&self) -> ProbeId {
        ProbeId::ATTRIBUTE
    }

    async fn probe(&self, surface: &dyn Surface, band: &PayoutBand) -> Result<Option<SignalReading>> {
        for set in self.sets {
            let nodes = surface.query_all(set).await?;
            if let Some(reading) = first_reading(surface, &nodes, band, self.id()).await? {
                return Ok(Some(reading));
            }
            for &node in &nodes {
                if let Some(title) = surface.attribute(node, "title").await? {
                    if let Some(value) = parse_percentage(&title, band) {
                        return Ok(Some(SignalReading {
                            value,
                            source_probe: self.id(),
                            raw_text: title,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Last resort: scan every leaf element for a short `%` text.
pub struct LeafScanProbe;

#[async_trait]
impl Probe for LeafScanProbe {
    fn id(&self) -> ProbeId {
        ProbeId::LEAF_SCAN
    }

    async fn probe(&self, surface: &dyn Surface, band: &PayoutBand) -> Result<Option<SignalReading>> {
        let texts = surface
            .leaf_texts(&LEAF_CANDIDATES, "%", LEAF_TEXT_MAX_LEN)
            .await?;

        let examined = texts.len();
        for text in texts {
            if let Some(value) = parse_percentage(&text, band) {
                return Ok(Some(SignalReading {
                    value,
                    source_probe: self.id(),
                    raw_text: text,
                }));
            }
        }

        debug!(source = "probe-chain", examined, "Leaf scan found no payout");
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Ranked list of probes; first valid reading wins.
pub struct ProbeChain {
    probes: Vec<Box<dyn Probe>>,
    band: PayoutBand,
}

impl ProbeChain {
    /// Chain with a custom preference order.
    pub fn new(probes: Vec<Box<dyn Probe>>, band: PayoutBand) -> Self {
        Self { probes, band }
    }

    /// Structural → attribute → leaf scan.
    pub fn standard(band: PayoutBand) -> Self {
        Self::new(
            vec![
                Box::new(StructuralProbe),
                Box::new(SelectorProbe::default()),
                Box::new(LeafScanProbe),
            ],
            band,
        )
    }

    /// Preference order, highest first.
    pub fn order(&self) -> Vec<ProbeId> {
        self.probes.iter().map(|p| p.id()).collect()
    }

    /// Run the probes in order and return the first in-band reading.
    ///
    /// A probe whose surface call fails is skipped; `SignalNotFound` is
    /// returned only after every probe has been tried. No retries here.
    pub async fn acquire(&self, surface: &dyn Surface) -> Result<SignalReading, EngineError> {
        for probe in &self.probes {
            match probe.probe(surface, &self.band).await {
                Ok(Some(reading)) => {
                    info!(
                        source = "probe-chain",
                        probe = %reading.source_probe,
                        payout = reading.value,
                        text = %reading.raw_text,
                        "Payout found"
                    );
                    return Ok(reading);
                }
                Ok(None) => {
                    debug!(source = "probe-chain", probe = %probe.id(), "No payout from probe");
                }
                Err(e) => {
                    warn!(source = "probe-chain", probe = %probe.id(), error = %e, "Probe failed, trying next");
                }
            }
        }

        warn!(source = "probe-chain", "Payout not found on surface");
        Err(EngineError::SignalNotFound)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

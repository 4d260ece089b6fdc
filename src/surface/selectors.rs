//! Selector tables for the trading page.
//!
//! Each set lists alternatives from most to least specific. The page
//! changes shape between releases, so older class names are kept after
//! the current ones.

use super::SelectorSet;

// ---------------------------------------------------------------------------
// Payout
// ---------------------------------------------------------------------------

/// The payout value cell inside the trade panel.
pub const PAYOUT_STRUCTURAL: SelectorSet = SelectorSet {
    name: "payout-structural",
    selectors: &[
        "#put-call-buttons-chart-1 .value__val-start",
        ".block--payout .value__val-start",
        ".option-profit .profit-percent",
    ],
};

/// Class- and attribute-based payout containers, tried one at a time.
pub const PAYOUT_ATTRIBUTE: &[SelectorSet] = &[
    SelectorSet {
        name: "payout-value-start",
        selectors: &[".value__val-start"],
    },
    SelectorSet {
        name: "payout-estimated-profit",
        selectors: &[".estimated-profit-block__percent"],
    },
    SelectorSet {
        name: "payout-percent-value",
        selectors: &[".payout .percent-value", ".trade-info .profit"],
    },
    SelectorSet {
        name: "payout-testid",
        selectors: &["[data-testid*=\"payout\" i]"],
    },
    SelectorSet {
        name: "payout-class",
        selectors: &["[class*=\"payout\" i]", "[id*=\"payout\" i]"],
    },
    SelectorSet {
        name: "profit-class",
        selectors: &[".option-profit", ".payout-info", ".profit-percent", "[class*=\"profit\"]"],
    },
];

/// Every element in the body; the leaf scan filters down from here.
pub const LEAF_CANDIDATES: SelectorSet = SelectorSet {
    name: "leaf-candidates",
    selectors: &["body *"],
};

// ---------------------------------------------------------------------------
// Asset modal
// ---------------------------------------------------------------------------

/// Control that opens the asset chooser.
pub const MODAL_TRIGGER: SelectorSet = SelectorSet {
    name: "modal-trigger",
    selectors: &[
        ".iq-popup-content-button.iq-current-option",
        ".current-symbol",
        ".asset-selector",
        "[class*=\"current-option\"]",
        ".symbol-name",
    ],
};

/// Present and visible only while the chooser is open.
pub const MODAL_OPEN_INDICATOR: SelectorSet = SelectorSet {
    name: "modal-open-indicator",
    selectors: &[
        ".iq-option-popup.opened",
        ".modal-asset-chooser.opened",
        ".asset-popup.active",
        "[class*=\"asset-popup\"][class*=\"opened\"]",
        ".popup[style*=\"block\"]",
    ],
};

/// Explicit close button of the chooser.
pub const MODAL_CLOSE: SelectorSet = SelectorSet {
    name: "modal-close",
    selectors: &[
        ".modal-header .close",
        ".popup-close",
        ".iq-popup-close",
        "[class*=\"close\"]",
    ],
};

/// Entries listed inside the open chooser.
pub const ASSET_ENTRIES: SelectorSet = SelectorSet {
    name: "asset-entries",
    selectors: &[
        ".iq-option-dropdown-options",
        ".asset-list",
        ".symbols-list",
        "[class*=\"asset-item\"]",
    ],
};

/// Asset-like nodes anywhere on the page, used when the chooser cannot
/// be opened.
pub const ASSET_FALLBACK: SelectorSet = SelectorSet {
    name: "asset-fallback",
    selectors: &["[data-asset]", "[data-symbol]", "[class*=\"asset\" i]"],
};

/// Key used to dismiss the chooser when no close button is visible.
pub const ESCAPE_KEY: &str = "Escape";

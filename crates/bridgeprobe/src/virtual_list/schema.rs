//! Sampled DOM shapes and the item-marker schema.
//!
//! Index markers, in priority order:
//!
//! | attribute       | base |
//! |-----------------|------|
//! | `data-index`    | 0    |
//! | `aria-rowindex` | 1    |
//! | `aria-posinset` | 1    |
//!
//! Elements without an index are still items when their `role` is
//! `treeitem`, `row`, `listitem` or `option`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selector matching every element the schema can recognize
pub const DEFAULT_ITEM_SELECTOR: &str = "[data-index], [aria-rowindex], [aria-posinset], \
[role=\"treeitem\"], [role=\"row\"], [role=\"listitem\"], [role=\"option\"]";

/// Structural roles that mark an element as a list item
pub const ITEM_ROLES: [&str; 4] = ["treeitem", "row", "listitem", "option"];

const INDEX_MARKERS: [(&str, usize); 3] =
    [("data-index", 0), ("aria-rowindex", 1), ("aria-posinset", 1)];

const TOTAL_COUNT_MARKERS: [&str; 3] = ["data-total-count", "aria-rowcount", "aria-setsize"];

/// Element attributes as sampled
pub type Attributes = BTreeMap<String, String>;

/// Axis-aligned rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the two boxes overlap by a non-zero area
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// One rendered element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Trimmed text content
    #[serde(default)]
    pub text: String,
    /// All attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Bounds relative to the viewport
    #[serde(default)]
    pub bounds: BoundingBox,
}

/// The scroll container as sampled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSample {
    /// Current scroll offset
    pub scroll_top: f64,
    /// Full scrollable height
    pub scroll_height: f64,
    /// Visible height
    pub client_height: f64,
    /// Bounds relative to the viewport
    #[serde(default)]
    pub bounds: BoundingBox,
    /// All attributes
    #[serde(default)]
    pub attributes: Attributes,
}

/// Result of sampling a virtualized container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedWindow {
    /// Whether the container exists
    pub found: bool,
    /// Container metrics, when found
    #[serde(default)]
    pub container: Option<ContainerSample>,
    /// Elements matching the item selector
    #[serde(default)]
    pub items: Vec<RawItem>,
}

fn flag(attributes: &Attributes, name: &str) -> Option<bool> {
    attributes.get(name).map(|v| match v.as_str() {
        "" | "true" => true,
        _ => false,
    })
}

/// Explicit 0-based index, if the element carries one
#[must_use]
pub fn explicit_index(attributes: &Attributes) -> Option<usize> {
    INDEX_MARKERS.iter().find_map(|(name, base)| {
        attributes
            .get(*name)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|v| v.checked_sub(*base))
    })
}

/// Whether the element is recognized as a list item
#[must_use]
pub fn is_item(attributes: &Attributes) -> bool {
    explicit_index(attributes).is_some()
        || attributes
            .get("role")
            .is_some_and(|role| ITEM_ROLES.contains(&role.as_str()))
}

/// Total count from an explicit marker
#[must_use]
pub fn total_count_marker(attributes: &Attributes) -> Option<usize> {
    TOTAL_COUNT_MARKERS
        .iter()
        .find_map(|name| attributes.get(*name).and_then(|v| v.trim().parse().ok()))
}

/// Selected via `aria-selected`, `data-selected` or a `selected` class
#[must_use]
pub fn is_selected(attributes: &Attributes) -> bool {
    flag(attributes, "aria-selected").unwrap_or(false)
        || flag(attributes, "data-selected").unwrap_or(false)
        || attributes
            .get("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c == "selected"))
}

/// Expansion state from `aria-expanded`
#[must_use]
pub fn expanded(attributes: &Attributes) -> Option<bool> {
    flag(attributes, "aria-expanded")
}

/// Whether the element can have children
#[must_use]
pub fn has_children(attributes: &Attributes) -> Option<bool> {
    if attributes.contains_key("aria-expanded") {
        return Some(true);
    }
    flag(attributes, "data-has-children")
}

/// Tree depth from `aria-level`
#[must_use]
pub fn level(attributes: &Attributes) -> Option<u32> {
    attributes.get("aria-level").and_then(|v| v.trim().parse().ok())
}

/// Stable identifier from `data-id`, `data-key` or `id`
#[must_use]
pub fn item_id(attributes: &Attributes) -> Option<String> {
    ["data-id", "data-key", "id"]
        .iter()
        .find_map(|name| attributes.get(*name).filter(|v| !v.is_empty()).cloned())
}

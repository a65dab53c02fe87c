//! Logical list state derived from a rendered window.

use crate::result::{ProbeError, ProbeResult};
use crate::virtual_list::schema::{self, Attributes, BoundingBox, ContainerSample, RawItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One rendered item with its logical position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualItem {
    /// 0-based logical index
    pub index: usize,
    /// Stable identifier, when marked
    pub id: Option<String>,
    /// Text content
    pub text: String,
    /// All attributes
    pub attributes: Attributes,
    /// Bounds relative to the viewport
    pub bounds: BoundingBox,
    /// Intersects the container viewport
    pub visible: bool,
    /// Selection marker present
    pub selected: bool,
    /// Tree depth
    pub level: Option<u32>,
    /// Expansion state
    pub expanded: Option<bool>,
    /// Whether the item can have children
    pub has_children: Option<bool>,
}

impl VirtualItem {
    /// Case-insensitive substring match on the text
    #[must_use]
    pub fn text_contains(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Snapshot of a virtualized collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualListState {
    /// Logical item count; never below `rendered_count` or `end_index + 1`
    pub total_count: usize,
    /// `total_count` came from the height heuristic, not a marker
    pub total_count_estimated: bool,
    /// Number of recognized rendered items
    pub rendered_count: usize,
    /// Lowest rendered index
    pub start_index: usize,
    /// Highest rendered index
    pub end_index: usize,
    /// Container scroll offset
    pub scroll_top: f64,
    /// Container scrollable height
    pub scroll_height: f64,
    /// Container visible height
    pub client_height: f64,
    /// Mean rendered item height; 0 when nothing is rendered
    pub avg_item_height: f64,
    /// Rendered items in index order; `visible` marks the ones in the viewport
    pub visible_items: Vec<VirtualItem>,
}

/// Derive logical state from one sample.
///
/// Without an explicit marker the total is `ceil(scroll_height / avg_item_height)`.
/// That estimate is only exact for uniform item heights.
#[must_use]
pub fn derive_state(container: &ContainerSample, raw_items: &[RawItem]) -> VirtualListState {
    let recognized: Vec<&RawItem> = raw_items
        .iter()
        .filter(|item| schema::is_item(&item.attributes))
        .collect();
    let rendered_count = recognized.len();

    let explicit: Vec<Option<usize>> = recognized
        .iter()
        .map(|item| schema::explicit_index(&item.attributes))
        .collect();

    let mut items: Vec<VirtualItem> = recognized
        .iter()
        .zip(resolve_indices(&explicit))
        .map(|(raw, index)| VirtualItem {
            index,
            id: schema::item_id(&raw.attributes),
            text: raw.text.clone(),
            attributes: raw.attributes.clone(),
            bounds: raw.bounds,
            visible: raw.bounds.intersects(&container.bounds),
            selected: schema::is_selected(&raw.attributes),
            level: schema::level(&raw.attributes),
            expanded: schema::expanded(&raw.attributes),
            has_children: schema::has_children(&raw.attributes),
        })
        .collect();
    items.sort_by_key(|item| item.index);

    let start_index = items.first().map_or(0, |item| item.index);
    let end_index = items.last().map_or(0, |item| item.index);

    let heights: Vec<f64> = items
        .iter()
        .map(|item| item.bounds.height)
        .filter(|h| *h > 0.0)
        .collect();
    let avg_item_height = if heights.is_empty() {
        0.0
    } else {
        heights.iter().sum::<f64>() / heights.len() as f64
    };

    let marker = schema::total_count_marker(&container.attributes).or_else(|| {
        recognized
            .iter()
            .find_map(|item| item.attributes.get("aria-setsize"))
            .and_then(|v| v.trim().parse().ok())
    });
    let (raw_total, total_count_estimated) = match marker {
        Some(count) => (count, false),
        None if avg_item_height > 0.0 => {
            ((container.scroll_height / avg_item_height).ceil() as usize, true)
        }
        None => (rendered_count, true),
    };
    let floor = if rendered_count > 0 { end_index + 1 } else { 0 };
    let total_count = raw_total.max(rendered_count).max(floor);

    VirtualListState {
        total_count,
        total_count_estimated,
        rendered_count,
        start_index,
        end_index,
        scroll_top: container.scroll_top,
        scroll_height: container.scroll_height,
        client_height: container.client_height,
        avg_item_height,
        visible_items: items,
    }
}

/// Logical index for every recognized item, in DOM order.
///
/// A window with no explicit indices is numbered by position. Otherwise an
/// unindexed item follows the item before it, and leading unindexed items
/// count back from the first explicit index. Fallbacks never reuse an index
/// already taken in the window.
fn resolve_indices(explicit: &[Option<usize>]) -> Vec<usize> {
    let Some(first) = explicit.iter().flatten().next().copied() else {
        return (0..explicit.len()).collect();
    };
    let leading = explicit.iter().take_while(|index| index.is_none()).count();
    let mut taken: BTreeSet<usize> = explicit.iter().flatten().copied().collect();

    let mut previous: Option<usize> = None;
    let mut resolved = Vec::with_capacity(explicit.len());
    for (position, index) in explicit.iter().enumerate() {
        let index = match *index {
            Some(index) => index,
            None => {
                let mut candidate =
                    previous.map_or_else(|| first.saturating_sub(leading - position), |p| p + 1);
                while !taken.insert(candidate) {
                    candidate += 1;
                }
                candidate
            }
        };
        previous = Some(index);
        resolved.push(index);
    }
    resolved
}

impl VirtualListState {
    /// First item in the viewport whose text contains `text`
    #[must_use]
    pub fn find_visible(&self, text: &str) -> Option<&VirtualItem> {
        self.visible_items
            .iter()
            .find(|item| item.visible && item.text_contains(text))
    }

    /// First rendered item whose text contains `text`
    #[must_use]
    pub fn find_rendered(&self, text: &str) -> Option<&VirtualItem> {
        self.visible_items.iter().find(|item| item.text_contains(text))
    }

    /// Rendered item at a logical index
    #[must_use]
    pub fn item_at(&self, index: usize) -> Option<&VirtualItem> {
        self.visible_items.iter().find(|item| item.index == index)
    }

    /// Whether `index` is inside the rendered range
    #[must_use]
    pub const fn contains_index(&self, index: usize) -> bool {
        self.rendered_count > 0 && self.start_index <= index && index <= self.end_index
    }

    /// Number of items intersecting the viewport
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible_items.iter().filter(|item| item.visible).count()
    }

    fn rendered_or_fail(&self, text: &str, wanted: &str) -> ProbeResult<&VirtualItem> {
        self.find_rendered(text).ok_or_else(|| {
            ProbeError::assertion(
                format!("item '{text}' to be {wanted}"),
                wanted,
                "not rendered",
            )
        })
    }

    /// Assert an item containing `text` is in the viewport
    pub fn assert_item_visible(&self, text: &str) -> ProbeResult<()> {
        if self.find_visible(text).is_some() {
            return Ok(());
        }
        let actual = if self.find_rendered(text).is_some() {
            "rendered outside the viewport"
        } else {
            "not rendered"
        };
        Err(ProbeError::assertion(
            format!("item '{text}' to be visible"),
            "visible",
            actual,
        ))
    }

    /// Assert the logical count equals `expected`
    pub fn assert_item_count(&self, expected: usize) -> ProbeResult<()> {
        if self.total_count == expected {
            return Ok(());
        }
        Err(ProbeError::assertion(
            "item count",
            expected,
            self.total_count_label(),
        ))
    }

    /// Assert the logical count is at least `min`
    pub fn assert_min_item_count(&self, min: usize) -> ProbeResult<()> {
        if self.total_count >= min {
            return Ok(());
        }
        Err(ProbeError::assertion(
            "item count",
            format!("at least {min}"),
            self.total_count_label(),
        ))
    }

    /// Assert the item containing `text` carries a selection marker
    pub fn assert_item_selected(&self, text: &str) -> ProbeResult<()> {
        let item = self.rendered_or_fail(text, "selected")?;
        if item.selected {
            return Ok(());
        }
        Err(ProbeError::assertion(
            format!("item '{text}' to be selected"),
            "selected",
            "not selected",
        ))
    }

    /// Assert the item containing `text` is expanded
    pub fn assert_item_expanded(&self, text: &str) -> ProbeResult<()> {
        let item = self.rendered_or_fail(text, "expanded")?;
        match item.expanded {
            Some(true) => Ok(()),
            Some(false) => Err(ProbeError::assertion(
                format!("item '{text}' to be expanded"),
                "expanded",
                "collapsed",
            )),
            None => Err(ProbeError::assertion(
                format!("item '{text}' to be expanded"),
                "expanded",
                "no expansion marker",
            )),
        }
    }

    fn total_count_label(&self) -> String {
        if self.total_count_estimated {
            format!("{} (estimated)", self.total_count)
        } else {
            self.total_count.to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn container(scroll_top: f64, scroll_height: f64) -> ContainerSample {
        ContainerSample {
            scroll_top,
            scroll_height,
            client_height: 200.0,
            bounds: BoundingBox::new(0.0, 0.0, 300.0, 200.0),
            attributes: Attributes::new(),
        }
    }

    fn item(text: &str, attrs: &[(&str, &str)], y: f64, height: f64) -> RawItem {
        RawItem {
            text: text.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            bounds: BoundingBox::new(0.0, y, 300.0, height),
        }
    }

    fn indexed(index: usize, y: f64) -> RawItem {
        let idx = index.to_string();
        item(&format!("Item {index}"), &[("data-index", idx.as_str())], y, 40.0)
    }

    mod derive_tests {
        use super::*;

        #[test]
        fn test_explicit_indices() {
            let items: Vec<RawItem> = (10..16)
                .map(|i| indexed(i, (i as f64 - 10.0) * 40.0 - 20.0))
                .collect();
            let state = derive_state(&container(400.0, 4000.0), &items);
            assert_eq!(state.start_index, 10);
            assert_eq!(state.end_index, 15);
            assert_eq!(state.rendered_count, 6);
            assert!((state.avg_item_height - 40.0).abs() < f64::EPSILON);
            assert_eq!(state.total_count, 100);
            assert!(state.total_count_estimated);
        }

        #[test]
        fn test_marker_beats_estimate() {
            let mut c = container(0.0, 4000.0);
            c.attributes.insert("aria-rowcount".to_string(), "250".to_string());
            let state = derive_state(&c, &[indexed(0, 0.0)]);
            assert_eq!(state.total_count, 250);
            assert!(!state.total_count_estimated);
        }

        #[test]
        fn test_total_is_clamped_to_rendered_range() {
            let mut c = container(0.0, 80.0);
            c.attributes.insert("data-total-count".to_string(), "2".to_string());
            let items: Vec<RawItem> = (0..5).map(|i| indexed(i, i as f64 * 40.0)).collect();
            let state = derive_state(&c, &items);
            assert_eq!(state.total_count, 5);
        }

        #[test]
        fn test_items_without_indices_are_positional() {
            let items = vec![
                item("b", &[("role", "option")], 40.0, 40.0),
                item("a", &[("role", "option")], 0.0, 40.0),
                item("ignored", &[("role", "button")], 0.0, 40.0),
            ];
            let state = derive_state(&container(0.0, 80.0), &items);
            assert_eq!(state.rendered_count, 2);
            assert_eq!(state.start_index, 0);
            assert_eq!(state.end_index, 1);
            assert_eq!(state.item_at(0).unwrap().text, "b");
        }

        #[test]
        fn test_mixed_window_keeps_indices_unique() {
            let items = vec![
                indexed(5, 0.0),
                item("loose", &[("role", "option")], 40.0, 40.0),
                indexed(6, 80.0),
            ];
            let state = derive_state(&container(0.0, 400.0), &items);
            assert_eq!(state.item_at(5).unwrap().text, "Item 5");
            assert_eq!(state.item_at(6).unwrap().text, "Item 6");
            assert_eq!(state.find_rendered("loose").unwrap().index, 7);
            assert_eq!(state.start_index, 5);
            assert_eq!(state.end_index, 7);
        }

        #[test]
        fn test_leading_unindexed_items_count_back() {
            let items = vec![
                item("a", &[("role", "option")], 0.0, 40.0),
                item("b", &[("role", "option")], 40.0, 40.0),
                indexed(10, 80.0),
                item("d", &[("role", "option")], 120.0, 40.0),
            ];
            let state = derive_state(&container(0.0, 4000.0), &items);
            let order: Vec<(usize, &str)> = state
                .visible_items
                .iter()
                .map(|i| (i.index, i.text.as_str()))
                .collect();
            assert_eq!(order, vec![(8, "a"), (9, "b"), (10, "Item 10"), (11, "d")]);
            assert_eq!(state.start_index, 8);
        }

        #[test]
        fn test_empty_window() {
            let state = derive_state(&container(0.0, 0.0), &[]);
            assert_eq!(state.rendered_count, 0);
            assert_eq!(state.total_count, 0);
            assert!(state.avg_item_height.abs() < f64::EPSILON);
            assert!(!state.contains_index(0));
        }

        #[test]
        fn test_visibility_uses_viewport() {
            let items = vec![indexed(0, -40.0), indexed(1, 0.0), indexed(2, 200.0)];
            let state = derive_state(&container(40.0, 400.0), &items);
            let visible: Vec<bool> = state.visible_items.iter().map(|i| i.visible).collect();
            assert_eq!(visible, vec![false, true, false]);
            assert_eq!(state.visible_count(), 1);
        }

        #[test]
        fn test_one_based_markers_normalized() {
            let items = vec![
                item("r1", &[("aria-rowindex", "1")], 0.0, 30.0),
                item("r2", &[("aria-rowindex", "2")], 30.0, 30.0),
            ];
            let state = derive_state(&container(0.0, 60.0), &items);
            assert_eq!(state.start_index, 0);
            assert_eq!(state.end_index, 1);
        }
    }

    mod assertion_tests {
        use super::*;

        fn tree() -> VirtualListState {
            let items = vec![
                item(
                    "src",
                    &[("role", "treeitem"), ("aria-expanded", "true"), ("aria-level", "1")],
                    0.0,
                    24.0,
                ),
                item(
                    "main.rs",
                    &[("role", "treeitem"), ("aria-selected", "true"), ("aria-level", "2")],
                    24.0,
                    24.0,
                ),
                item(
                    "tests",
                    &[("role", "treeitem"), ("aria-expanded", "false")],
                    48.0,
                    24.0,
                ),
                item("hidden.rs", &[("role", "treeitem")], 400.0, 24.0),
            ];
            derive_state(&container(0.0, 96.0), &items)
        }

        #[test]
        fn test_visible() {
            let state = tree();
            assert!(state.assert_item_visible("MAIN").is_ok());
            let err = state.assert_item_visible("hidden").unwrap_err();
            assert!(err.to_string().contains("outside the viewport"));
            assert!(state.assert_item_visible("nope").is_err());
        }

        #[test]
        fn test_selected_and_expanded() {
            let state = tree();
            assert!(state.assert_item_selected("main.rs").is_ok());
            assert!(state.assert_item_selected("src").is_err());
            assert!(state.assert_item_expanded("src").is_ok());
            let err = state.assert_item_expanded("tests").unwrap_err();
            assert!(err.to_string().contains("collapsed"));
            assert!(state.assert_item_expanded("main.rs").is_err());
        }

        #[test]
        fn test_counts() {
            let state = tree();
            assert!(state.assert_item_count(4).is_ok());
            assert!(state.assert_min_item_count(3).is_ok());
            let err = state.assert_item_count(10).unwrap_err();
            assert!(err.to_string().contains("estimated"));
            assert!(state.assert_min_item_count(5).is_err());
        }
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn prop_state_invariants(
                indices in proptest::collection::vec(0usize..10_000, 0..40),
                height in 1.0f64..80.0,
                scroll_height in 0.0f64..100_000.0,
                marker in proptest::option::of(0usize..20_000),
            ) {
                let mut c = container(0.0, scroll_height);
                if let Some(m) = marker {
                    c.attributes.insert("aria-rowcount".to_string(), m.to_string());
                }
                let items: Vec<RawItem> = indices
                    .iter()
                    .enumerate()
                    .map(|(pos, i)| {
                        let idx = i.to_string();
                        item("x", &[("data-index", idx.as_str())], pos as f64 * height, height)
                    })
                    .collect();
                let state = derive_state(&c, &items);

                prop_assert!(state.total_count >= state.rendered_count);
                if state.rendered_count > 0 {
                    prop_assert!(state.start_index <= state.end_index);
                    prop_assert!(state.total_count > state.end_index);
                }
                prop_assert!(state
                    .visible_items
                    .windows(2)
                    .all(|w| w[0].index <= w[1].index));
            }

            #[test]
            fn prop_unindexed_items_never_share_an_index(
                indices in proptest::collection::vec(proptest::option::of(0usize..50), 1..30),
            ) {
                let items: Vec<RawItem> = indices
                    .iter()
                    .enumerate()
                    .map(|(pos, index)| match index {
                        Some(i) => indexed(*i, pos as f64 * 20.0),
                        None => item("loose", &[("role", "row")], pos as f64 * 20.0, 20.0),
                    })
                    .collect();
                let state = derive_state(&container(0.0, 600.0), &items);

                prop_assert_eq!(state.rendered_count, indices.len());
                for loose in state.visible_items.iter().filter(|i| i.text == "loose") {
                    let sharing = state
                        .visible_items
                        .iter()
                        .filter(|other| other.index == loose.index)
                        .count();
                    prop_assert_eq!(sharing, 1);
                }
            }
        }
    }
}

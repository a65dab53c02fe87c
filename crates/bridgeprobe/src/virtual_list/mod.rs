//! Virtualized list and tree probing.
//!
//! Only a window of a virtualized collection exists in the DOM at any time.
//! The probe samples that window through the channel and reconstructs the
//! logical state from item markers:
//!
//! ```text
//!  scroll_top ─┐   ┌──────────────┐
//!              ▼   │ [data-index=40]   ◄─ start_index
//!  viewport ──►│   │ [data-index=41]
//!              │   │ ...
//!              ▲   │ [data-index=52]   ◄─ end_index
//!              └── └──────────────┘
//!  total_count = marker, or ceil(scroll_height / avg_item_height)
//! ```

mod performance;
mod probe;
mod schema;
mod state;

pub use performance::{ScrollPerformanceSample, ScrollThresholds, DROPPED_FRAME_THRESHOLD_MS};
pub use probe::{
    MeasureOptions, ProbeOptions, ScrollBehavior, ScrollOptions, SearchOptions, VirtualListProbe,
    SEARCH_STRIDE_ITEMS,
};
pub use schema::{
    Attributes, BoundingBox, ContainerSample, RawItem, RenderedWindow, DEFAULT_ITEM_SELECTOR,
    ITEM_ROLES,
};
pub use state::{derive_state, VirtualItem, VirtualListState};

//! Window-state coordination
//!
//! The windowing widget owns drag, resize and z-order; this module owns the
//! app's record of which windows exist and which one is focused, and maps
//! every widget callback onto exactly one mutation of that record.

mod cards;
mod coordinator;
mod types;
mod viewport;

pub use cards::{Card, CardCatalog, default_cards};
pub use coordinator::WindowStateCoordinator;
pub use types::{CardWindow, WidgetEvent, WidgetOptions, WindowEntry, WindowState};
pub use viewport::{
    BOTTOM_PANEL_HEIGHT, COLLAPSED_PANEL_HEIGHT, DEFAULT_HEIGHT, DEFAULT_WIDTH, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH,
    PANEL_GAP, Panel, PanelLayout, Rect, SIDE_MARGIN, TOP_PANEL_HEIGHT, Viewport,
};

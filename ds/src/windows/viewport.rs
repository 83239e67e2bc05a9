//! Panel layout and the rectangle left over for windows
//!
//! ```text
//!  ┌──────────────── top panel (80, collapsed 40) ───────────────┐
//!  │ 4 px gap                                                    │
//!  │ 10 px ┌──────────── available window rect ──────────┐ 10 px │
//!  │       └─────────────────────────────────────────────┘       │
//!  │ 4 px gap                                                    │
//!  └────────────── bottom panel (130, collapsed 40) ─────────────┘
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::events::{EventBus, ui_toggled};
use crate::state::Observable;

pub const TOP_PANEL_HEIGHT: u32 = 80;
pub const BOTTOM_PANEL_HEIGHT: u32 = 130;
pub const COLLAPSED_PANEL_HEIGHT: u32 = 40;
pub const SIDE_MARGIN: u32 = 10;
pub const PANEL_GAP: u32 = 4;
pub const MIN_WINDOW_WIDTH: u32 = 300;
pub const MIN_WINDOW_HEIGHT: u32 = 200;

/// Fallback screen size when nothing else is known
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Top,
    Bottom,
}

impl Panel {
    /// Name used in `ui:<name>:toggled`
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Top => "top-panel",
            Self::Bottom => "bottom-panel",
        }
    }
}

/// Screen size plus panel collapse state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub top_collapsed: bool,
    pub bottom_collapsed: bool,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            top_collapsed: false,
            bottom_collapsed: false,
        }
    }

    pub fn is_collapsed(&self, panel: Panel) -> bool {
        match panel {
            Panel::Top => self.top_collapsed,
            Panel::Bottom => self.bottom_collapsed,
        }
    }

    pub fn top_height(&self) -> u32 {
        if self.top_collapsed { COLLAPSED_PANEL_HEIGHT } else { TOP_PANEL_HEIGHT }
    }

    pub fn bottom_height(&self) -> u32 {
        if self.bottom_collapsed {
            COLLAPSED_PANEL_HEIGHT
        } else {
            BOTTOM_PANEL_HEIGHT
        }
    }

    /// Area between the panels, never shorter than [`MIN_WINDOW_HEIGHT`]
    pub fn available_rect(&self) -> Rect {
        let used = self.top_height() + self.bottom_height() + 2 * PANEL_GAP;
        Rect {
            left: SIDE_MARGIN,
            top: self.top_height() + PANEL_GAP,
            width: self.width.saturating_sub(2 * SIDE_MARGIN),
            height: self.height.saturating_sub(used).max(MIN_WINDOW_HEIGHT),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Shared viewport that announces panel toggles on the bus
pub struct PanelLayout {
    bus: Arc<EventBus>,
    viewport: Observable<Viewport>,
}

impl PanelLayout {
    pub fn new(bus: Arc<EventBus>, viewport: Viewport) -> Self {
        Self {
            bus,
            viewport: Observable::new(viewport),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn available_rect(&self) -> Rect {
        self.viewport.with(Viewport::available_rect)
    }

    pub fn resize(&self, width: u32, height: u32) {
        debug!(width, height, "PanelLayout::resize: called");
        self.viewport.update(|v| {
            v.width = width;
            v.height = height;
        });
    }

    /// Flip `panel` and publish `ui:<panel>:toggled {collapsed}`
    ///
    /// Returns the new collapsed state.
    pub fn toggle(&self, panel: Panel) -> bool {
        let collapsed = self.viewport.update(|v| {
            let slot = match panel {
                Panel::Top => &mut v.top_collapsed,
                Panel::Bottom => &mut v.bottom_collapsed,
            };
            *slot = !*slot;
            *slot
        });
        debug!(?panel, collapsed, "PanelLayout::toggle: called");
        self.bus.publish(&ui_toggled(panel.event_name()), json!({"collapsed": collapsed}));
        collapsed
    }

    pub fn observable(&self) -> &Observable<Viewport> {
        &self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_rect_expanded() {
        let rect = Viewport::new(1280, 800).available_rect();
        assert_eq!(
            rect,
            Rect {
                left: 10,
                top: 84,
                width: 1260,
                height: 800 - 80 - 130 - 8,
            }
        );
    }

    #[test]
    fn test_available_rect_collapsed() {
        let viewport = Viewport {
            top_collapsed: true,
            bottom_collapsed: true,
            ..Viewport::new(1000, 700)
        };
        let rect = viewport.available_rect();
        assert_eq!(rect.top, 44);
        assert_eq!(rect.height, 700 - 40 - 40 - 8);
    }

    #[test]
    fn test_available_rect_minimum_height() {
        let rect = Viewport::new(100, 250).available_rect();
        assert_eq!(rect.height, MIN_WINDOW_HEIGHT);
        assert_eq!(rect.width, 80);
    }

    #[test]
    fn test_toggle_publishes() {
        let bus = Arc::new(EventBus::default());
        let layout = PanelLayout::new(bus.clone(), Viewport::default());

        assert!(layout.toggle(Panel::Top));
        assert!(!layout.toggle(Panel::Top));
        assert!(layout.toggle(Panel::Bottom));

        let top = bus.get_history(Some("ui:top-panel:toggled"), None);
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].payload["collapsed"], false);
        assert_eq!(bus.get_last("ui:bottom-panel:toggled").unwrap().payload["collapsed"], true);
        assert!(layout.viewport().bottom_collapsed);
    }

    #[test]
    fn test_resize_changes_rect() {
        let layout = PanelLayout::new(Arc::new(EventBus::default()), Viewport::default());
        layout.resize(1920, 1080);
        assert_eq!(layout.available_rect().width, 1900);
    }
}

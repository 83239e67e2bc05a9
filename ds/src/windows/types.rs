//! Window list entries, widget callbacks and card window options

use serde::{Deserialize, Serialize};

/// One open window as tracked by the coordinator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub id: String,
    pub title: String,
    pub minimized: bool,
    pub focused: bool,
}

impl WindowEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            minimized: false,
            focused: false,
        }
    }
}

/// State reported to the host through `window_state_change`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Focused,
    Blurred,
    Minimized,
    Maximized,
    Restored,
    Closed,
}

impl WindowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focused => "focused",
            Self::Blurred => "blurred",
            Self::Minimized => "minimized",
            Self::Maximized => "maximized",
            Self::Restored => "restored",
            Self::Closed => "closed",
        }
    }
}

/// Lifecycle callback fired by the windowing widget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetEvent {
    Focus,
    Blur,
    Minimize,
    Maximize,
    Restore,
    Close,
}

/// Constructor options handed to the windowing widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetOptions {
    pub id: String,
    pub title: String,
    pub background: String,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub minwidth: u32,
    pub minheight: u32,
    pub html: String,
}

/// Outcome of [`WindowStateCoordinator::open_card`](super::WindowStateCoordinator::open_card)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CardWindow {
    /// The card already had a window; it was restored if needed and focused
    Refocused { id: String },
    /// A new window must be built with these options
    Created(WidgetOptions),
}

impl CardWindow {
    pub fn id(&self) -> &str {
        match self {
            Self::Refocused { id } => id,
            Self::Created(options) => &options.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_state_serialization() {
        assert_eq!(serde_json::to_value(WindowState::Maximized).unwrap(), "maximized");
        for state in [WindowState::Focused, WindowState::Blurred, WindowState::Closed] {
            assert_eq!(serde_json::to_value(state).unwrap(), state.as_str());
        }
    }

    #[test]
    fn test_widget_event_deserialization() {
        let event: WidgetEvent = serde_yaml::from_str("minimize").unwrap();
        assert_eq!(event, WidgetEvent::Minimize);
    }

    #[test]
    fn test_new_entry_is_neither_focused_nor_minimized() {
        let entry = WindowEntry::new("card-1", "Angular");
        assert!(!entry.focused);
        assert!(!entry.minimized);
    }
}

use ratatui::Frame;
use ratatui::layout::Rect;

/// A reusable UI component.
///
/// Props are struct fields, filled in by `ui::draw_ui` from the navigation
/// state each frame. Components that need presentation state between frames
/// (list selection, scroll offsets) borrow it mutably from `TuiState`.
pub trait Component {
    /// Render the component into the given area.
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A component that consumes terminal events while it has focus.
pub trait EventHandler {
    /// The type of high-level event this component emits.
    type Event;

    /// Handle a low-level `TuiEvent` and optionally return a high-level event.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}

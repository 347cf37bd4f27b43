//! # FilterBox Component
//!
//! One-line prompt for editing the match pattern. Shown in place of the status
//! line while the filter is being edited. Enter applies, Esc cancels.

use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::core::lister::MATCH_ALL;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

const PROMPT: &str = "match: ";

#[derive(Debug, PartialEq, Eq)]
pub enum FilterEvent {
    /// User pressed Enter; the pattern to apply (may be empty).
    Apply(String),
    Cancel,
    Changed,
}

#[derive(Debug, Default)]
pub struct FilterBox {
    pub buffer: String,
}

impl FilterBox {
    /// Start editing from the active pattern. The match-all pattern starts
    /// empty so typing replaces it.
    pub fn new(current: &str) -> Self {
        let buffer = if current == MATCH_ALL {
            String::new()
        } else {
            current.to_string()
        };
        Self { buffer }
    }
}

impl EventHandler for FilterBox {
    type Event = FilterEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.push(*c);
                Some(FilterEvent::Changed)
            }
            TuiEvent::Paste(text) => {
                // Patterns are single-line
                self.buffer
                    .extend(text.chars().filter(|c| *c != '\n' && *c != '\r'));
                Some(FilterEvent::Changed)
            }
            TuiEvent::Backspace => self.buffer.pop().map(|_| FilterEvent::Changed),
            TuiEvent::Submit => Some(FilterEvent::Apply(std::mem::take(&mut self.buffer))),
            TuiEvent::Escape => Some(FilterEvent::Cancel),
            _ => None,
        }
    }
}

impl Component for FilterBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            Span::styled(PROMPT, Style::default().fg(Color::Cyan)),
            Span::raw(self.buffer.as_str()),
        ]);
        frame.render_widget(line, area);

        let x = area.x + (PROMPT.width() + self.buffer.width()) as u16;
        frame.set_cursor_position(Position {
            x: x.min(area.right().saturating_sub(1)),
            y: area.y,
        });
    }
}

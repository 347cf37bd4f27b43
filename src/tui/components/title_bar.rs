//! # TitleBar Component
//!
//! Top line showing where we are connected and what we are looking at.
//!
//! ## Responsibilities
//!
//! - Display the data source label (`host:port/db` or `master/db`)
//! - Display the key count reported by the server
//! - Display the active match pattern
//! - Show a spinner while any fetch is outstanding
//!
//! ## Design Decisions
//!
//! ### Stateless Component
//!
//! TitleBar is purely presentational. It receives all data as props and has
//! no internal state:
//!
//! ```rust,ignore
//! let mut title_bar = TitleBar::new(
//!     state.source_name.clone(),
//!     state.key_count,
//!     state.lister.pattern().to_string(),
//! );
//! title_bar.loading = state.loading();
//! title_bar.spinner_frame = spinner_frame;
//! title_bar.render(frame, area);
//! ```
//!
//! ## Conditional Formatting
//!
//! Segments are dropped when they carry no information:
//!
//! 1. **Everything**: `"redis-viewer │ 127.0.0.1:6379/0 │ 1042 keys │ match user:* ⠋"`
//! 2. **Match-all pattern**: `"redis-viewer │ 127.0.0.1:6379/0 │ 1042 keys"`
//! 3. **Count unknown**: `"redis-viewer │ 127.0.0.1:6379/0"`

use crate::core::lister::MATCH_ALL;
use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct TitleBar {
    pub source_name: String,
    pub key_count: Option<u64>,
    pub pattern: String,
    pub loading: bool,
    pub spinner_frame: usize,
}

impl TitleBar {
    pub fn new(source_name: String, key_count: Option<u64>, pattern: String) -> Self {
        Self {
            source_name,
            key_count,
            pattern,
            loading: false,
            spinner_frame: 0,
        }
    }

    fn title_text(&self) -> String {
        let mut text = format!("redis-viewer │ {}", self.source_name);
        if let Some(count) = self.key_count {
            let noun = if count == 1 { "key" } else { "keys" };
            text.push_str(&format!(" │ {count} {noun}"));
        }
        if self.pattern != MATCH_ALL {
            text.push_str(&format!(" │ match {}", self.pattern));
        }
        text
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            self.title_text(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if self.loading {
            let glyph = SPINNER[self.spinner_frame % SPINNER.len()];
            spans.push(Span::styled(
                format!(" {glyph}"),
                Style::default().fg(Color::Yellow),
            ));
        }
        frame.render_widget(Line::from(spans), area);
    }
}

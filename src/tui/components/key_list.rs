//! # Key List Component
//!
//! The LIST screen: one row per displayed key, with a type badge.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `ListState` lives in `TuiState` so ratatui keeps the scroll offset
//! - `KeyList` is created each frame with borrowed props

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::lister::KeyPage;
use crate::store::KeyType;
use crate::tui::component::Component;

const BADGE_WIDTH: usize = 8;

pub struct KeyList<'a> {
    pub page: &'a KeyPage,
    pub selected: usize,
    pub pattern: &'a str,
    pub loading: bool,
    pub list_state: &'a mut ListState,
}

pub(crate) fn kind_color(kind: KeyType) -> Color {
    match kind {
        KeyType::String => Color::Green,
        KeyType::List => Color::Blue,
        KeyType::Hash => Color::Magenta,
        KeyType::Set => Color::Cyan,
        KeyType::ZSet => Color::Yellow,
        KeyType::Unknown => Color::DarkGray,
    }
}

/// Truncate to `max_width` terminal columns, marking the cut with `…`.
pub(crate) fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

impl Component for KeyList<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let footer = if self.page.is_exhausted() {
            format!(" {} keys ", self.page.len())
        } else {
            format!(" {} keys, more below ", self.page.len())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Keys ")
            .title_bottom(Line::from(footer).right_aligned())
            .padding(Padding::horizontal(1));

        if self.page.is_empty() {
            let message = if self.loading {
                "Scanning...".to_string()
            } else if !self.page.is_exhausted() {
                "No matches yet, scroll to keep scanning".to_string()
            } else {
                format!("No keys match {}", self.pattern)
            };
            let empty = Paragraph::new(message)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        // borders + padding + badge
        let name_width = (area.width as usize).saturating_sub(4 + BADGE_WIDTH + 1);
        let items: Vec<ListItem> = self
            .page
            .iter()
            .map(|entry| {
                let badge = format!("{:<width$}", entry.kind.label(), width = BADGE_WIDTH);
                Line::from(vec![
                    Span::styled(badge, Style::default().fg(kind_color(entry.kind))),
                    Span::raw(" "),
                    Span::raw(truncate_to_width(&entry.name, name_width)),
                ])
                .into()
            })
            .collect();

        self.list_state.select(Some(self.selected.min(self.page.len() - 1)));
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut *self.list_state);
    }
}

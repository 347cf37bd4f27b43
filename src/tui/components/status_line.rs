//! # StatusLine Component
//!
//! Bottom line. Shows the current error when there is one, key hints otherwise.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::state::Screen;
use crate::store::StoreError;
use crate::tui::component::Component;

const LIST_HINTS: &str = "↑↓ move  Enter open  / filter  r refresh  q quit";
const DETAIL_HINTS: &str = "↑↓ scroll  Esc back  r reload  q quit";

pub struct StatusLine<'a> {
    pub screen: Screen,
    pub error: Option<&'a StoreError>,
}

impl Component for StatusLine<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let line = match self.error {
            Some(error) => {
                let retry = if matches!(error, StoreError::Connection(_)) {
                    "  (r to retry, Esc to dismiss)"
                } else {
                    "  (Esc to dismiss)"
                };
                Line::from(vec![
                    Span::styled(
                        error.to_string(),
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(retry, Style::default().fg(Color::DarkGray)),
                ])
            }
            None => {
                let hints = match self.screen {
                    Screen::List => LIST_HINTS,
                    Screen::Detail => DETAIL_HINTS,
                };
                Line::styled(hints, Style::default().fg(Color::DarkGray))
            }
        };
        frame.render_widget(line, area);
    }
}

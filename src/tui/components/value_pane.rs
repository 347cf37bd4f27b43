//! # Value Pane Component
//!
//! The DETAIL screen. One sub-view per `ValueView` variant:
//!
//! ```text
//! String   wrapped text in a scroll view (JSON pretty-printed)
//! List     indexed sequence             0  first
//! Hash     two-column table             field │ value
//! Set      plain sequence
//! ZSet     score-annotated sequence     member  (1.5)
//! ```
//!
//! The block footer shows the TTL and how much of the collection is loaded.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, List, ListItem, ListState, Padding, Paragraph, Row, Table, TableState,
};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::loader::{KeyDetail, Pagination, StringValue, ValueView};
use crate::store::{KeyEntry, Ttl};
use crate::tui::component::Component;
use crate::tui::components::key_list::{kind_color, truncate_to_width};

/// Presentation state kept between frames.
#[derive(Default)]
pub struct ValuePaneState {
    pub list_state: ListState,
    pub table_state: TableState,
    pub scroll_state: ScrollViewState,
}

impl ValuePaneState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct ValuePane<'a> {
    pub entry: &'a KeyEntry,
    pub detail: Option<&'a KeyDetail>,
    pub row: usize,
    pub loading: bool,
    pub state: &'a mut ValuePaneState,
}

pub(crate) fn format_ttl(ttl: Ttl) -> String {
    match ttl {
        Ttl::Persistent => "no TTL".to_string(),
        Ttl::Seconds(s) if s >= 86_400 => format!("TTL {}d{}h", s / 86_400, s % 86_400 / 3600),
        Ttl::Seconds(s) if s >= 3600 => format!("TTL {}h{}m", s / 3600, s % 3600 / 60),
        Ttl::Seconds(s) if s >= 60 => format!("TTL {}m{}s", s / 60, s % 60),
        Ttl::Seconds(s) => format!("TTL {s}s"),
    }
}

pub(crate) fn format_score(score: f64) -> String {
    if score.is_finite() && score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{score:.0}")
    } else {
        format!("{score}")
    }
}

fn progress(pager: &dyn Pagination) -> String {
    let loaded = match pager.total() {
        Some(total) => format!("{} of {}", pager.loaded(), total),
        None => format!("{} loaded", pager.loaded()),
    };
    if pager.has_more() {
        format!("{loaded}, more below")
    } else {
        loaded
    }
}

/// Wrap only the lines needed to fill `height` rows starting at line `row`.
/// Near the end of the value, earlier lines are pulled in so the last line
/// sits at the bottom of the pane.
fn wrap_window(
    raw_lines: &[&str],
    row: usize,
    width: usize,
    height: usize,
) -> Vec<Line<'static>> {
    let wrap = |raw: &str| -> Vec<Line<'static>> {
        textwrap::wrap(raw, width)
            .into_iter()
            .map(|piece| Line::raw(piece.into_owned()))
            .collect()
    };
    let height = height.max(1);

    let mut below = Vec::new();
    for raw in raw_lines[row..].iter().copied() {
        if below.len() >= height {
            break;
        }
        below.extend(wrap(raw));
    }
    below.truncate(height);

    let mut above: Vec<Line<'static>> = Vec::new();
    let mut first = row;
    while above.len() + below.len() < height && first > 0 {
        first -= 1;
        let mut earlier = wrap(raw_lines[first]);
        earlier.append(&mut above);
        above = earlier;
    }
    let missing = height - below.len();
    let mut lines = above.split_off(above.len().saturating_sub(missing));
    lines.extend(below);
    lines
}

fn footer(detail: &KeyDetail, row: usize) -> String {
    let mut parts = Vec::new();
    if let Some(ttl) = detail.ttl {
        parts.push(format_ttl(ttl));
    }
    match &detail.view {
        ValueView::String(s) => {
            if s.lines() > 1 {
                parts.push(format!("line {} of {}", row.min(s.lines() - 1) + 1, s.lines()));
            }
            parts.push(format!("{} bytes", s.size));
            if s.is_json {
                parts.push("json".to_string());
            }
        }
        ValueView::Unsupported => {}
        view => {
            if let Some(pager) = view.pagination() {
                parts.push(progress(pager));
            }
        }
    }
    if detail.is_loading_more() {
        parts.push("loading...".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {} ", parts.join(" │ "))
    }
}

impl ValuePane<'_> {
    fn block(&self, width: u16) -> Block<'static> {
        let name = truncate_to_width(&self.entry.name, (width as usize).saturating_sub(16));
        let title = Line::from(vec![
            Span::raw(" "),
            Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled(
                format!("{} ", self.entry.kind.label()),
                Style::default().fg(kind_color(self.entry.kind)),
            ),
        ]);
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(title)
            .padding(Padding::horizontal(1));
        if let Some(detail) = self.detail {
            block = block.title_bottom(Line::from(footer(detail, self.row)).right_aligned());
        }
        block
    }

    fn render_message(&self, frame: &mut Frame, area: Rect, block: Block, message: &str) {
        let paragraph = Paragraph::new(message.to_string())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, area);
    }

    fn render_string(&mut self, frame: &mut Frame, inner: Rect, value: &StringValue) {
        let width = inner.width.max(1);
        let raw_lines: Vec<&str> = if value.text.is_empty() {
            vec![""]
        } else {
            value.text.lines().collect()
        };
        let row = self.row.min(raw_lines.len() - 1);
        let lines = wrap_window(&raw_lines, row, width as usize, inner.height as usize);
        let window_height = u16::try_from(lines.len()).unwrap_or(u16::MAX);

        let mut scroll_view = ScrollView::new(Size::new(width, window_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Never)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);
        scroll_view.render_widget(
            Paragraph::new(lines),
            Rect::new(0, 0, width, window_height),
        );
        self.state.scroll_state.set_offset(Position { x: 0, y: 0 });
        frame.render_stateful_widget(scroll_view, inner, &mut self.state.scroll_state);
    }

    fn render_list(&mut self, frame: &mut Frame, inner: Rect, items: Vec<ListItem>) {
        let list = List::new(items).highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        self.state.list_state.select(Some(self.row));
        frame.render_stateful_widget(list, inner, &mut self.state.list_state);
    }
}

impl Component for ValuePane<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let block = self.block(area.width);
        let Some(detail) = self.detail else {
            let message = if self.loading { "Loading..." } else { "" };
            self.render_message(frame, area, block, message);
            return;
        };

        if detail.view == ValueView::Unsupported {
            self.render_message(
                frame,
                area,
                block,
                "This key's type can't be displayed.",
            );
            return;
        }

        let inner = block.inner(area);
        frame.render_widget(block, area);

        match &detail.view {
            ValueView::String(value) => self.render_string(frame, inner, value),
            ValueView::List(paged) => {
                let width = paged.items().len().to_string().len();
                let items = paged
                    .items()
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        Line::from(vec![
                            Span::styled(
                                format!("{i:>width$}  "),
                                Style::default().fg(Color::DarkGray),
                            ),
                            Span::raw(item.clone()),
                        ])
                        .into()
                    })
                    .collect();
                self.render_list(frame, inner, items);
            }
            ValueView::Set(paged) => {
                let items = paged
                    .items()
                    .iter()
                    .map(|member| ListItem::new(member.clone()))
                    .collect();
                self.render_list(frame, inner, items);
            }
            ValueView::ZSet(paged) => {
                let items = paged
                    .items()
                    .iter()
                    .map(|(member, score)| {
                        Line::from(vec![
                            Span::raw(member.clone()),
                            Span::styled(
                                format!("  ({})", format_score(*score)),
                                Style::default().fg(Color::DarkGray),
                            ),
                        ])
                        .into()
                    })
                    .collect();
                self.render_list(frame, inner, items);
            }
            ValueView::Hash(paged) => {
                let rows = paged
                    .items()
                    .iter()
                    .map(|(field, value)| Row::new(vec![field.clone(), value.clone()]));
                let header = Row::new(vec!["field", "value"])
                    .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::DarkGray));
                let table = Table::new(rows, [Constraint::Percentage(35), Constraint::Percentage(65)])
                    .header(header)
                    .column_spacing(2)
                    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
                self.state.table_state.select(Some(self.row));
                frame.render_stateful_widget(table, inner, &mut self.state.table_state);
            }
            ValueView::Unsupported => {}
        }
    }
}

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::core::state::{NavigationState, Screen};
use crate::tui::component::Component;
use crate::tui::components::{KeyList, StatusLine, TitleBar, ValuePane};
use crate::tui::{InputMode, TuiState};

/// Draw one frame. Reads the navigation state; only presentation state in
/// `tui` is written.
pub fn draw_ui(frame: &mut Frame, state: &NavigationState, tui: &mut TuiState, spinner_frame: usize) {
    use Constraint::{Length, Min};
    let layout = Layout::vertical([Length(1), Min(0), Length(1)]);
    let [title_area, main_area, status_area] = layout.areas(frame.area());

    // Rows visible inside the bordered main area, used as the page step.
    tui.page_rows = main_area.height.saturating_sub(2).max(1) as usize;

    let mut title_bar = TitleBar::new(
        state.source_name.clone(),
        state.key_count,
        state.lister.pattern().to_string(),
    );
    title_bar.loading = state.loading();
    title_bar.spinner_frame = spinner_frame;
    title_bar.render(frame, title_area);

    match (state.screen, state.opened.as_ref()) {
        (Screen::Detail, Some(entry)) => ValuePane {
            entry,
            detail: state.detail.as_ref(),
            row: state.detail_row,
            loading: state.is_detail_loading(),
            state: &mut tui.value_pane,
        }
        .render(frame, main_area),
        _ => KeyList {
            page: state.key_page(),
            selected: state.selected_index,
            pattern: state.lister.pattern(),
            loading: state.lister.is_in_flight(),
            list_state: &mut tui.key_list,
        }
        .render(frame, main_area),
    }

    match tui.input_mode {
        InputMode::Filter => tui.filter.render(frame, status_area),
        InputMode::Browse => StatusLine {
            screen: state.screen,
            error: state.error.as_ref(),
        }
        .render(frame, status_area),
    }
}

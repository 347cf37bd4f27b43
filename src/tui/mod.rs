//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Event Loop
//!
//! Input events and fetch completions meet in one loop. Fetches run as tokio
//! tasks and send their result `Action` back over an `mpsc` channel; the loop
//! drains terminal events first, then the channel, and feeds everything
//! through `core::action::update()` in arrival order.
//!
//! ## Redraw Strategy
//!
//! - **Loading**: draws every ~80ms so the spinner moves.
//! - **Idle**: sleeps up to 500ms, only redraws on events or fetch results.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use ratatui::widgets::ListState;

use crate::core::action::{Action, Effect, Request, update};
use crate::core::config::ResolvedConfig;
use crate::core::state::{NavigationState, Screen};
use crate::core::task::perform;
use crate::store::DataSource;
use crate::tui::component::EventHandler;
use crate::tui::components::{FilterBox, FilterEvent, ValuePaneState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// Modal input mode: determines how keyboard events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keys navigate.
    Browse,
    /// Keys edit the match pattern.
    Filter,
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub input_mode: InputMode,
    pub filter: FilterBox,
    pub key_list: ListState,
    pub value_pane: ValuePaneState,
    /// Visible rows in the main area as of the last frame.
    pub page_rows: usize,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            input_mode: InputMode::Browse,
            filter: FilterBox::default(),
            key_list: ListState::default(),
            value_pane: ValuePaneState::default(),
            page_rows: 10,
        }
    }
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        execute!(stdout(), EnableMouseCapture, EnableBracketedPaste)?;
        info!("Terminal modes enabled (mouse, bracketed paste)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableMouseCapture, DisableBracketedPaste);
    }
}

/// Map a browse-mode event to a core action.
fn browse_action(event: &TuiEvent, state: &NavigationState, page_rows: usize) -> Option<Action> {
    let in_detail = state.screen == Screen::Detail;
    match event {
        TuiEvent::ForceQuit | TuiEvent::InputChar('q') => Some(Action::Quit),
        TuiEvent::CursorUp | TuiEvent::ScrollUp | TuiEvent::InputChar('k') => Some(Action::Up),
        TuiEvent::CursorDown | TuiEvent::ScrollDown | TuiEvent::InputChar('j') => {
            Some(Action::Down)
        }
        TuiEvent::PageUp => Some(Action::PageUp(page_rows)),
        TuiEvent::PageDown => Some(Action::PageDown(page_rows)),
        TuiEvent::Home | TuiEvent::InputChar('g') => Some(Action::Top),
        TuiEvent::End | TuiEvent::InputChar('G') => Some(Action::Bottom),
        TuiEvent::InputChar('r') => Some(Action::Refresh),
        TuiEvent::Escape if state.error.is_some() => Some(Action::DismissError),
        TuiEvent::Submit | TuiEvent::CursorRight | TuiEvent::InputChar('l') if !in_detail => {
            Some(Action::Open)
        }
        TuiEvent::Escape | TuiEvent::Backspace | TuiEvent::CursorLeft | TuiEvent::InputChar('h')
            if in_detail =>
        {
            Some(Action::Back)
        }
        _ => None,
    }
}

/// Start the I/O an effect asks for. Returns true if the effect is `Quit`.
fn dispatch(effect: Effect, source: &Arc<dyn DataSource>, tx: &mpsc::Sender<Action>) -> bool {
    match effect {
        Effect::None => false,
        Effect::Quit => true,
        Effect::Fetch(request) => {
            spawn_request(request, Arc::clone(source), tx.clone());
            false
        }
        Effect::Batch(effects) => {
            let mut quit = false;
            for effect in effects {
                quit |= dispatch(effect, source, tx);
            }
            quit
        }
    }
}

fn spawn_request(request: Request, source: Arc<dyn DataSource>, tx: mpsc::Sender<Action>) {
    debug!("Spawning {:?}", request);
    tokio::spawn(async move {
        let action = perform(source.as_ref(), request).await;
        if tx.send(action).is_err() {
            warn!("Failed to deliver fetch result: receiver dropped");
        }
    });
}

pub fn run(source: Arc<dyn DataSource>, config: &ResolvedConfig) -> std::io::Result<()> {
    let mut state = NavigationState::new(source.name().to_string(), config);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new().inspect_err(|e| {
        warn!("Could not enable terminal modes: {}", e);
    });

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();

    let start_time = std::time::Instant::now();
    let mut needs_redraw = true; // Force first frame
    let mut should_quit = dispatch(update(&mut state, Action::Start), &source, &tx);

    while !should_quit {
        let animating = state.loading();
        if animating {
            needs_redraw = true;
        }

        if needs_redraw {
            let spinner_frame = (start_time.elapsed().as_secs_f32() * 12.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, &state, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        // Dynamic poll timeout: short while loading, long when idle
        let timeout = if animating {
            std::time::Duration::from_millis(80)
        } else {
            std::time::Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Process first event + drain ALL pending events before next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if matches!(event, TuiEvent::Resize) {
                continue;
            }

            let action = match tui.input_mode {
                InputMode::Filter => {
                    if event == TuiEvent::ForceQuit {
                        Some(Action::Quit)
                    } else {
                        match tui.filter.handle_event(&event) {
                            Some(FilterEvent::Apply(pattern)) => {
                                tui.input_mode = InputMode::Browse;
                                info!("Applying pattern {:?}", pattern);
                                Some(Action::SetPattern(pattern))
                            }
                            Some(FilterEvent::Cancel) => {
                                tui.input_mode = InputMode::Browse;
                                None
                            }
                            Some(FilterEvent::Changed) | None => None,
                        }
                    }
                }
                InputMode::Browse => {
                    if event == TuiEvent::InputChar('/') && state.screen == Screen::List {
                        tui.filter = FilterBox::new(state.lister.pattern());
                        tui.input_mode = InputMode::Filter;
                        None
                    } else {
                        browse_action(&event, &state, tui.page_rows)
                    }
                }
            };

            if let Some(action) = action {
                let leaving_detail = matches!(action, Action::Back | Action::Open);
                should_quit |= dispatch(update(&mut state, action), &source, &tx);
                if leaving_detail {
                    tui.value_pane.reset();
                }
            }
        }

        if should_quit {
            break;
        }

        // Handle fetch results
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            should_quit |= dispatch(update(&mut state, action), &source, &tx);
        }
    }

    info!("Shutting down");
    ratatui::restore();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyEntry, KeyType, ScanBatch, StoreError};
    use crate::test_support::test_state;

    fn state_with_keys() -> NavigationState {
        let mut state = test_state(10, 10);
        let Effect::Fetch(Request::Keys(request)) = update(&mut state, Action::Down) else {
            panic!("expected key fetch");
        };
        update(
            &mut state,
            Action::KeysLoaded {
                request,
                result: Ok(ScanBatch {
                    keys: vec![KeyEntry::new("a", KeyType::String)],
                    next_cursor: 0,
                }),
            },
        );
        state
    }

    #[test]
    fn test_browse_keys_in_list() {
        let state = state_with_keys();
        assert_eq!(
            browse_action(&TuiEvent::Submit, &state, 5),
            Some(Action::Open)
        );
        assert_eq!(
            browse_action(&TuiEvent::PageDown, &state, 5),
            Some(Action::PageDown(5))
        );
        assert_eq!(
            browse_action(&TuiEvent::ScrollDown, &state, 5),
            Some(Action::Down)
        );
        assert_eq!(
            browse_action(&TuiEvent::InputChar('q'), &state, 5),
            Some(Action::Quit)
        );
        assert_eq!(browse_action(&TuiEvent::Escape, &state, 5), None);
    }

    #[test]
    fn test_browse_keys_in_detail() {
        let mut state = state_with_keys();
        update(&mut state, Action::Open);
        assert_eq!(
            browse_action(&TuiEvent::Escape, &state, 5),
            Some(Action::Back)
        );
        assert_eq!(
            browse_action(&TuiEvent::CursorLeft, &state, 5),
            Some(Action::Back)
        );
        assert_eq!(browse_action(&TuiEvent::Submit, &state, 5), None);
    }

    #[test]
    fn test_escape_dismisses_error_first() {
        let mut state = state_with_keys();
        update(&mut state, Action::Open);
        state.error = Some(StoreError::Connection("timeout".into()));
        assert_eq!(
            browse_action(&TuiEvent::Escape, &state, 5),
            Some(Action::DismissError)
        );
    }

    #[test]
    fn test_draw_list_and_detail() {
        use ratatui::Terminal;
        use ratatui::backend::TestBackend;

        let mut state = state_with_keys();
        let mut tui = TuiState::new();
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();

        terminal
            .draw(|f| ui::draw_ui(f, &state, &mut tui, 0))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Keys"));
        assert!(text.contains("memory"));
        assert_eq!(tui.page_rows, 8);

        update(&mut state, Action::Open);
        terminal
            .draw(|f| ui::draw_ui(f, &state, &mut tui, 0))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Loading..."));
        assert!(text.contains("Esc back"));
        assert!(text.contains(components::title_bar::SPINNER[0]));
    }
}

//! # Actions
//!
//! Everything that can happen in the browser becomes an `Action`.
//! User presses Enter? That's `Action::Open`.
//! A `SCAN` completes? That's `Action::KeysLoaded { request, result }`.
//!
//! The `update()` function takes the current state and an action, mutates the
//! state and returns an [`Effect`] describing the I/O the runtime should start.
//! No side effects here. I/O happens in `core::task`.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! Input events and fetch completions arrive on the same channel, so every
//! state change happens on one thread in one order.

use log::debug;

use crate::core::lister::{Merge, PageRequest};
use crate::core::loader::{KeyDetail, LoadedSlice, MoreSlice, SliceRequest};
use crate::core::state::{MAX_TYPE_RETRIES, NavigationState, Screen};
use crate::store::{KeyEntry, KeyType, ScanBatch, StoreError};

/// Re-check of a key's type after its value came back with a different one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub ticket: u64,
    pub key: String,
}

/// I/O the runtime performs on behalf of `update()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Keys(PageRequest),
    KeyCount,
    Slice(SliceRequest),
    Probe(ProbeRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Quit,
    Fetch(Request),
    Batch(Vec<Effect>),
}

impl Effect {
    fn batch(effects: Vec<Effect>) -> Effect {
        let mut effects: Vec<Effect> = effects
            .into_iter()
            .filter(|e| *e != Effect::None)
            .collect();
        match effects.len() {
            0 => Effect::None,
            1 => effects.remove(0),
            _ => Effect::Batch(effects),
        }
    }

    fn keys(request: Option<PageRequest>) -> Effect {
        request.map_or(Effect::None, |r| Effect::Fetch(Request::Keys(r)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Initial page of keys and the key count.
    Start,
    Up,
    Down,
    PageUp(usize),
    PageDown(usize),
    Top,
    Bottom,
    /// Open the key at this index of the key page.
    Select(usize),
    /// Open the highlighted key.
    Open,
    Back,
    Refresh,
    SetPattern(String),
    DismissError,
    Quit,

    // Fetch completions
    KeysLoaded {
        request: PageRequest,
        result: Result<ScanBatch, StoreError>,
    },
    KeyCountLoaded(Result<Option<u64>, StoreError>),
    SliceLoaded {
        request: SliceRequest,
        result: Result<LoadedSlice, StoreError>,
    },
    TypeProbed {
        request: ProbeRequest,
        result: Result<KeyType, StoreError>,
    },
}

pub fn update(state: &mut NavigationState, action: Action) -> Effect {
    match action {
        Action::Start => Effect::batch(vec![
            Effect::keys(state.lister.request_next_page()),
            Effect::Fetch(Request::KeyCount),
        ]),

        Action::Up => move_cursor(state, false, |row, _| row.saturating_sub(1)),
        Action::PageUp(step) => {
            move_cursor(state, false, |row, _| row.saturating_sub(step.max(1)))
        }
        Action::Top => move_cursor(state, false, |_, _| 0),
        Action::Down => move_cursor(state, true, |row, _| row + 1),
        Action::PageDown(step) => move_cursor(state, true, |row, _| row + step.max(1)),
        Action::Bottom => move_cursor(state, true, |_, rows| rows),

        Action::Select(index) => select(state, index),
        Action::Open => select(state, state.selected_index),

        Action::Back => {
            if state.screen == Screen::Detail {
                state.close_detail();
            }
            Effect::None
        }

        Action::Refresh => match state.screen {
            Screen::List => {
                let pattern = state.lister.pattern().to_string();
                state.lister.reset(&pattern);
                state.selected_index = 0;
                Effect::batch(vec![
                    Effect::keys(state.lister.request_next_page()),
                    Effect::Fetch(Request::KeyCount),
                ])
            }
            Screen::Detail => match state.opened.clone() {
                Some(entry) => {
                    state.type_retries = 0;
                    open(state, entry)
                }
                None => Effect::None,
            },
        },

        Action::SetPattern(pattern) => {
            if state.screen != Screen::List {
                return Effect::None;
            }
            state.lister.reset(&pattern);
            state.selected_index = 0;
            Effect::keys(state.lister.request_next_page())
        }

        Action::DismissError => {
            state.error = None;
            Effect::None
        }

        Action::Quit => Effect::Quit,

        Action::KeysLoaded { request, result } => {
            match result {
                Ok(batch) => {
                    if state.lister.merge(&request, batch) == Merge::Applied {
                        state.error = None;
                    }
                }
                Err(e) => {
                    if state.lister.fail(&request) == Merge::Applied {
                        state.error = Some(e);
                    }
                }
            }
            Effect::None
        }

        Action::KeyCountLoaded(result) => {
            match result {
                Ok(count) => state.key_count = count,
                Err(e) => state.error = Some(e),
            }
            Effect::None
        }

        Action::SliceLoaded { request, result } => {
            if !is_current_slice(state, &request) {
                debug!(
                    "Dropping stale value of {} (ticket {}, current {})",
                    request.key, request.ticket, state.detail_ticket
                );
                return Effect::None;
            }
            match result {
                Ok(loaded) if request.initial => {
                    state.detail = Some(KeyDetail::new(&request, loaded));
                    state.detail_loading = false;
                    state.error = None;
                    follow_empty_scan(state, 0)
                }
                Ok(loaded) => {
                    let Some(detail) = state.detail.as_mut() else {
                        return Effect::None;
                    };
                    let before = detail.view.loaded();
                    if detail.extend(&request, loaded.fragment) != Merge::Applied {
                        return Effect::None;
                    }
                    state.error = None;
                    follow_empty_scan(state, before)
                }
                Err(e) => value_failed(state, &request.key, e),
            }
        }

        Action::TypeProbed { request, result } => {
            let current = request.ticket == state.detail_ticket
                && state.screen == Screen::Detail
                && state.opened.as_ref().is_some_and(|e| e.name == request.key);
            if !current {
                return Effect::None;
            }
            match result {
                Ok(kind) => {
                    debug!("{} is now a {}, reloading", request.key, kind);
                    state.lister.page_mut().retype(&request.key, kind);
                    open(state, KeyEntry::new(request.key, kind))
                }
                Err(e) => value_failed(state, &request.key, e),
            }
        }
    }
}

/// Move the cursor on the current screen. Moving forward onto the last row
/// asks for the next page.
fn move_cursor(
    state: &mut NavigationState,
    forward: bool,
    target: impl FnOnce(usize, usize) -> usize,
) -> Effect {
    let rows = state.row_count();
    if rows > 0 {
        let row = target(state.cursor_row(), rows).min(rows - 1);
        state.set_cursor_row(row);
    }
    if forward && state.cursor_row() + 1 >= rows {
        load_more(state)
    } else {
        Effect::None
    }
}

fn load_more(state: &mut NavigationState) -> Effect {
    match state.screen {
        Screen::List => Effect::keys(state.lister.request_next_page()),
        Screen::Detail => {
            let ticket = state.detail_ticket;
            let limit = state.value_page_size;
            let Some(detail) = state.detail.as_mut() else {
                return Effect::None;
            };
            let offset = detail.view.loaded();
            match detail.request_more(offset, limit) {
                MoreSlice::Fetch(start) => Effect::Fetch(Request::Slice(SliceRequest {
                    ticket,
                    key: detail.key.clone(),
                    kind: detail.kind,
                    start,
                    limit,
                    initial: false,
                })),
                MoreSlice::Rejected | MoreSlice::Idle | MoreSlice::ServedLocally => Effect::None,
            }
        }
    }
}

/// HSCAN/SSCAN may return no elements while the cursor is still live. Keep
/// following the cursor until a fragment brings something to show.
fn follow_empty_scan(state: &mut NavigationState, before: usize) -> Effect {
    let stalled = state
        .detail
        .as_ref()
        .is_some_and(|d| d.view.loaded() == before && d.view.has_more());
    if stalled {
        debug!("Empty scan fragment with a live cursor, fetching on");
        load_more(state)
    } else {
        Effect::None
    }
}

fn select(state: &mut NavigationState, index: usize) -> Effect {
    if state.screen != Screen::List {
        return Effect::None;
    }
    let Some(entry) = state.key_page().get(index).cloned() else {
        return Effect::None;
    };
    state.selected_index = index;
    state.screen = Screen::Detail;
    state.type_retries = 0;
    open(state, entry)
}

/// Issue the first page of `entry`'s value under a fresh ticket.
fn open(state: &mut NavigationState, entry: KeyEntry) -> Effect {
    state.detail_ticket += 1;
    state.detail_loading = true;
    state.detail = None;
    state.detail_row = 0;
    let request = SliceRequest::initial(state.detail_ticket, &entry, state.value_page_size);
    state.opened = Some(entry);
    Effect::Fetch(Request::Slice(request))
}

fn is_current_slice(state: &NavigationState, request: &SliceRequest) -> bool {
    request.ticket == state.detail_ticket
        && state.screen == Screen::Detail
        && state
            .opened
            .as_ref()
            .is_some_and(|e| e.name == request.key && e.kind == request.kind)
}

fn value_failed(state: &mut NavigationState, key: &str, error: StoreError) -> Effect {
    if let Some(detail) = state.detail.as_mut() {
        detail.abandon_more();
    }
    match error {
        StoreError::NotFound(_) => {
            state.close_detail();
            state.error = Some(error);
            Effect::None
        }
        StoreError::TypeMismatch { .. } if state.type_retries < MAX_TYPE_RETRIES => {
            state.type_retries += 1;
            state.detail_loading = true;
            Effect::Fetch(Request::Probe(ProbeRequest {
                ticket: state.detail_ticket,
                key: key.to_string(),
            }))
        }
        other => {
            state.detail_loading = false;
            state.error = Some(other);
            Effect::None
        }
    }
}

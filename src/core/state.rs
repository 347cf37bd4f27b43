//! # Navigation State
//!
//! Core browsing state. Domain logic only, no TUI-specific types.
//! Presentation state (filter input, scroll offsets) lives in the `tui` module.
//!
//! ```text
//! NavigationState
//! ├── screen: Screen                 // List or Detail
//! ├── selected_index: usize          // row in the key list
//! ├── lister: KeyLister              // key page + scan bookkeeping
//! ├── opened: Option<KeyEntry>       // key shown in Detail
//! ├── detail: Option<KeyDetail>      // its loaded value
//! ├── detail_row: usize              // row in the value pane
//! ├── error: Option<StoreError>      // last failure, shown until dismissed
//! ├── key_count: Option<u64>         // DBSIZE
//! └── source_name: String            // title bar label
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.

use crate::core::config::ResolvedConfig;
use crate::core::lister::{KeyLister, KeyPage};
use crate::core::loader::KeyDetail;
use crate::store::{KeyEntry, StoreError};

/// How many times a single selection may re-probe a key whose type changed
/// under it before the mismatch is reported.
pub const MAX_TYPE_RETRIES: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,
    Detail,
}

pub struct NavigationState {
    pub screen: Screen,
    pub selected_index: usize,
    pub lister: KeyLister,
    pub opened: Option<KeyEntry>,
    pub detail: Option<KeyDetail>,
    pub detail_row: usize,
    pub error: Option<StoreError>,
    pub key_count: Option<u64>,
    pub source_name: String,
    pub value_page_size: usize,
    /// Bumped on every selection and on leaving Detail. Value results carry
    /// the ticket they were issued with.
    pub(crate) detail_ticket: u64,
    /// Waiting for the first fragment of `opened`.
    pub(crate) detail_loading: bool,
    pub(crate) type_retries: u8,
}

impl NavigationState {
    pub fn new(source_name: String, config: &ResolvedConfig) -> Self {
        Self {
            screen: Screen::List,
            selected_index: 0,
            lister: KeyLister::new(config.key_page_size),
            opened: None,
            detail: None,
            detail_row: 0,
            error: None,
            key_count: None,
            source_name,
            value_page_size: config.value_page_size.max(1),
            detail_ticket: 0,
            detail_loading: false,
            type_retries: 0,
        }
    }

    pub fn key_page(&self) -> &KeyPage {
        self.lister.page()
    }

    pub fn selected_key(&self) -> Option<&KeyEntry> {
        self.key_page().get(self.selected_index)
    }

    /// Any fetch outstanding that the user is waiting on.
    pub fn loading(&self) -> bool {
        self.lister.is_in_flight()
            || self.detail_loading
            || self.detail.as_ref().is_some_and(|d| d.is_loading_more())
    }

    pub fn is_detail_loading(&self) -> bool {
        self.detail_loading
    }

    /// Rows the cursor can move over on the current screen.
    pub(crate) fn row_count(&self) -> usize {
        match self.screen {
            Screen::List => self.key_page().len(),
            Screen::Detail => self.detail.as_ref().map_or(0, |d| d.view.rows()),
        }
    }

    pub(crate) fn cursor_row(&self) -> usize {
        match self.screen {
            Screen::List => self.selected_index,
            Screen::Detail => self.detail_row,
        }
    }

    pub(crate) fn set_cursor_row(&mut self, row: usize) {
        match self.screen {
            Screen::List => self.selected_index = row,
            Screen::Detail => self.detail_row = row,
        }
    }

    /// Leave Detail without touching the key page or the list selection.
    pub(crate) fn close_detail(&mut self) {
        self.screen = Screen::List;
        self.opened = None;
        self.detail = None;
        self.detail_row = 0;
        self.detail_loading = false;
        self.type_retries = 0;
        self.detail_ticket += 1;
    }
}

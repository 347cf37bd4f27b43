//! # Key Lister
//!
//! Turns cursor-based `SCAN` enumeration into display pages.
//!
//! ```text
//! request_next_page() ──► PageRequest ──► fetch_page() (async, off-thread)
//!                                               │
//!        merge() ◄── Action::KeysLoaded ◄───────┘
//! ```
//!
//! Every request carries the generation ticket, pattern and cursor it was
//! issued with. `merge()` only applies a result whose request still matches the
//! lister; anything else is stale and dropped untouched.

use std::collections::HashMap;

use log::debug;

use crate::store::{DataSource, KeyEntry, KeyType, ScanBatch, StoreError};

/// Upper bound on `SCAN` round trips spent filling a single page. Sparse
/// patterns over a large keyspace return many empty batches; the partial page
/// is delivered and the next scroll resumes from the cursor.
pub const MAX_SCAN_ROUNDS: usize = 64;

pub const MATCH_ALL: &str = "*";

/// Keys enumerated so far for the active pattern.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyPage {
    /// Raw entries in server enumeration order, duplicates included.
    entries: Vec<KeyEntry>,
    cursor: u64,
    exhausted: bool,
    /// Indices into `entries` shown to the user: one per key name, at the
    /// position where the name was last seen.
    display: Vec<usize>,
}

impl KeyPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Cursor to resume enumeration from.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of distinct keys shown.
    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// The `index`-th displayed key.
    pub fn get(&self, index: usize) -> Option<&KeyEntry> {
        self.display.get(index).map(|&i| &self.entries[i])
    }

    /// Displayed keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyEntry> {
        self.display.iter().map(|&i| &self.entries[i])
    }

    fn append(&mut self, batch: ScanBatch) {
        self.entries.extend(batch.keys);
        self.cursor = batch.next_cursor;
        if batch.next_cursor == 0 {
            self.exhausted = true;
        }
        self.rebuild_display();
    }

    /// Replace every entry named `name` with one of type `kind`.
    pub fn retype(&mut self, name: &str, kind: KeyType) {
        for entry in self.entries.iter_mut().filter(|e| e.name == name) {
            *entry = KeyEntry::new(name, kind);
        }
    }

    fn rebuild_display(&mut self) {
        let mut last_seen: HashMap<&str, usize> = HashMap::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            last_seen.insert(entry.name.as_str(), i);
        }
        self.display = (0..self.entries.len())
            .filter(|i| last_seen.get(self.entries[*i].name.as_str()) == Some(i))
            .collect();
    }
}

/// A pending request for the next page of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: u64,
    pub pattern: String,
    pub cursor: u64,
    pub limit: usize,
}

/// Outcome of merging a completed page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Applied,
    Stale,
}

/// Owns the key page and the pagination bookkeeping around it.
#[derive(Debug, Clone)]
pub struct KeyLister {
    page: KeyPage,
    pattern: String,
    ticket: u64,
    in_flight: bool,
    page_size: usize,
}

impl KeyLister {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: KeyPage::new(),
            pattern: MATCH_ALL.to_string(),
            ticket: 0,
            in_flight: false,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> &KeyPage {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut KeyPage {
        &mut self.page
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Issue a request for the next page, unless the page is exhausted or a
    /// request for it is already outstanding.
    pub fn request_next_page(&mut self) -> Option<PageRequest> {
        if self.page.exhausted || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(PageRequest {
            ticket: self.ticket,
            pattern: self.pattern.clone(),
            cursor: self.page.cursor,
            limit: self.page_size,
        })
    }

    /// Start over with `pattern` (an empty pattern matches everything).
    /// Outstanding requests become stale.
    pub fn reset(&mut self, pattern: &str) {
        let pattern = pattern.trim();
        self.pattern = if pattern.is_empty() {
            MATCH_ALL.to_string()
        } else {
            pattern.to_string()
        };
        self.ticket += 1;
        self.page = KeyPage::new();
        self.in_flight = false;
    }

    fn is_current(&self, request: &PageRequest) -> bool {
        request.ticket == self.ticket
            && request.pattern == self.pattern
            && request.cursor == self.page.cursor
            && !self.page.exhausted
    }

    /// Apply a completed fetch if it still belongs to this lister.
    pub fn merge(&mut self, request: &PageRequest, batch: ScanBatch) -> Merge {
        if !self.is_current(request) {
            debug!(
                "Dropping stale key page (ticket {} pattern {:?}, current ticket {} pattern {:?})",
                request.ticket, request.pattern, self.ticket, self.pattern
            );
            return Merge::Stale;
        }
        self.in_flight = false;
        self.page.append(batch);
        Merge::Applied
    }

    /// Record a failed fetch. Returns `Merge::Stale` if the failure belongs to
    /// a superseded request and should be ignored.
    pub fn fail(&mut self, request: &PageRequest) -> Merge {
        if !self.is_current(request) {
            return Merge::Stale;
        }
        self.in_flight = false;
        Merge::Applied
    }
}

/// Fetch one display page: keep scanning until `limit` keys are collected or
/// the enumeration completes.
pub async fn fetch_page(
    source: &dyn DataSource,
    request: &PageRequest,
) -> Result<ScanBatch, StoreError> {
    let mut keys = Vec::new();
    let mut cursor = request.cursor;

    for _ in 0..MAX_SCAN_ROUNDS {
        let wanted = request.limit.saturating_sub(keys.len()).max(1);
        let batch = source.list_keys(&request.pattern, cursor, wanted).await?;
        keys.extend(batch.keys);
        cursor = batch.next_cursor;
        if cursor == 0 || keys.len() >= request.limit {
            break;
        }
    }

    Ok(ScanBatch {
        keys,
        next_cursor: cursor,
    })
}

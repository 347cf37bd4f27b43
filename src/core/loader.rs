//! # Value Loader
//!
//! Fetches a key's value one bounded page at a time and keeps what has been
//! loaded in a [`ValueView`].
//!
//! ```text
//! ValueView
//! ├── String(StringValue)               whole value, no paging
//! ├── List(Paged<String>)               LRANGE by index
//! ├── Hash(Paged<(String, String)>)     HSCAN by cursor
//! ├── Set(Paged<String>)                SSCAN by cursor
//! ├── ZSet(Paged<(String, f64)>)        ZRANGE by index
//! └── Unsupported                       streams, module types
//! ```
//!
//! `Paged<T>` tracks the loaded items, the start offset of the latest
//! fragment, the collection total (when known) and, for cursor-addressed
//! kinds, the scan cursor plus a backlog of items a scan returned beyond the
//! page size. Fragments merged into a view never exceed the page size.

use futures::join;
use log::debug;

use crate::core::lister::Merge;
use crate::store::{Chunk, DataSource, Fragment, KeyEntry, KeyType, SliceStart, StoreError, Ttl};

// ============================================================================
// Paged collections
// ============================================================================

/// Type-independent paging behaviour shared by every collection variant.
pub trait Pagination {
    /// Items loaded so far.
    fn loaded(&self) -> usize;
    /// Start index of the most recently merged fragment.
    fn offset(&self) -> usize;
    /// Collection size, if known.
    fn total(&self) -> Option<usize>;
    /// Whether another page can be requested.
    fn has_more(&self) -> bool;
    /// Where the next remote fetch starts.
    fn next_start(&self) -> SliceStart;
    /// Whether the next page can be served from the local backlog.
    fn can_serve_locally(&self, limit: usize) -> bool;
    /// Move up to `limit` items from the backlog into the loaded items.
    fn serve_local(&mut self, limit: usize);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    items: Vec<T>,
    offset: usize,
    total: Option<usize>,
    cursor: Option<u64>,
    backlog: Vec<T>,
    drained: bool,
}

impl<T> Paged<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            offset: 0,
            total: None,
            cursor: None,
            backlog: Vec::new(),
            drained: false,
        }
    }

    fn first(chunk: Chunk<T>, limit: usize) -> Self {
        let mut paged = Self::empty();
        paged.absorb(chunk, limit);
        paged
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Merge a fetched chunk: the backlog is consumed first, at most `limit`
    /// items become visible, the rest is kept for later.
    fn absorb(&mut self, chunk: Chunk<T>, limit: usize) {
        let mut incoming = std::mem::take(&mut self.backlog);
        incoming.extend(chunk.items);
        let take = incoming.len().min(limit.max(1));
        self.backlog = incoming.split_off(take);

        // A scan may return nothing while its cursor is still live; only an
        // index-addressed fragment ends the collection by being empty.
        if incoming.is_empty() && chunk.next_cursor.is_none() {
            self.drained = true;
        }
        self.offset = self.items.len();
        self.items.extend(incoming);

        if chunk.next_cursor.is_some() {
            self.cursor = chunk.next_cursor;
        }
        if let Some(total) = chunk.total {
            // The collection may shrink between pages; never report fewer than
            // what is already on screen.
            self.total = Some(total.max(self.items.len() + self.backlog.len()));
        }
    }
}

impl<T> Pagination for Paged<T> {
    fn loaded(&self) -> usize {
        self.items.len()
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn total(&self) -> Option<usize> {
        self.total
    }

    fn has_more(&self) -> bool {
        if !self.backlog.is_empty() {
            return true;
        }
        if self.drained || self.cursor == Some(0) {
            return false;
        }
        match self.total {
            Some(total) => self.items.len() < total,
            None => true,
        }
    }

    fn next_start(&self) -> SliceStart {
        SliceStart {
            offset: self.items.len(),
            cursor: self.cursor.unwrap_or(0),
        }
    }

    fn can_serve_locally(&self, limit: usize) -> bool {
        !self.backlog.is_empty() && (self.backlog.len() >= limit || self.cursor == Some(0))
    }

    fn serve_local(&mut self, limit: usize) {
        let take = self.backlog.len().min(limit.max(1));
        let rest = self.backlog.split_off(take);
        let fragment = std::mem::replace(&mut self.backlog, rest);
        self.offset = self.items.len();
        self.items.extend(fragment);
    }
}

// ============================================================================
// Value views
// ============================================================================

/// A string value, lossily decoded. JSON objects and arrays are pretty-printed.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub text: String,
    pub size: usize,
    pub is_json: bool,
}

impl StringValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        let raw = String::from_utf8_lossy(&bytes).into_owned();
        let pretty = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) if value.is_object() || value.is_array() => {
                serde_json::to_string_pretty(&value).ok()
            }
            _ => None,
        };
        Self {
            is_json: pretty.is_some(),
            text: pretty.unwrap_or(raw),
            size,
        }
    }

    pub fn lines(&self) -> usize {
        self.text.lines().count().max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueView {
    String(StringValue),
    List(Paged<String>),
    Hash(Paged<(String, String)>),
    Set(Paged<String>),
    ZSet(Paged<(String, f64)>),
    Unsupported,
}

impl ValueView {
    fn from_fragment(fragment: Option<Fragment>, limit: usize) -> Self {
        match fragment {
            Some(Fragment::String(bytes)) => ValueView::String(StringValue::from_bytes(bytes)),
            Some(Fragment::List(chunk)) => ValueView::List(Paged::first(chunk, limit)),
            Some(Fragment::Hash(chunk)) => ValueView::Hash(Paged::first(chunk, limit)),
            Some(Fragment::Set(chunk)) => ValueView::Set(Paged::first(chunk, limit)),
            Some(Fragment::ZSet(chunk)) => ValueView::ZSet(Paged::first(chunk, limit)),
            None => ValueView::Unsupported,
        }
    }

    pub fn pagination(&self) -> Option<&dyn Pagination> {
        match self {
            ValueView::List(p) => Some(p as &dyn Pagination),
            ValueView::Hash(p) => Some(p as &dyn Pagination),
            ValueView::Set(p) => Some(p as &dyn Pagination),
            ValueView::ZSet(p) => Some(p as &dyn Pagination),
            ValueView::String(_) | ValueView::Unsupported => None,
        }
    }

    fn pagination_mut(&mut self) -> Option<&mut dyn Pagination> {
        match self {
            ValueView::List(p) => Some(p as &mut dyn Pagination),
            ValueView::Hash(p) => Some(p as &mut dyn Pagination),
            ValueView::Set(p) => Some(p as &mut dyn Pagination),
            ValueView::ZSet(p) => Some(p as &mut dyn Pagination),
            ValueView::String(_) | ValueView::Unsupported => None,
        }
    }

    /// Number of scrollable rows: loaded items, or lines for a string.
    pub fn rows(&self) -> usize {
        match self {
            ValueView::String(s) => s.lines(),
            ValueView::Unsupported => 1,
            _ => self.pagination().map_or(0, |p| p.loaded()),
        }
    }

    pub fn loaded(&self) -> usize {
        self.pagination().map_or(0, |p| p.loaded())
    }

    pub fn has_more(&self) -> bool {
        self.pagination().is_some_and(|p| p.has_more())
    }

    /// Merge a follow-up fragment. Returns false if its kind doesn't match.
    fn absorb(&mut self, fragment: Fragment, limit: usize) -> bool {
        match (self, fragment) {
            (ValueView::List(p), Fragment::List(c)) => p.absorb(c, limit),
            (ValueView::Hash(p), Fragment::Hash(c)) => p.absorb(c, limit),
            (ValueView::Set(p), Fragment::Set(c)) => p.absorb(c, limit),
            (ValueView::ZSet(p), Fragment::ZSet(c)) => p.absorb(c, limit),
            _ => return false,
        }
        true
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A pending value fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub ticket: u64,
    pub key: String,
    pub kind: KeyType,
    pub start: SliceStart,
    pub limit: usize,
    /// First page of a freshly selected key (also fetches the TTL).
    pub initial: bool,
}

impl SliceRequest {
    pub fn initial(ticket: u64, entry: &KeyEntry, limit: usize) -> Self {
        Self {
            ticket,
            key: entry.name.clone(),
            kind: entry.kind,
            start: SliceStart::default(),
            limit,
            initial: true,
        }
    }
}

/// What a completed fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSlice {
    /// `None` when the key's type cannot be paged.
    pub fragment: Option<Fragment>,
    pub ttl: Option<Ttl>,
}

/// Outcome of asking an open detail for more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreSlice {
    /// Offset did not match what is loaded: the caller's view is out of date.
    Rejected,
    /// Nothing left to load, or a fetch is already outstanding.
    Idle,
    /// The page was moved in from the local backlog.
    ServedLocally,
    /// A remote fetch starting here is needed.
    Fetch(SliceStart),
}

/// The value of the key open in the detail screen.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDetail {
    pub key: String,
    pub kind: KeyType,
    pub ttl: Option<Ttl>,
    pub view: ValueView,
    more_in_flight: bool,
}

impl KeyDetail {
    pub fn new(request: &SliceRequest, loaded: LoadedSlice) -> Self {
        Self {
            key: request.key.clone(),
            kind: request.kind,
            ttl: loaded.ttl,
            view: ValueView::from_fragment(loaded.fragment, request.limit),
            more_in_flight: false,
        }
    }

    pub fn is_loading_more(&self) -> bool {
        self.more_in_flight
    }

    /// Extend the view by the next page. `offset` must equal the number of
    /// loaded items.
    pub fn request_more(&mut self, offset: usize, limit: usize) -> MoreSlice {
        if self.more_in_flight {
            return MoreSlice::Idle;
        }
        let Some(pager) = self.view.pagination_mut() else {
            return MoreSlice::Idle;
        };
        if offset != pager.loaded() {
            return MoreSlice::Rejected;
        }
        if !pager.has_more() {
            return MoreSlice::Idle;
        }
        if pager.can_serve_locally(limit) {
            pager.serve_local(limit);
            return MoreSlice::ServedLocally;
        }
        self.more_in_flight = true;
        MoreSlice::Fetch(pager.next_start())
    }

    /// Merge the result of a follow-up fetch if it continues exactly where
    /// the view stops.
    pub fn extend(&mut self, request: &SliceRequest, fragment: Option<Fragment>) -> Merge {
        let continues = !request.initial
            && request.key == self.key
            && self.view.pagination().map(|p| p.next_start()) == Some(request.start);
        let Some(fragment) = fragment.filter(|_| continues) else {
            debug!(
                "Dropping stale slice of {} at offset {}",
                request.key, request.start.offset
            );
            return Merge::Stale;
        };
        if !self.view.absorb(fragment, request.limit) {
            return Merge::Stale;
        }
        self.more_in_flight = false;
        Merge::Applied
    }

    /// Forget an outstanding follow-up fetch after it failed.
    pub fn abandon_more(&mut self) {
        self.more_in_flight = false;
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Fetch the slice described by `request`. Initial requests also fetch the TTL
/// concurrently; a TTL failure does not fail the load.
pub async fn load(
    source: &dyn DataSource,
    request: &SliceRequest,
) -> Result<LoadedSlice, StoreError> {
    if request.kind == KeyType::Unknown {
        // Nothing to page; confirm the key still exists and is still opaque.
        let kind = source.get_type(&request.key).await?;
        if kind != KeyType::Unknown {
            return Err(StoreError::TypeMismatch {
                key: request.key.clone(),
                expected: request.kind,
            });
        }
        let ttl = source.ttl(&request.key).await.unwrap_or(None);
        return Ok(LoadedSlice {
            fragment: None,
            ttl,
        });
    }

    let slice = source.load_slice(&request.key, request.kind, request.start, request.limit);
    let (fragment, ttl) = if request.initial {
        let (fragment, ttl) = join!(slice, source.ttl(&request.key));
        let ttl = ttl.unwrap_or_else(|e| {
            debug!("TTL lookup for {} failed: {}", request.key, e);
            None
        });
        (fragment?, ttl)
    } else {
        (slice.await?, None)
    };

    if fragment.kind() != request.kind {
        return Err(StoreError::TypeMismatch {
            key: request.key.clone(),
            expected: request.kind,
        });
    }

    Ok(LoadedSlice {
        fragment: Some(fragment),
        ttl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySource;

    fn hash_entry(name: &str) -> KeyEntry {
        KeyEntry::new(name, KeyType::Hash)
    }

    async fn open(source: &MemorySource, entry: &KeyEntry, limit: usize) -> KeyDetail {
        let request = SliceRequest::initial(1, entry, limit);
        let loaded = load(source, &request).await.unwrap();
        KeyDetail::new(&request, loaded)
    }

    fn follow_up(detail: &KeyDetail, start: SliceStart, limit: usize) -> SliceRequest {
        SliceRequest {
            ticket: 1,
            key: detail.key.clone(),
            kind: detail.kind,
            start,
            limit,
            initial: false,
        }
    }

    fn hash_fields(view: &ValueView) -> Vec<&str> {
        match view {
            ValueView::Hash(p) => p.items().iter().map(|(f, _)| f.as_str()).collect(),
            other => panic!("expected hash view, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hash_pages_by_cursor() {
        let source =
            MemorySource::new().with_hash("h", &[("f1", "1"), ("f2", "2"), ("f3", "3")]);
        let mut detail = open(&source, &hash_entry("h"), 2).await;

        let pager = detail.view.pagination().unwrap();
        assert_eq!(hash_fields(&detail.view), vec!["f1", "f2"]);
        assert_eq!(pager.offset(), 0);
        assert_eq!(pager.total(), Some(3));

        let MoreSlice::Fetch(start) = detail.request_more(2, 2) else {
            panic!("expected a remote fetch");
        };
        let request = follow_up(&detail, start, 2);
        let loaded = load(&source, &request).await.unwrap();
        assert_eq!(detail.extend(&request, loaded.fragment), Merge::Applied);

        let pager = detail.view.pagination().unwrap();
        assert_eq!(hash_fields(&detail.view), vec!["f1", "f2", "f3"]);
        assert_eq!(pager.offset(), 2);
        assert!(!pager.has_more());
    }

    #[tokio::test]
    async fn test_request_more_rejects_mismatched_offset() {
        let source = MemorySource::new().with_list("l", &["a", "b", "c"]);
        let mut detail = open(&source, &KeyEntry::new("l", KeyType::List), 2).await;
        assert_eq!(detail.request_more(0, 2), MoreSlice::Rejected);
        assert_eq!(detail.request_more(3, 2), MoreSlice::Rejected);
        assert!(!detail.is_loading_more());
    }

    #[tokio::test]
    async fn test_request_more_is_single_flight() {
        let source = MemorySource::new().with_list("l", &["a", "b", "c"]);
        let mut detail = open(&source, &KeyEntry::new("l", KeyType::List), 2).await;
        assert!(matches!(detail.request_more(2, 2), MoreSlice::Fetch(_)));
        assert_eq!(detail.request_more(2, 2), MoreSlice::Idle);
    }

    #[tokio::test]
    async fn test_extend_drops_result_for_old_offset() {
        let source = MemorySource::new().with_list("l", &["a", "b", "c", "d", "e"]);
        let mut detail = open(&source, &KeyEntry::new("l", KeyType::List), 2).await;
        let MoreSlice::Fetch(start) = detail.request_more(2, 2) else {
            panic!("expected fetch");
        };
        let request = follow_up(&detail, start, 2);
        let loaded = load(&source, &request).await.unwrap();
        assert_eq!(detail.extend(&request, loaded.fragment.clone()), Merge::Applied);
        // Delivering the same page twice must not duplicate items.
        assert_eq!(detail.extend(&request, loaded.fragment), Merge::Stale);
        assert_eq!(detail.view.loaded(), 4);
    }

    #[test]
    fn test_backlog_serves_next_page_locally() {
        let chunk = Chunk::scanned(
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
            Some(4),
            0,
        );
        let request = SliceRequest {
            ticket: 0,
            key: "s".into(),
            kind: KeyType::Set,
            start: SliceStart::default(),
            limit: 2,
            initial: true,
        };
        let loaded = LoadedSlice {
            fragment: Some(Fragment::Set(chunk)),
            ttl: None,
        };
        let mut detail = KeyDetail::new(&request, loaded);
        assert_eq!(detail.view.loaded(), 2);
        assert!(detail.view.has_more());

        assert_eq!(detail.request_more(2, 2), MoreSlice::ServedLocally);
        let pager = detail.view.pagination().unwrap();
        assert_eq!(pager.loaded(), 4);
        assert_eq!(pager.offset(), 2);
        assert!(!pager.has_more());
    }

    #[test]
    fn test_fragment_never_exceeds_page_size() {
        let chunk = Chunk::scanned((0..7).map(|i| i.to_string()).collect(), Some(7), 0);
        let mut paged = Paged::first(chunk, 3);
        assert_eq!(paged.loaded(), 3);
        paged.serve_local(3);
        assert_eq!(paged.loaded() - paged.offset(), 3);
        paged.serve_local(3);
        assert_eq!(paged.loaded() - paged.offset(), 1);
        assert!(paged.offset() + (paged.loaded() - paged.offset()) <= paged.total().unwrap());
    }

    #[test]
    fn test_unknown_total_pages_until_empty() {
        let mut paged: Paged<String> = Paged::first(Chunk::indexed(vec!["a".into()], None), 1);
        assert!(paged.has_more());
        paged.absorb(Chunk::indexed(vec!["b".into()], None), 1);
        assert!(paged.has_more());
        paged.absorb(Chunk::indexed(Vec::new(), None), 1);
        assert!(!paged.has_more());
        assert_eq!(paged.loaded(), 2);
    }

    #[test]
    fn test_empty_scan_with_live_cursor_keeps_paging() {
        let mut paged: Paged<String> =
            Paged::first(Chunk::scanned(vec!["a".into()], Some(3), 5), 1);
        paged.absorb(Chunk::scanned(Vec::new(), Some(3), 9), 1);
        assert_eq!(paged.loaded(), 1);
        assert!(paged.has_more());
        assert_eq!(paged.next_start().cursor, 9);

        paged.absorb(Chunk::scanned(vec!["b".into(), "c".into()], Some(3), 0), 2);
        assert_eq!(paged.loaded(), 3);
        assert!(!paged.has_more());
    }

    #[test]
    fn test_empty_first_scan_still_requests_more() {
        let request = SliceRequest::initial(1, &hash_entry("h"), 2);
        let loaded = LoadedSlice {
            fragment: Some(Fragment::Hash(Chunk::scanned(Vec::new(), Some(3), 42))),
            ttl: None,
        };
        let mut detail = KeyDetail::new(&request, loaded);
        assert_eq!(detail.view.loaded(), 0);
        assert_eq!(
            detail.request_more(0, 2),
            MoreSlice::Fetch(SliceStart {
                offset: 0,
                cursor: 42
            })
        );
    }

    #[test]
    fn test_total_never_below_loaded() {
        let mut paged: Paged<String> =
            Paged::first(Chunk::indexed(vec!["a".into(), "b".into()], Some(5)), 2);
        paged.absorb(Chunk::indexed(vec!["c".into()], Some(1)), 2);
        assert_eq!(paged.total(), Some(3));
        assert!(!paged.has_more());
    }

    #[test]
    fn test_json_strings_are_pretty_printed() {
        let value = StringValue::from_bytes(br#"{"a":1,"b":[1,2]}"#.to_vec());
        assert!(value.is_json);
        assert!(value.lines() > 1);
        assert_eq!(value.size, 17);

        let plain = StringValue::from_bytes(b"42".to_vec());
        assert!(!plain.is_json);
        assert_eq!(plain.text, "42");
    }

    #[tokio::test]
    async fn test_initial_load_includes_ttl() {
        let source = MemorySource::new()
            .with_strings(&["session"])
            .with_ttl("session", 30);
        let detail = open(&source, &KeyEntry::new("session", KeyType::String), 10).await;
        assert_eq!(detail.ttl, Some(Ttl::Seconds(30)));
        assert!(matches!(detail.view, ValueView::String(_)));
    }

    #[tokio::test]
    async fn test_load_reports_type_mismatch() {
        let source = MemorySource::new().with_list("k", &["a"]);
        let request = SliceRequest::initial(0, &hash_entry("k"), 10);
        let err = load(&source, &request).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::TypeMismatch {
                key: "k".into(),
                expected: KeyType::Hash
            }
        );
    }

    #[tokio::test]
    async fn test_load_reports_missing_key() {
        let source = MemorySource::new();
        let request = SliceRequest::initial(0, &hash_entry("gone"), 10);
        let err = load(&source, &request).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("gone".into()));
    }

    #[tokio::test]
    async fn test_unknown_type_loads_as_unsupported() {
        let source = MemorySource::new().with_opaque("events");
        let entry = KeyEntry::new("events", KeyType::Unknown);
        let detail = open(&source, &entry, 10).await;
        assert_eq!(detail.view, ValueView::Unsupported);
        assert!(!detail.view.has_more());
    }
}

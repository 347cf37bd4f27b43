//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::state::NavigationState;
use crate::core::task::perform;
use crate::store::{
    Chunk, DataSource, Fragment, KeyEntry, KeyType, ScanBatch, SliceStart, StoreError, Ttl,
};

#[derive(Debug, Clone)]
enum Stored {
    String(Vec<u8>),
    List(Vec<String>),
    Hash(Vec<(String, String)>),
    Set(Vec<String>),
    ZSet(Vec<(String, f64)>),
    Opaque,
}

impl Stored {
    fn kind(&self) -> KeyType {
        match self {
            Stored::String(_) => KeyType::String,
            Stored::List(_) => KeyType::List,
            Stored::Hash(_) => KeyType::Hash,
            Stored::Set(_) => KeyType::Set,
            Stored::ZSet(_) => KeyType::ZSet,
            Stored::Opaque => KeyType::Unknown,
        }
    }
}

/// An in-memory keyspace that behaves like a small Redis database.
///
/// Keys are enumerated in insertion order; the scan cursor is the index of
/// the next key to examine. Hash and set scans work the same way over fields.
pub struct MemorySource {
    entries: Mutex<Vec<(String, Stored)>>,
    ttls: Mutex<HashMap<String, u64>>,
    scan_step: Option<usize>,
    sparse_scans: AtomicUsize,
    failing: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            ttls: Mutex::new(HashMap::new()),
            scan_step: None,
            sparse_scans: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    fn with(self, name: &str, value: Stored) -> Self {
        self.entries
            .lock()
            .unwrap()
            .push((name.to_string(), value));
        self
    }

    /// String keys whose value is their own name.
    pub fn with_strings(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.with(name, Stored::String(name.as_bytes().to_vec()));
        }
        self
    }

    pub fn with_string(self, name: &str, value: &str) -> Self {
        self.with(name, Stored::String(value.as_bytes().to_vec()))
    }

    pub fn with_list(self, name: &str, items: &[&str]) -> Self {
        self.with(name, Stored::List(owned(items)))
    }

    pub fn with_hash(self, name: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect();
        self.with(name, Stored::Hash(fields))
    }

    pub fn with_set(self, name: &str, members: &[&str]) -> Self {
        self.with(name, Stored::Set(owned(members)))
    }

    pub fn with_zset(self, name: &str, members: &[(&str, f64)]) -> Self {
        let members = members.iter().map(|(m, s)| (m.to_string(), *s)).collect();
        self.with(name, Stored::ZSet(members))
    }

    /// A key of a type the browser cannot page (e.g. a stream).
    pub fn with_opaque(self, name: &str) -> Self {
        self.with(name, Stored::Opaque)
    }

    pub fn with_ttl(self, name: &str, seconds: u64) -> Self {
        self.ttls.lock().unwrap().insert(name.to_string(), seconds);
        self
    }

    /// Examine only `step` keys per enumeration call, regardless of the limit.
    pub fn with_scan_step(mut self, step: usize) -> Self {
        self.scan_step = Some(step);
        self
    }

    /// The next `count` hash/set scans return no elements but a live cursor,
    /// like HSCAN over a sparse hashtable.
    pub fn with_sparse_scans(self, count: usize) -> Self {
        self.sparse_scans.store(count, Ordering::SeqCst);
        self
    }

    /// Every call fails with a connection error.
    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn remove(&self, name: &str) {
        self.entries.lock().unwrap().retain(|(n, _)| n != name);
    }

    /// Replace a key's value with a list, keeping its position.
    pub fn replace_with_list(&self, name: &str, items: &[&str]) {
        let mut entries = self.entries.lock().unwrap();
        if let Some((_, value)) = entries.iter_mut().find(|(n, _)| n == name) {
            *value = Stored::List(owned(items));
        }
    }

    fn scan<T: Clone>(&self, items: &[T], cursor: u64, limit: usize) -> Chunk<T> {
        let sparse = self
            .sparse_scans
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if sparse {
            return Chunk::scanned(Vec::new(), Some(items.len()), cursor | SPARSE_BIT);
        }
        scan_window(items, cursor, limit)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("connection refused".into()));
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Stored, StoreError> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn window<T: Clone>(items: &[T], start: usize, limit: usize) -> Vec<T> {
    let start = start.min(items.len());
    let end = (start + limit).min(items.len());
    items[start..end].to_vec()
}

/// Marks a cursor handed out by an empty scan, so that index 0 stays resumable.
const SPARSE_BIT: u64 = 1 << 63;

fn scan_window<T: Clone>(items: &[T], cursor: u64, limit: usize) -> Chunk<T> {
    let start = (cursor & !SPARSE_BIT) as usize;
    let page = window(items, start, limit.max(1));
    let end = start + page.len();
    let next = if end >= items.len() { 0 } else { end as u64 };
    Chunk::scanned(page, Some(items.len()), next)
}

/// Redis-style glob with `*` and `?`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    fn go(p: &[char], n: &[char]) -> bool {
        match p.first() {
            None => n.is_empty(),
            Some('*') => (0..=n.len()).any(|i| go(&p[1..], &n[i..])),
            Some('?') => !n.is_empty() && go(&p[1..], &n[1..]),
            Some(c) => n.first() == Some(c) && go(&p[1..], &n[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    go(&p, &n)
}

#[async_trait]
impl DataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_keys(
        &self,
        pattern: &str,
        cursor: u64,
        limit: usize,
    ) -> Result<ScanBatch, StoreError> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        let step = self.scan_step.unwrap_or(limit).max(1);
        let start = (cursor as usize).min(entries.len());
        let end = (start + step).min(entries.len());
        let keys = entries[start..end]
            .iter()
            .filter(|(name, _)| pattern.is_empty() || glob_match(pattern, name))
            .map(|(name, value)| KeyEntry::new(name.clone(), value.kind()))
            .collect();
        let next_cursor = if end >= entries.len() { 0 } else { end as u64 };
        Ok(ScanBatch { keys, next_cursor })
    }

    async fn get_type(&self, key: &str) -> Result<KeyType, StoreError> {
        self.check()?;
        Ok(self.lookup(key)?.kind())
    }

    async fn load_slice(
        &self,
        key: &str,
        kind: KeyType,
        start: SliceStart,
        limit: usize,
    ) -> Result<Fragment, StoreError> {
        self.check()?;
        let stored = self.lookup(key)?;
        if stored.kind() != kind {
            return Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: kind,
            });
        }
        match stored {
            Stored::String(bytes) => Ok(Fragment::String(bytes)),
            Stored::List(items) => Ok(Fragment::List(Chunk::indexed(
                window(&items, start.offset, limit),
                Some(items.len()),
            ))),
            Stored::ZSet(items) => Ok(Fragment::ZSet(Chunk::indexed(
                window(&items, start.offset, limit),
                Some(items.len()),
            ))),
            Stored::Hash(fields) => Ok(Fragment::Hash(self.scan(&fields, start.cursor, limit))),
            Stored::Set(members) => Ok(Fragment::Set(self.scan(&members, start.cursor, limit))),
            Stored::Opaque => Err(StoreError::Connection(format!(
                "cannot page through {key}"
            ))),
        }
    }

    async fn key_count(&self) -> Result<Option<u64>, StoreError> {
        self.check()?;
        Ok(Some(self.entries.lock().unwrap().len() as u64))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Ttl>, StoreError> {
        self.check()?;
        self.lookup(key)?;
        Ok(Some(match self.ttls.lock().unwrap().get(key) {
            Some(seconds) => Ttl::Seconds(*seconds),
            None => Ttl::Persistent,
        }))
    }
}

/// Navigation state with small page sizes, convenient for paging tests.
pub fn test_state(key_page_size: usize, value_page_size: usize) -> NavigationState {
    let config = ResolvedConfig {
        key_page_size,
        value_page_size,
        ..ResolvedConfig::default()
    };
    NavigationState::new("memory".to_string(), &config)
}

/// Apply `action` and run every fetch it triggers to completion, feeding the
/// results back through `update()`.
pub async fn dispatch(state: &mut NavigationState, source: &MemorySource, action: Action) {
    let mut pending = vec![update(state, action)];
    while let Some(effect) = pending.pop() {
        match effect {
            Effect::Fetch(request) => {
                let action = perform(source, request).await;
                pending.push(update(state, action));
            }
            Effect::Batch(effects) => pending.extend(effects),
            Effect::None | Effect::Quit => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("user:*", "user:42"));
        assert!(!glob_match("user:*", "order:1"));
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "hllo"));
        assert!(glob_match("*:1", "order:1"));
    }
}

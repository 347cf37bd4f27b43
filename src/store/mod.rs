//! # Data Source Adapter
//!
//! Everything the browser knows about the remote keyspace goes through the
//! [`DataSource`] trait. The rest of the crate never sees a Redis connection,
//! a reply type or a transport error; it sees [`KeyEntry`], [`Fragment`] and
//! [`StoreError`].
//!
//! Adapters are read-only and never retry. A failure is returned as-is and the
//! navigation state machine decides what to do with it.

pub mod redis;

use std::fmt;

use async_trait::async_trait;

pub use self::redis::{ConnectError, RedisSource};

/// Native type of a key, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Hash,
    Set,
    ZSet,
    /// Anything the browser cannot page through (streams, module types).
    Unknown,
}

impl KeyType {
    /// Parse a `TYPE` reply. Returns `None` for `"none"` (the key is gone).
    pub fn from_type_reply(reply: &str) -> Option<Self> {
        match reply.trim().to_ascii_lowercase().as_str() {
            "none" => None,
            "string" => Some(KeyType::String),
            "list" => Some(KeyType::List),
            "hash" => Some(KeyType::Hash),
            "set" => Some(KeyType::Set),
            "zset" => Some(KeyType::ZSet),
            _ => Some(KeyType::Unknown),
        }
    }

    /// Short badge shown next to key names.
    pub fn label(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Hash => "hash",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Unknown => "other",
        }
    }

    /// Whether slices of this type are addressed by scan cursor rather than index.
    pub fn is_cursor_addressed(&self) -> bool {
        matches!(self, KeyType::Hash | KeyType::Set)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A key as returned by enumeration. Identity is the name.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEntry {
    pub name: String,
    pub kind: KeyType,
}

impl KeyEntry {
    pub fn new(name: impl Into<String>, kind: KeyType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One `SCAN` step: the keys it produced and the cursor to resume from.
/// A `next_cursor` of `0` means the enumeration is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBatch {
    pub keys: Vec<KeyEntry>,
    pub next_cursor: u64,
}

/// Where a value slice starts.
///
/// Index-addressed kinds (list, zset) use `offset`; cursor-addressed kinds
/// (hash, set) resume from `cursor`. Both are always carried so a result can be
/// matched against the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceStart {
    pub offset: usize,
    pub cursor: u64,
}

/// A bounded run of collection items plus what is known about the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub items: Vec<T>,
    /// Cardinality of the whole collection, when the source can count it.
    pub total: Option<usize>,
    /// Scan cursor to resume from (cursor-addressed kinds only). `Some(0)` = done.
    pub next_cursor: Option<u64>,
}

impl<T> Chunk<T> {
    pub fn indexed(items: Vec<T>, total: Option<usize>) -> Self {
        Self {
            items,
            total,
            next_cursor: None,
        }
    }

    pub fn scanned(items: Vec<T>, total: Option<usize>, next_cursor: u64) -> Self {
        Self {
            items,
            total,
            next_cursor: Some(next_cursor),
        }
    }
}

/// A typed piece of a value, as produced by [`DataSource::load_slice`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    String(Vec<u8>),
    List(Chunk<String>),
    Hash(Chunk<(String, String)>),
    Set(Chunk<String>),
    ZSet(Chunk<(String, f64)>),
}

impl Fragment {
    pub fn kind(&self) -> KeyType {
        match self {
            Fragment::String(_) => KeyType::String,
            Fragment::List(_) => KeyType::List,
            Fragment::Hash(_) => KeyType::Hash,
            Fragment::Set(_) => KeyType::Set,
            Fragment::ZSet(_) => KeyType::ZSet,
        }
    }
}

/// Expiry of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Persistent,
    Seconds(u64),
}

/// Failures surfaced by a data source.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Transport failure, timeout or unexpected server reply. Retryable.
    Connection(String),
    /// The key vanished between listing and loading.
    NotFound(String),
    /// The key exists but no longer has the type it was listed with.
    TypeMismatch { key: String, expected: KeyType },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "connection error: {msg}"),
            StoreError::NotFound(key) => write!(f, "key no longer exists: {key}"),
            StoreError::TypeMismatch { key, expected } => {
                write!(f, "key {key} is no longer a {expected}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Read-only access to a keyspace.
///
/// Implementations must be safe to share between concurrently running fetch
/// tasks.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Human readable label for the title bar (address, database).
    fn name(&self) -> &str;

    /// One enumeration step starting at `cursor`. `limit` is a hint.
    async fn list_keys(
        &self,
        pattern: &str,
        cursor: u64,
        limit: usize,
    ) -> Result<ScanBatch, StoreError>;

    /// Current type of `key`. Fails with `NotFound` if it does not exist.
    async fn get_type(&self, key: &str) -> Result<KeyType, StoreError>;

    /// Fetch at most `limit` items of `key` starting at `start`, assuming
    /// it has type `kind`.
    async fn load_slice(
        &self,
        key: &str,
        kind: KeyType,
        start: SliceStart,
        limit: usize,
    ) -> Result<Fragment, StoreError>;

    /// Number of keys in the selected database, if the source can tell.
    async fn key_count(&self) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    /// Expiry of `key`, if the source can tell.
    async fn ttl(&self, _key: &str) -> Result<Option<Ttl>, StoreError> {
        Ok(None)
    }
}

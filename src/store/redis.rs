//! Redis implementation of [`DataSource`].
//!
//! Uses a single multiplexed async connection. The connection is cloned per
//! call, which is cheap and lets list-page and detail-page fetches run
//! concurrently over the same socket.
//!
//! Command mapping:
//!
//! | operation   | commands                                    |
//! |-------------|---------------------------------------------|
//! | list_keys   | `SCAN` + pipelined `TYPE` per returned key  |
//! | get_type    | `TYPE`                                      |
//! | string      | `GET`                                       |
//! | list        | `LRANGE` + `LLEN`                           |
//! | zset        | `ZRANGE .. WITHSCORES` + `ZCARD`            |
//! | hash        | `HSCAN` + `HLEN`                            |
//! | set         | `SSCAN` + `SCARD`                           |
//! | key_count   | `DBSIZE`                                    |
//! | ttl         | `TTL`                                       |

use std::fmt;

use async_trait::async_trait;
use log::{debug, info, warn};
use redis::aio::MultiplexedConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};

use super::{
    Chunk, DataSource, Fragment, KeyEntry, KeyType, ScanBatch, SliceStart, StoreError, Ttl,
};
use crate::core::config::{Mode, ResolvedConfig};

const DEFAULT_PORT: u16 = 6379;

// ============================================================================
// Connection
// ============================================================================

/// Startup failures. These are fatal: the binary exits with status 1.
#[derive(Debug)]
pub enum ConnectError {
    /// An address in the configuration could not be parsed.
    InvalidAddress(String),
    /// The server rejected or demanded credentials.
    Auth(String),
    /// Anything else reported by the client library.
    Redis(RedisError),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::InvalidAddress(addr) => write!(f, "invalid address: {addr}"),
            ConnectError::Auth(msg) => write!(f, "authentication failed: {msg}"),
            ConnectError::Redis(e) => write!(f, "connect to redis failed: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<RedisError> for ConnectError {
    fn from(e: RedisError) -> Self {
        let msg = e.to_string();
        if msg.contains("NOAUTH") || msg.contains("WRONGPASS") || msg.contains("invalid password")
        {
            ConnectError::Auth(msg)
        } else {
            ConnectError::Redis(e)
        }
    }
}

/// Split `host:port` (or `[v6]:port`, or a bare host) into its parts.
fn split_addr(addr: &str) -> Result<(String, u16), ConnectError> {
    let addr = addr.trim();
    let addr = addr.strip_prefix("redis://").unwrap_or(addr);
    if addr.is_empty() {
        return Err(ConnectError::InvalidAddress(addr.to_string()));
    }

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ConnectError::InvalidAddress(addr.to_string()))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p
                .parse()
                .map_err(|_| ConnectError::InvalidAddress(addr.to_string()))?,
            None => DEFAULT_PORT,
        };
        return Ok((host.to_string(), port));
    }

    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ConnectError::InvalidAddress(addr.to_string()))?;
            Ok((host.to_string(), port))
        }
        None => Ok((addr.to_string(), DEFAULT_PORT)),
    }
}

fn tcp_info(addr: &str, redis: RedisConnectionInfo) -> Result<ConnectionInfo, ConnectError> {
    let (host, port) = split_addr(addr)?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis,
    })
}

fn node_info(config: &ResolvedConfig) -> RedisConnectionInfo {
    RedisConnectionInfo {
        db: config.db,
        password: config.password.clone(),
        ..Default::default()
    }
}

/// Redis-backed data source.
pub struct RedisSource {
    conn: MultiplexedConnection,
    label: String,
    scan_count: usize,
}

impl RedisSource {
    /// Connect according to `config` and verify the connection with `PING`.
    pub async fn connect(config: &ResolvedConfig) -> Result<Self, ConnectError> {
        let (mut conn, label) = match config.mode {
            Mode::Standalone => {
                info!("Connecting to redis at {} (db {})", config.addr, config.db);
                let client = redis::Client::open(tcp_info(&config.addr, node_info(config))?)?;
                let conn = client.get_multiplexed_async_connection().await?;
                (conn, format!("{}/{}", config.addr, config.db))
            }
            Mode::Sentinel => {
                info!(
                    "Connecting to master '{}' via sentinels {:?}",
                    config.master_name, config.sentinel_addrs
                );
                let sentinels = config
                    .sentinel_addrs
                    .iter()
                    .map(|addr| tcp_info(addr, RedisConnectionInfo::default()))
                    .collect::<Result<Vec<_>, _>>()?;
                if sentinels.is_empty() {
                    return Err(ConnectError::InvalidAddress(
                        "sentinel mode needs at least one sentinel address".to_string(),
                    ));
                }
                let mut client = SentinelClient::build(
                    sentinels,
                    config.master_name.clone(),
                    Some(SentinelNodeConnectionInfo {
                        tls_mode: None,
                        redis_connection_info: Some(node_info(config)),
                    }),
                    SentinelServerType::Master,
                )?;
                let conn = client.get_async_connection().await?;
                (conn, format!("{}/{}", config.master_name, config.db))
            }
        };

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            warn!("Unexpected PING response: {}", pong);
        }
        info!("Connected to {}", label);

        Ok(Self {
            conn,
            label,
            scan_count: config.scan_count,
        })
    }
}

// ============================================================================
// Reply helpers
// ============================================================================

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Key names that are not UTF-8 cannot be addressed again through a `String`
/// and are skipped, so the scan cursor keeps moving past them.
fn decode_names(raw: Vec<Vec<u8>>) -> Vec<String> {
    raw.into_iter()
        .filter_map(|bytes| match String::from_utf8(bytes) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(
                    "Skipping key with non-UTF-8 name {:?}",
                    String::from_utf8_lossy(e.as_bytes())
                );
                None
            }
        })
        .collect()
}

/// `[f1, v1, f2, v2, ...]` → `[(f1, v1), (f2, v2), ...]`. A dangling odd
/// element is dropped.
fn pairs(flat: Vec<Vec<u8>>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        out.push((lossy(field), lossy(value)));
    }
    out
}

/// `[m1, s1, m2, s2, ...]` → `[(m1, s1), ...]`. Unparseable scores become NaN.
fn scored(flat: Vec<Vec<u8>>) -> Vec<(String, f64)> {
    pairs(flat)
        .into_iter()
        .map(|(member, score)| {
            let score = score.parse::<f64>().unwrap_or(f64::NAN);
            (member, score)
        })
        .collect()
}

/// Redis deletes empty collections, so a zero cardinality means the key is gone.
fn require_present(key: &str, total: usize) -> Result<usize, StoreError> {
    if total == 0 {
        Err(StoreError::NotFound(key.to_string()))
    } else {
        Ok(total)
    }
}

fn is_wrong_type(e: &RedisError) -> bool {
    e.code() == Some("WRONGTYPE") || e.to_string().contains("WRONGTYPE")
}

fn transport(e: RedisError) -> StoreError {
    StoreError::Connection(e.to_string())
}

fn classify(e: RedisError, key: &str, expected: KeyType) -> StoreError {
    if is_wrong_type(&e) {
        StoreError::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    } else {
        transport(e)
    }
}

// ============================================================================
// DataSource
// ============================================================================

#[async_trait]
impl DataSource for RedisSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_keys(
        &self,
        pattern: &str,
        cursor: u64,
        limit: usize,
    ) -> Result<ScanBatch, StoreError> {
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor);
        if !pattern.is_empty() {
            cmd.arg("MATCH").arg(pattern);
        }
        cmd.arg("COUNT").arg(self.scan_count.max(limit));

        let (next_cursor, raw): (u64, Vec<Vec<u8>>) =
            cmd.query_async(&mut conn).await.map_err(transport)?;
        let names = decode_names(raw);
        debug!(
            "SCAN {} MATCH {:?} -> {} keys, next cursor {}",
            cursor,
            pattern,
            names.len(),
            next_cursor
        );

        if names.is_empty() {
            return Ok(ScanBatch {
                keys: Vec::new(),
                next_cursor,
            });
        }

        let mut pipe = redis::pipe();
        for name in &names {
            pipe.cmd("TYPE").arg(name);
        }
        let types: Vec<String> = pipe.query_async(&mut conn).await.map_err(transport)?;

        // Keys deleted between SCAN and TYPE report "none" and are skipped.
        let keys = names
            .into_iter()
            .zip(types)
            .filter_map(|(name, reply)| {
                KeyType::from_type_reply(&reply).map(|kind| KeyEntry::new(name, kind))
            })
            .collect();

        Ok(ScanBatch { keys, next_cursor })
    }

    async fn get_type(&self, key: &str) -> Result<KeyType, StoreError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("TYPE")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        KeyType::from_type_reply(&reply).ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn load_slice(
        &self,
        key: &str,
        kind: KeyType,
        start: SliceStart,
        limit: usize,
    ) -> Result<Fragment, StoreError> {
        let mut conn = self.conn.clone();
        let limit = limit.max(1);
        let stop = start.offset + limit - 1;

        match kind {
            KeyType::String => {
                let value: Option<Vec<u8>> = redis::cmd("GET")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| classify(e, key, kind))?;
                value
                    .map(Fragment::String)
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))
            }
            KeyType::List => {
                let (items, total): (Vec<Vec<u8>>, usize) = redis::pipe()
                    .cmd("LRANGE")
                    .arg(key)
                    .arg(start.offset)
                    .arg(stop)
                    .cmd("LLEN")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| classify(e, key, kind))?;
                let total = require_present(key, total)?;
                let items = items.into_iter().map(lossy).collect();
                Ok(Fragment::List(Chunk::indexed(items, Some(total))))
            }
            KeyType::ZSet => {
                let (flat, total): (Vec<Vec<u8>>, usize) = redis::pipe()
                    .cmd("ZRANGE")
                    .arg(key)
                    .arg(start.offset)
                    .arg(stop)
                    .arg("WITHSCORES")
                    .cmd("ZCARD")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| classify(e, key, kind))?;
                let total = require_present(key, total)?;
                Ok(Fragment::ZSet(Chunk::indexed(scored(flat), Some(total))))
            }
            KeyType::Hash => {
                let ((next_cursor, flat), total): ((u64, Vec<Vec<u8>>), usize) = redis::pipe()
                    .cmd("HSCAN")
                    .arg(key)
                    .arg(start.cursor)
                    .arg("COUNT")
                    .arg(limit)
                    .cmd("HLEN")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| classify(e, key, kind))?;
                let total = require_present(key, total)?;
                Ok(Fragment::Hash(Chunk::scanned(
                    pairs(flat),
                    Some(total),
                    next_cursor,
                )))
            }
            KeyType::Set => {
                let ((next_cursor, members), total): ((u64, Vec<Vec<u8>>), usize) = redis::pipe()
                    .cmd("SSCAN")
                    .arg(key)
                    .arg(start.cursor)
                    .arg("COUNT")
                    .arg(limit)
                    .cmd("SCARD")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| classify(e, key, kind))?;
                let total = require_present(key, total)?;
                let members = members.into_iter().map(lossy).collect();
                Ok(Fragment::Set(Chunk::scanned(members, Some(total), next_cursor)))
            }
            KeyType::Unknown => Err(StoreError::Connection(format!(
                "values of key {key} cannot be paged"
            ))),
        }
    }

    async fn key_count(&self) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        Ok(Some(count))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Ttl>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        match ttl {
            -2 => Err(StoreError::NotFound(key.to_string())),
            t if t < 0 => Ok(Some(Ttl::Persistent)),
            t => Ok(Some(Ttl::Seconds(t as u64))),
        }
    }
}

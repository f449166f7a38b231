//! Two-tier resilient persistence for the aggregation pipeline.
//!
//! Two independent key/value slots, both externally persisted:
//!
//! - `live` — the full resolved reading with a write timestamp, 10-minute
//!   freshness window. Exists purely to avoid redundant network calls;
//!   staleness forces a re-fetch but does not invalidate the value for
//!   failsafe purposes.
//! - `last_valid` — a bare integer with no TTL, overwritten on every
//!   successful resolution. Acts as the trend baseline and the deepest
//!   failsafe before the hard constant.
//!
//! Reads and writes of either slot tolerate absence and corruption by
//! treating them as cache misses. A malformed stored value is logged and
//! discarded, never raised.
//!
//! # Clock injection
//! Freshness checks take `now` as a parameter rather than calling
//! `Utc::now()` internally, keeping TTL behavior deterministic in tests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::logging;
use crate::model::LiveAqiData;

// ---------------------------------------------------------------------------
// Key/value store seam
// ---------------------------------------------------------------------------

/// Minimal persistent key/value interface the pipeline depends on.
///
/// Implemented by an in-memory map in tests and by a JSON-file store in
/// production, decoupling the pipeline from any specific storage technology.
/// Implementations must not panic on missing keys or I/O trouble; `get`
/// answers `None` and `set` drops the write (after logging) instead.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

/// One-JSON-file-per-key store rooted at a directory. Survives process
/// restarts, which is what makes `last_valid` a genuine failsafe layer.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates the root directory if needed. Failure to create it is
    /// reported but not fatal; the store then behaves as always-miss.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(e) = std::fs::create_dir_all(&root) {
            logging::log_store_failure("root", "create dir", &e.to_string());
        }
        FileStore { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

/// Shared-ownership stores work anywhere an owned store does; tests use
/// this to keep a handle on the store they hand to the pipeline.
impl<S: KvStore> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) {
        (**self).set(key, value)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                logging::log_store_failure(key, "read", &e.to_string());
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) {
        let path = self.path_for(key);
        let text = match serde_json::to_string(&value) {
            Ok(t) => t,
            Err(e) => {
                logging::log_store_failure(key, "serialize", &e.to_string());
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, text) {
            logging::log_store_failure(key, "write", &e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Cache slots
// ---------------------------------------------------------------------------

/// Store keys for the two slots. Public so operational tooling and tests
/// can inspect or seed the persisted state directly.
pub const LIVE_KEY: &str = "aqmon_live";
pub const LAST_VALID_KEY: &str = "aqmon_last_valid";

/// The persisted shape of the live slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveCacheEntry {
    pub data: LiveAqiData,
    pub written_at: DateTime<Utc>,
}

/// Two-tier cache over an injected key/value store.
pub struct ResilientCache<S: KvStore> {
    store: S,
    live_ttl: Duration,
}

impl<S: KvStore> ResilientCache<S> {
    pub fn new(store: S, live_ttl_minutes: i64) -> Self {
        ResilientCache {
            store,
            live_ttl: Duration::minutes(live_ttl_minutes),
        }
    }

    /// Returns the cached reading if it is within the freshness window and
    /// carries a positive index. Corrupt or stale entries answer `None`.
    ///
    /// Freshness is strictly less than the TTL: an entry written exactly
    /// `live_ttl` ago forces a re-fetch.
    pub fn read_live(&self, now: DateTime<Utc>) -> Option<LiveAqiData> {
        let entry = self.read_live_entry()?;
        if now - entry.written_at < self.live_ttl && entry.data.aqi > 0 {
            Some(entry.data)
        } else {
            None
        }
    }

    /// Returns the cached reading regardless of age. Used by the outermost
    /// failure path, where a stale reading beats no reading.
    pub fn read_live_any_age(&self) -> Option<LiveAqiData> {
        self.read_live_entry().map(|entry| entry.data)
    }

    fn read_live_entry(&self) -> Option<LiveCacheEntry> {
        let raw = self.store.get(LIVE_KEY)?;
        match serde_json::from_value(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                logging::log_store_failure(LIVE_KEY, "decode", &e.to_string());
                None
            }
        }
    }

    /// Replaces the live slot wholesale with a new reading.
    pub fn write_live(&self, data: &LiveAqiData, now: DateTime<Utc>) {
        let entry = LiveCacheEntry {
            data: data.clone(),
            written_at: now,
        };
        match serde_json::to_value(&entry) {
            Ok(value) => self.store.set(LIVE_KEY, value),
            Err(e) => logging::log_store_failure(LIVE_KEY, "encode", &e.to_string()),
        }
    }

    /// The durable last-known-good index, if one has ever been resolved.
    /// Non-positive or malformed stored values are discarded.
    pub fn last_valid(&self) -> Option<i32> {
        let raw = self.store.get(LAST_VALID_KEY)?;
        match raw.as_i64() {
            Some(aqi) if aqi > 0 && aqi <= i32::MAX as i64 => Some(aqi as i32),
            _ => {
                logging::log_store_failure(LAST_VALID_KEY, "decode", &format!("stored value {:?}", raw));
                None
            }
        }
    }

    /// Overwrites the durable slot. Called on every successful resolution,
    /// including the single-feed fallback.
    pub fn write_last_valid(&self, aqi: i32) {
        if aqi > 0 {
            self.store.set(LAST_VALID_KEY, Value::from(aqi));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

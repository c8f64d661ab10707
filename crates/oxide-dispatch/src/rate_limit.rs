//! Sliding-window rate limiting.
//!
//! Every check loads the request instants recorded for a key, drops those
//! older than the window, and admits the request if fewer than the allowed
//! number remain. Records live in a [`RateLimitStore`] so limits survive
//! restarts.
//!
//! Consistency: a [`RateLimiter`] serializes its read-modify-write cycle
//! with a mutex, so within one process the count is exact. Processes
//! sharing a [`FileStore`] directory do not coordinate; under contention
//! they can each read the same record and admit more requests than allowed.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RouterError};
use crate::pattern::{self, Matcher, PlaceholderRegistry};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock stopped at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The persisted request instants for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub key: String,
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Durable storage for rate-limit records.
pub trait RateLimitStore: Send + Sync {
    /// Loads the record for `key`; an unknown key yields an empty record.
    fn load(&self, key: &str) -> Result<RateLimitRecord>;

    /// Replaces the record for its key.
    fn save(&self, record: &RateLimitRecord) -> Result<()>;

    /// Drops records with no instant after `cutoff`. Returns how many were
    /// dropped. Stores that expire records on their own keep the default.
    fn purge(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}

/// Keeps records in memory; limits reset with the process.
///
/// Records are dropped once they hold no instant inside the window, so the
/// map is bounded by the clients seen within the longest window.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn load(&self, key: &str) -> Result<RateLimitRecord> {
        let records = self
            .records
            .lock()
            .map_err(|_| RouterError::Storage("memory store lock poisoned".to_string()))?;
        Ok(records.get(key).cloned().unwrap_or_else(|| RateLimitRecord {
            key: key.to_string(),
            timestamps: Vec::new(),
        }))
    }

    fn save(&self, record: &RateLimitRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RouterError::Storage("memory store lock poisoned".to_string()))?;
        if record.timestamps.is_empty() {
            records.remove(&record.key);
        } else {
            records.insert(record.key.clone(), record.clone());
        }
        Ok(())
    }

    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RouterError::Storage("memory store lock poisoned".to_string()))?;
        let before = records.len();
        records.retain(|_, record| record.timestamps.iter().any(|t| *t > cutoff));
        Ok(before - records.len())
    }
}

/// Keeps one JSON file per key in a directory.
///
/// File names are the FNV-1a hash of the key, so any key is a safe name.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store in `dir`, which is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file holding the record for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:016x}.json", fnv1a(key.as_bytes())))
    }

    /// Deletes every record. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl RateLimitStore for FileStore {
    fn load(&self, key: &str) -> Result<RateLimitRecord> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RateLimitRecord {
                    key: key.to_string(),
                    timestamps: Vec::new(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<RateLimitRecord>(&bytes) {
            Ok(record) if record.key == key => Ok(record),
            Ok(record) => {
                warn!(key, stored = %record.key, path = %path.display(), "rate limit record hash collision, starting fresh");
                Ok(RateLimitRecord {
                    key: key.to_string(),
                    timestamps: Vec::new(),
                })
            }
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "unreadable rate limit record, starting fresh");
                Ok(RateLimitRecord {
                    key: key.to_string(),
                    timestamps: Vec::new(),
                })
            }
        }
    }

    fn save(&self, record: &RateLimitRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&record.key);
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&tmp, serde_json::to_vec(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Longest accepted rate-limit window.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// How many attempts pass between sweeps of expired records.
const PURGE_INTERVAL: u64 = 256;

/// A rate limit attached to a route pattern.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub pattern: String,
    pub matcher: Matcher,
    pub max_attempts: usize,
    pub window: Duration,
}

impl RateLimitRule {
    /// Creates a rule allowing `max_attempts` per `per_minutes` minutes.
    ///
    /// The window must be positive and small enough to subtract from the
    /// current time.
    pub fn new(
        pattern: &str,
        max_attempts: usize,
        per_minutes: i64,
        registry: &PlaceholderRegistry,
    ) -> Result<Self> {
        let pattern = pattern::normalize(pattern);
        let window = Duration::try_minutes(per_minutes)
            .filter(|w| *w > Duration::zero() && *w <= Duration::days(MAX_WINDOW_DAYS))
            .ok_or_else(|| RouterError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!(
                    "rate limit window of {per_minutes} minutes must be between 1 minute and {MAX_WINDOW_DAYS} days"
                ),
            })?;
        Ok(Self {
            matcher: pattern::compile(&pattern, registry)?,
            pattern,
            max_attempts,
            window,
        })
    }

    /// Returns the limiter key for a client.
    pub fn key(&self, client: &str) -> String {
        format!("{client}|{}", self.pattern)
    }
}

/// Sliding-window limiter over a [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    retention: Option<Duration>,
    /// Serializes attempts; counts them between purges.
    attempts: Mutex<u64>,
}

impl RateLimiter {
    /// Creates a limiter.
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retention: None,
            attempts: Mutex::new(0),
        }
    }

    /// Periodically drops records older than `window` from the store.
    /// Pass the longest window of any rule using this limiter.
    #[must_use]
    pub fn retain_for(mut self, window: Duration) -> Self {
        self.retention = Some(window);
        self
    }

    /// Records an attempt for `key` if fewer than `max_attempts` happened
    /// within `window`. Returns whether the attempt is allowed.
    pub fn attempt(&self, key: &str, max_attempts: usize, window: Duration) -> Result<bool> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| RouterError::Storage("rate limiter lock poisoned".to_string()))?;

        let now = self.clock.now();
        *attempts += 1;
        if *attempts >= PURGE_INTERVAL {
            *attempts = 0;
            self.purge(now)?;
        }

        let cutoff = now
            .checked_sub_signed(window)
            .ok_or_else(|| RouterError::Storage(format!("rate limit window {window} out of range")))?;
        let mut record = self.store.load(key)?;
        record.timestamps.retain(|t| *t > cutoff);

        if record.timestamps.len() >= max_attempts {
            debug!(key, attempts = record.timestamps.len(), max_attempts, "rate limited");
            return Ok(false);
        }

        record.timestamps.push(now);
        self.store.save(&record)?;
        Ok(true)
    }

    fn purge(&self, now: DateTime<Utc>) -> Result<()> {
        let Some(cutoff) = self.retention.and_then(|r| now.checked_sub_signed(r)) else {
            return Ok(());
        };
        let dropped = self.store.purge(cutoff)?;
        if dropped > 0 {
            debug!(dropped, "purged expired rate limit records");
        }
        Ok(())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

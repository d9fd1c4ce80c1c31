//! Time-bounded analysis cache
//!
//! Keyed by subject name. Entries expire after a fixed TTL and are evicted
//! lazily on lookup. Time comes from an injected [`Clock`] so expiry is
//! deterministic under test.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    produced_at: DateTime<Utc>,
}

/// Process-wide cache of analysis texts
pub struct AnalysisCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl AnalysisCache {
    /// Create a cache with the given TTL
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Fresh entry for `name`, evicting it if it has expired
    pub fn get(&self, name: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = entries.get(name)?;
        if now - entry.produced_at < self.ttl {
            debug!("Cache hit for {name}");
            return Some(entry.text.clone());
        }

        debug!("Cache entry for {name} expired");
        entries.remove(name);
        None
    }

    /// Store `text` for `name`, replacing any previous entry
    pub fn put(&self, name: impl Into<String>, text: impl Into<String>) {
        let entry = CacheEntry {
            text: text.into(),
            produced_at: self.clock.now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), entry);
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Manually advanced clock for tests
#[cfg(test)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new() -> Arc<Self> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

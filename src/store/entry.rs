//! Entry structure for key-value pairs

use super::value::Value;
use std::time::{Duration, Instant};

/// Remaining lifetime of a key, as reported by `ttl`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// The key does not exist (or already expired)
    Absent,

    /// The key exists and has no expiration
    Persistent,

    /// The key expires after this much time
    Remaining(Duration),
}

/// Represents a single entry in the store
#[derive(Debug, Clone)]
pub struct Entry {
    /// The value
    pub value: Value,

    /// Optional expiration time (absolute)
    pub expire_at: Option<Instant>,

    /// Version number for optimistic concurrency control
    ///
    /// Taken from the owning store's counter on every write, so a key that
    /// was deleted and recreated never reuses an old version.
    pub version: u64,
}

impl Entry {
    /// Create a new entry without expiration
    pub fn new(value: Value, version: u64) -> Self {
        Entry {
            value,
            expire_at: None,
            version,
        }
    }

    /// Check if the entry has expired at `now`
    ///
    /// An entry whose deadline equals `now` counts as expired.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.expire_at, Some(expire_at) if expire_at <= now)
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Get remaining TTL
    pub fn ttl(&self) -> TtlStatus {
        match self.expire_at {
            Some(expire_at) => {
                let now = Instant::now();
                if expire_at > now {
                    TtlStatus::Remaining(expire_at - now)
                } else {
                    TtlStatus::Absent
                }
            }
            None => TtlStatus::Persistent,
        }
    }

    /// Calculate approximate memory usage of this entry in bytes, key excluded
    pub fn memory_usage(&self) -> usize {
        let metadata_size = std::mem::size_of::<Option<Instant>>() + std::mem::size_of::<u64>();
        self.value.memory_usage() + metadata_size
    }
}

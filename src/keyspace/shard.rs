//! Shard implementation
//!
//! A shard owns one partition of the keyspace behind a mutex. Operations
//! on keys in different shards never contend.

use crate::store::{run_expiration_cycle, MemoryStore};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One mutex-guarded partition of the keyspace
pub struct Shard {
    id: usize,
    store: Mutex<MemoryStore>,
}

impl Shard {
    pub fn new(id: usize, capacity: usize) -> Self {
        info!("Initializing shard {}", id);
        Shard {
            id,
            store: Mutex::new(MemoryStore::with_capacity(capacity)),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Lock the shard's store
    ///
    /// A panic while the lock was held leaves the store consistent at the
    /// granularity of single operations, so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(|poisoned| {
            warn!("Shard {} lock was poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    /// Run one active expiration cycle. Returns the number of keys reclaimed.
    pub fn sweep(&self, sample_size: usize, max_rounds: usize) -> usize {
        let removed = run_expiration_cycle(&mut self.lock(), sample_size, max_rounds);
        if removed > 0 {
            debug!("Shard {}: reclaimed {} expired keys", self.id, removed);
        }
        removed
    }

    pub fn stats(&self) -> ShardStats {
        let stats = self.lock().stats();
        ShardStats {
            shard_id: self.id,
            active_keys: stats.active_keys,
            total_keys: stats.total_keys,
            expired_keys: stats.expired_keys,
            keys_with_ttl: stats.keys_with_ttl,
            reclaimed_keys: stats.reclaimed_keys,
            memory_bytes: stats.used_memory_bytes,
        }
    }
}

/// Statistics for a single shard
#[derive(Debug, Clone, Serialize)]
pub struct ShardStats {
    pub shard_id: usize,
    pub active_keys: usize,
    pub total_keys: usize,
    pub expired_keys: usize,
    pub keys_with_ttl: usize,
    pub reclaimed_keys: u64,
    pub memory_bytes: usize,
}

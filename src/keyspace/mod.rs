//! Sharded keyspace
//!
//! The keyspace is split into shards, each a mutex-guarded
//! [`MemoryStore`]. A key always lives in the shard its hash routes to.
//! Operations spanning several shards lock them in ascending id order, so
//! two multi-shard operations can never deadlock.

mod router;
mod shard;

pub use router::ShardRouter;
pub use shard::{Shard, ShardStats};

use crate::error::{Result, StoreError};
use crate::store::MemoryStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::MutexGuard;
use tracing::info;

/// Owns every shard and routes keys to them
pub struct Keyspace {
    shards: Vec<Shard>,
    router: ShardRouter,
}

impl Keyspace {
    /// Create a keyspace with `num_shards` shards of `capacity` keys each
    pub fn new(num_shards: usize, capacity: usize) -> Self {
        let router = ShardRouter::new(num_shards);
        let shards = (0..router.num_shards())
            .map(|id| Shard::new(id, capacity))
            .collect();

        info!("Keyspace initialized with {} shards", router.num_shards());
        Keyspace { shards, router }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Shard owning `key`
    pub fn shard_for(&self, key: &[u8]) -> &Shard {
        &self.shards[self.router.route_key(key)]
    }

    /// Lock the shards owning `keys`, in ascending shard order
    pub fn lock_keys<'k, I>(&self, keys: I) -> LockedShards<'_>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let ids: BTreeSet<usize> = keys.into_iter().map(|key| self.router.route_key(key)).collect();
        self.lock_ids(ids)
    }

    /// Lock every shard
    pub fn lock_all(&self) -> LockedShards<'_> {
        self.lock_ids((0..self.shards.len()).collect())
    }

    fn lock_ids(&self, ids: BTreeSet<usize>) -> LockedShards<'_> {
        let guards = ids.into_iter().map(|id| (id, self.shards[id].lock())).collect();
        LockedShards {
            router: self.router,
            guards,
        }
    }

    /// Run one active expiration cycle on every shard, one shard at a time
    pub fn sweep(&self, sample_size: usize, max_rounds: usize) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.sweep(sample_size, max_rounds))
            .sum()
    }

    pub fn stats(&self) -> KeyspaceStats {
        let shards: Vec<ShardStats> = self.shards.iter().map(Shard::stats).collect();
        KeyspaceStats {
            num_shards: shards.len(),
            total_keys: shards.iter().map(|s| s.active_keys).sum(),
            expired_keys: shards.iter().map(|s| s.expired_keys).sum(),
            keys_with_ttl: shards.iter().map(|s| s.keys_with_ttl).sum(),
            reclaimed_keys: shards.iter().map(|s| s.reclaimed_keys).sum(),
            total_memory_bytes: shards.iter().map(|s| s.memory_bytes).sum(),
            shards,
        }
    }
}

/// A set of shard locks held together, ordered by shard id
pub struct LockedShards<'a> {
    router: ShardRouter,
    guards: Vec<(usize, MutexGuard<'a, MemoryStore>)>,
}

impl<'a> LockedShards<'a> {
    /// Store owning `key`, which must route to one of the locked shards
    pub fn store(&mut self, key: &[u8]) -> Result<&mut MemoryStore> {
        let id = self.router.route_key(key);
        match self.guards.binary_search_by_key(&id, |(shard_id, _)| *shard_id) {
            Ok(pos) => Ok(&mut *self.guards[pos].1),
            Err(_) => Err(StoreError::invalid(format!(
                "key routed to shard {} which is not locked",
                id
            ))),
        }
    }

    /// Every locked store, in shard order
    pub fn stores(&mut self) -> StoresMut<'_, 'a> {
        StoresMut {
            inner: self.guards.iter_mut(),
        }
    }

    /// Ids of the locked shards, ascending
    pub fn shard_ids(&self) -> Vec<usize> {
        self.guards.iter().map(|(id, _)| *id).collect()
    }
}

/// Mutable iterator over the stores of a [`LockedShards`]
pub struct StoresMut<'s, 'a> {
    inner: std::slice::IterMut<'s, (usize, MutexGuard<'a, MemoryStore>)>,
}

impl<'s, 'a> Iterator for StoresMut<'s, 'a> {
    type Item = &'s mut MemoryStore;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, guard)| &mut **guard)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Statistics across all shards
#[derive(Debug, Clone, Serialize)]
pub struct KeyspaceStats {
    pub num_shards: usize,
    /// Live keys
    pub total_keys: usize,
    /// Keys past their deadline but not reclaimed yet
    pub expired_keys: usize,
    pub keys_with_ttl: usize,
    pub reclaimed_keys: u64,
    pub total_memory_bytes: usize,
    pub shards: Vec<ShardStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;
    use bytes::Bytes;

    #[test]
    fn test_lock_keys_is_sorted_and_deduped() {
        let keyspace = Keyspace::new(8, 16);
        let keys: Vec<String> = (0..50).map(|i| format!("k{}", i)).collect();
        let locked = keyspace.lock_keys(keys.iter().map(|k| k.as_bytes()));
        let ids = locked.shard_ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_store_outside_locked_set() {
        let keyspace = Keyspace::new(16, 16);
        let key = b"alpha".as_slice();
        let owner = keyspace.router.route_key(key);
        let other = (0..50)
            .map(|i| format!("other{}", i))
            .find(|k| keyspace.router.route_key(k.as_bytes()) != owner)
            .unwrap();

        let mut locked = keyspace.lock_keys([key]);
        assert!(locked.store(key).is_ok());
        assert!(matches!(locked.store(other.as_bytes()), Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_stores_visits_every_locked_shard() {
        let keyspace = Keyspace::new(4, 16);
        let mut locked = keyspace.lock_all();
        let mut visited = 0;
        for (i, store) in locked.stores().enumerate() {
            store
                .set(Bytes::from(format!("marker{}", i)), Value::string("v"), None)
                .unwrap();
            visited += 1;
        }
        assert_eq!(visited, 4);
        drop(locked);

        let total: usize = keyspace.shards().iter().map(|s| s.stats().active_keys).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_stats_aggregate() {
        let keyspace = Keyspace::new(4, 16);
        for i in 0..20 {
            let key = Bytes::from(format!("key{}", i));
            keyspace
                .shard_for(&key)
                .lock()
                .set(key.clone(), Value::string("v"), None)
                .unwrap();
        }
        let stats = keyspace.stats();
        assert_eq!(stats.num_shards, 4);
        assert_eq!(stats.total_keys, 20);
        assert_eq!(stats.shards.iter().map(|s| s.total_keys).sum::<usize>(), 20);
    }
}

//! Command execution context

use super::KeyScope;
use crate::config::GroupDelivery;
use crate::error::Result;
use crate::keyspace::{Keyspace, LockedShards};
use crate::store::{Entry, MemoryStore};
use crate::types::HyperLogLog;
use bytes::Bytes;

/// Context provided to commands during execution
///
/// Holds the locks of every shard the running command (or transaction)
/// may touch, so the whole unit observes and produces one consistent state.
pub struct CommandContext<'a> {
    shards: LockedShards<'a>,

    /// Consumer group delivery mode
    pub delivery: GroupDelivery,
}

impl<'a> CommandContext<'a> {
    /// Lock the shards covering `scopes` and build a context over them
    pub fn lock(keyspace: &'a Keyspace, scopes: &[KeyScope<'_>], delivery: GroupDelivery) -> Self {
        let whole = scopes.iter().any(|scope| matches!(scope, KeyScope::All));
        let shards = if whole {
            keyspace.lock_all()
        } else {
            keyspace.lock_keys(scopes.iter().flat_map(|scope| match scope {
                KeyScope::Keys(keys) => keys.clone(),
                KeyScope::All => Vec::new(),
            }))
        };
        CommandContext { shards, delivery }
    }

    /// Store owning `key`
    pub fn store(&mut self, key: &[u8]) -> Result<&mut MemoryStore> {
        self.shards.store(key)
    }

    pub(crate) fn version(&mut self, key: &[u8]) -> Result<Option<u64>> {
        Ok(self.store(key)?.version(key))
    }

    pub(crate) fn snapshot(&mut self, key: &[u8]) -> Result<Option<Entry>> {
        Ok(self.store(key)?.snapshot(key))
    }

    pub(crate) fn restore(&mut self, key: Bytes, entry: Option<Entry>) -> Result<()> {
        self.store(&key)?.restore(key.clone(), entry);
        Ok(())
    }

    /// Copies of every locked store, for rolling back keyspace-wide commands
    pub(crate) fn snapshot_all(&mut self) -> Vec<MemoryStore> {
        self.shards.stores().map(|store| store.clone()).collect()
    }

    pub(crate) fn restore_all(&mut self, snapshots: Vec<MemoryStore>) {
        for (store, snapshot) in self.shards.stores().zip(snapshots) {
            *store = snapshot;
        }
    }

    /// Delete keys. Returns how many existed.
    pub fn del(&mut self, keys: &[Bytes]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.store(key)?.delete(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Count existing keys; a key named twice counts twice
    pub fn exists(&mut self, keys: &[Bytes]) -> Result<usize> {
        let mut found = 0;
        for key in keys {
            if self.store(key)?.exists(key) {
                found += 1;
            }
        }
        Ok(found)
    }

    /// Cardinality estimate of the union of the sketches at `keys`
    pub fn pfcount(&mut self, keys: &[Bytes]) -> Result<u64> {
        if let [key] = keys {
            return self.store(key)?.pfcount(key);
        }
        Ok(self.union(keys)?.estimate())
    }

    /// Merge the sketches at `sources` into `dest`
    pub fn pfmerge(&mut self, dest: &Bytes, sources: &[Bytes]) -> Result<()> {
        let merged = self.union(sources)?;
        self.store(dest)?.hll_merge_into(dest, &merged)
    }

    fn union(&mut self, keys: &[Bytes]) -> Result<HyperLogLog> {
        let mut merged = HyperLogLog::new();
        for key in keys {
            if let Some(sketch) = self.store(key)?.hll_sketch(key)? {
                merged.merge(&sketch);
            }
        }
        Ok(merged)
    }

    /// Live keys matching a glob pattern, sorted
    pub fn keys(&mut self, pattern: &[u8]) -> Vec<Bytes> {
        let mut keys: Vec<Bytes> = self
            .shards
            .stores()
            .flat_map(|store| store.keys(pattern))
            .collect();
        keys.sort();
        keys
    }

    /// Number of live keys
    pub fn dbsize(&mut self) -> usize {
        self.shards.stores().map(|store| store.stats().active_keys).sum()
    }

    pub fn flushall(&mut self) {
        for store in self.shards.stores() {
            store.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    fn keyspace_with(keys: &[&'static str]) -> Keyspace {
        let keyspace = Keyspace::new(4, 16);
        for key in keys {
            let key = Bytes::from(*key);
            keyspace
                .shard_for(&key)
                .lock()
                .set(key.clone(), Value::string("v"), None)
                .unwrap();
        }
        keyspace
    }

    #[test]
    fn test_del_and_exists_across_shards() {
        let keyspace = keyspace_with(&["a", "b", "c", "d"]);
        let keys: Vec<Bytes> = ["a", "b", "x"].iter().map(|k| Bytes::from(*k)).collect();
        let scope = KeyScope::Keys(keys.iter().map(|k| &k[..]).collect());
        let mut ctx = CommandContext::lock(&keyspace, &[scope], GroupDelivery::AtMostOnce);

        assert_eq!(ctx.exists(&keys).unwrap(), 2);
        assert_eq!(ctx.del(&keys).unwrap(), 2);
        assert_eq!(ctx.exists(&keys).unwrap(), 0);
    }

    #[test]
    fn test_keys_and_flushall() {
        let keyspace = keyspace_with(&["user:1", "user:2", "session"]);
        let mut ctx = CommandContext::lock(&keyspace, &[KeyScope::All], GroupDelivery::AtMostOnce);

        assert_eq!(ctx.keys(b"user:*"), vec![Bytes::from("user:1"), Bytes::from("user:2")]);
        assert_eq!(ctx.dbsize(), 3);
        ctx.flushall();
        assert_eq!(ctx.dbsize(), 0);
    }

    #[test]
    fn test_snapshot_all_restores() {
        let keyspace = keyspace_with(&["a", "b"]);
        let mut ctx = CommandContext::lock(&keyspace, &[KeyScope::All], GroupDelivery::AtMostOnce);
        let saved = ctx.snapshot_all();
        ctx.flushall();
        ctx.restore_all(saved);
        assert_eq!(ctx.dbsize(), 2);
    }
}

//! In-memory storage implementation

use super::entry::{Entry, TtlStatus};
use super::expiry::ExpiryIndex;
use super::value::Value;
use crate::error::{Result, StoreError};
use crate::pattern::glob_match;
use bytes::Bytes;
use rand::Rng;
use siphasher::sip::SipHasher13;
use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::time::{Duration, Instant};

/// Type alias for our hash map with SipHasher
type StoreMap = HashMap<Bytes, Entry, BuildHasherDefault<SipHasher13>>;

/// In-memory keyspace partition
///
/// Not synchronized: a shard wraps it in a mutex. Every access to a key
/// first reclaims it if its deadline has passed, so an expired key behaves
/// exactly like a missing one.
#[derive(Clone)]
pub struct MemoryStore {
    /// The main storage map
    store: StoreMap,

    /// Keys that carry a deadline
    expiry: ExpiryIndex,

    /// Source of entry versions
    next_version: u64,

    /// Keys reclaimed because their TTL elapsed
    reclaimed_keys: u64,
}

impl MemoryStore {
    /// Create a new memory store with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new memory store with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryStore {
            store: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
            expiry: ExpiryIndex::new(),
            next_version: 0,
            reclaimed_keys: 0,
        }
    }

    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Remove the key if its deadline has passed. Returns true if it was reclaimed.
    fn reap_if_expired(&mut self, key: &[u8]) -> bool {
        let expired = self
            .store
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if expired {
            self.store.remove(key);
            self.expiry.untrack(key);
            self.reclaimed_keys += 1;
        }
        expired
    }

    /// Store a value, replacing whatever the key held
    ///
    /// `ttl` installs a deadline of now + ttl; `None` leaves the key
    /// persistent, clearing any earlier deadline.
    pub fn set(&mut self, key: Bytes, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expire_at = match ttl {
            Some(ttl) => Some(deadline(ttl)?),
            None => None,
        };

        let version = self.bump_version();
        let mut entry = Entry::new(value, version);
        entry.expire_at = expire_at;

        if expire_at.is_some() {
            self.expiry.track(&key);
        } else {
            self.expiry.untrack(&key);
        }
        self.store.insert(key, entry);
        Ok(())
    }

    /// Get a value by key, returns None if not found or expired
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.reap_if_expired(key);
        self.store.get(key).map(|entry| &entry.value)
    }

    /// Get a mutable reference to a value for writing
    ///
    /// The version is left alone; callers that change the value call
    /// [`touch`](Self::touch) afterwards.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.reap_if_expired(key);
        self.store.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Get the value for writing, creating it with `init` when missing
    ///
    /// A newly created key is persistent and gets a fresh version. An
    /// existing key keeps its version until [`touch`](Self::touch).
    pub fn get_or_insert_with(&mut self, key: &Bytes, init: impl FnOnce() -> Value) -> &mut Value {
        self.reap_if_expired(key);
        let entry = match self.store.entry(key.clone()) {
            Slot::Occupied(slot) => slot.into_mut(),
            Slot::Vacant(slot) => {
                self.next_version += 1;
                slot.insert(Entry::new(init(), self.next_version))
            }
        };
        &mut entry.value
    }

    /// Mark a key as changed so WATCH sees the write
    pub(crate) fn touch(&mut self, key: &[u8]) {
        let version = self.bump_version();
        if let Some(entry) = self.store.get_mut(key) {
            entry.version = version;
        }
    }

    /// Delete a collection key once its last element is gone
    pub(crate) fn remove_if_drained(&mut self, key: &[u8]) {
        if self.store.get(key).is_some_and(|entry| entry.value.is_drained()) {
            self.store.remove(key);
            self.expiry.untrack(key);
        }
    }

    /// Delete a key, returns true if the key existed
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.reap_if_expired(key);
        self.expiry.untrack(key);
        self.store.remove(key).is_some()
    }

    /// Check if a key exists (and is not expired)
    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.reap_if_expired(key);
        self.store.contains_key(key)
    }

    /// Type name of the value stored at `key`
    pub fn type_of(&mut self, key: &[u8]) -> Option<&'static str> {
        self.get(key).map(Value::type_name)
    }

    /// Set expiration on an existing key, replacing any earlier one
    pub fn expire(&mut self, key: &[u8], ttl: Duration) -> Result<bool> {
        let expire_at = deadline(ttl)?;
        self.reap_if_expired(key);

        let Some(stored_key) = self.store.get_key_value(key).map(|(k, _)| k.clone()) else {
            return Ok(false);
        };
        let version = self.bump_version();
        if let Some(entry) = self.store.get_mut(key) {
            entry.expire_at = Some(expire_at);
            entry.version = version;
        }
        self.expiry.track(&stored_key);
        Ok(true)
    }

    /// Remove the expiration of a key. Returns true if a deadline was removed.
    pub fn persist(&mut self, key: &[u8]) -> bool {
        self.reap_if_expired(key);

        match self.store.get_mut(key) {
            Some(entry) if entry.expire_at.is_some() => {
                self.next_version += 1;
                entry.expire_at = None;
                entry.version = self.next_version;
                self.expiry.untrack(key);
                true
            }
            _ => false,
        }
    }

    /// Remaining lifetime of a key
    pub fn ttl(&mut self, key: &[u8]) -> TtlStatus {
        self.reap_if_expired(key);
        match self.store.get(key) {
            Some(entry) => entry.ttl(),
            None => TtlStatus::Absent,
        }
    }

    /// Current version of a key, `None` when it does not exist
    pub fn version(&mut self, key: &[u8]) -> Option<u64> {
        self.reap_if_expired(key);
        self.store.get(key).map(|entry| entry.version)
    }

    /// Copy of the raw entry, expired or not, for transaction rollback
    pub(crate) fn snapshot(&self, key: &[u8]) -> Option<Entry> {
        self.store.get(key).cloned()
    }

    /// Put back an entry captured by [`snapshot`](Self::snapshot)
    pub(crate) fn restore(&mut self, key: Bytes, entry: Option<Entry>) {
        match entry {
            Some(entry) => {
                if entry.expire_at.is_some() {
                    self.expiry.track(&key);
                } else {
                    self.expiry.untrack(&key);
                }
                self.store.insert(key, entry);
            }
            None => {
                self.expiry.untrack(&key);
                self.store.remove(&key);
            }
        }
    }

    /// Remove all keys
    pub fn clear(&mut self) {
        self.store.clear();
        self.expiry.clear();
    }

    /// Get the number of keys, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Live keys matching a glob pattern
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let now = Instant::now();
        self.store
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Every live key with its remaining TTL (`None` = persistent)
    pub fn expiry_snapshot(&self) -> Vec<(Bytes, Option<Duration>)> {
        let now = Instant::now();
        self.store
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.expire_at.map(|at| at - now)))
            .collect()
    }

    /// Check a random sample of keys with a deadline and reclaim expired ones
    ///
    /// Returns the number of keys reclaimed.
    pub fn expire_sample<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) -> usize {
        let candidates = self.expiry.sample(rng, count);
        candidates
            .iter()
            .filter(|key| self.reap_if_expired(key))
            .count()
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let active_keys = self
            .store
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count();

        let used_memory_bytes = self
            .store
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| key.len() + entry.memory_usage())
            .sum();

        StoreStats {
            total_keys: self.store.len(),
            expired_keys: self.store.len() - active_keys,
            active_keys,
            keys_with_ttl: self.expiry.len(),
            reclaimed_keys: self.reclaimed_keys,
            used_memory_bytes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute deadline for a TTL; a zero TTL is rejected
fn deadline(ttl: Duration) -> Result<Instant> {
    if ttl.is_zero() {
        return Err(StoreError::invalid("invalid expire time, TTL must be positive"));
    }
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| StoreError::invalid("invalid expire time, TTL too large"))
}

/// Statistics about the memory store
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub total_keys: usize,
    pub expired_keys: usize,
    pub active_keys: usize,
    pub keys_with_ttl: usize,
    pub reclaimed_keys: u64,
    pub used_memory_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ListEnd;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_basic_set_get() {
        let mut store = MemoryStore::new();
        store.set(key("key1"), Value::string("value1"), None).unwrap();

        let value = store.get(b"key1").unwrap();
        assert_eq!(value.as_string().unwrap(), &Bytes::from("value1"));
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();
        store.set(key("key1"), Value::string("value1"), None).unwrap();

        assert!(store.delete(b"key1"));
        assert!(!store.delete(b"key1"));
        assert!(!store.exists(b"key1"));
    }

    #[test]
    fn test_expiration() {
        let mut store = MemoryStore::new();
        store
            .set(key("key1"), Value::string("value1"), Some(Duration::from_millis(50)))
            .unwrap();
        assert!(store.exists(b"key1"));

        std::thread::sleep(Duration::from_millis(80));

        assert!(store.get(b"key1").is_none());
        assert_eq!(store.ttl(b"key1"), TtlStatus::Absent);
        assert_eq!(store.stats().reclaimed_keys, 1);
        assert_eq!(store.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_set_without_ttl_clears_deadline() {
        let mut store = MemoryStore::new();
        store
            .set(key("k"), Value::string("a"), Some(Duration::from_secs(10)))
            .unwrap();
        store.set(key("k"), Value::string("b"), None).unwrap();

        assert_eq!(store.ttl(b"k"), TtlStatus::Persistent);
        assert_eq!(store.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut store = MemoryStore::new();
        let result = store.set(key("k"), Value::string("a"), Some(Duration::ZERO));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert!(!store.exists(b"k"));
    }

    #[test]
    fn test_expire_and_persist() {
        let mut store = MemoryStore::new();
        assert!(!store.expire(b"missing", Duration::from_secs(5)).unwrap());

        store.set(key("k"), Value::string("a"), None).unwrap();
        assert!(store.expire(b"k", Duration::from_secs(100)).unwrap());
        assert!(matches!(store.ttl(b"k"), TtlStatus::Remaining(_)));

        assert!(store.persist(b"k"));
        assert!(!store.persist(b"k"));
        assert_eq!(store.ttl(b"k"), TtlStatus::Persistent);
    }

    #[test]
    fn test_versions_change_on_write() {
        let mut store = MemoryStore::new();
        assert_eq!(store.version(b"k"), None);

        store.set(key("k"), Value::string("a"), None).unwrap();
        let v1 = store.version(b"k").unwrap();
        assert_eq!(store.version(b"k"), Some(v1));

        store.get_mut(b"k");
        assert_eq!(store.version(b"k"), Some(v1));

        store.touch(b"k");
        let v2 = store.version(b"k").unwrap();
        assert!(v2 > v1);

        store.delete(b"k");
        store.set(key("k"), Value::string("a"), None).unwrap();
        assert!(store.version(b"k").unwrap() > v2);
    }

    #[test]
    fn test_failed_and_noop_writes_keep_version() {
        let mut store = MemoryStore::new();
        store.set(key("s"), Value::string("a"), None).unwrap();
        store.sadd(&key("tags"), vec![key("rust")]).unwrap();
        let string_version = store.version(b"s").unwrap();
        let set_version = store.version(b"tags").unwrap();

        assert!(store.push(&key("s"), vec![key("x")], ListEnd::Left).is_err());
        assert!(store.incr_by(&key("s"), 1).is_err());
        assert_eq!(store.version(b"s"), Some(string_version));

        assert_eq!(store.srem(b"tags", &[key("missing")]).unwrap(), 0);
        assert_eq!(store.sadd(&key("tags"), vec![key("rust")]).unwrap(), 0);
        assert!(!store.persist(b"tags"));
        assert_eq!(store.version(b"tags"), Some(set_version));

        assert_eq!(store.sadd(&key("tags"), vec![key("kv")]).unwrap(), 1);
        assert!(store.version(b"tags").unwrap() > set_version);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut store = MemoryStore::new();
        store
            .set(key("k"), Value::string("a"), Some(Duration::from_secs(60)))
            .unwrap();
        let saved = store.snapshot(b"k");
        let missing = store.snapshot(b"other");

        store.set(key("k"), Value::string("b"), None).unwrap();
        store.set(key("other"), Value::string("x"), None).unwrap();

        store.restore(key("k"), saved);
        store.restore(key("other"), missing);

        assert_eq!(store.get(b"k").unwrap(), &Value::string("a"));
        assert!(matches!(store.ttl(b"k"), TtlStatus::Remaining(_)));
        assert!(!store.exists(b"other"));
    }

    #[test]
    fn test_keys_pattern() {
        let mut store = MemoryStore::new();
        store.set(key("user:1"), Value::string("Alice"), None).unwrap();
        store.set(key("user:2"), Value::string("Bob"), None).unwrap();
        store.set(key("session:1"), Value::string("xyz"), None).unwrap();

        assert_eq!(store.keys(b"user:*").len(), 2);
        assert_eq!(store.keys(b"*").len(), 3);
        assert!(store.keys(b"nothing*").is_empty());
    }

    #[test]
    fn test_drained_collection_removed() {
        let mut store = MemoryStore::new();
        store.get_or_insert_with(&key("list"), Value::empty_list);
        store.remove_if_drained(b"list");
        assert!(!store.exists(b"list"));
    }
}

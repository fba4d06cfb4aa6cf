//! String operations (SET, GET, SETNX, INCRBY)

use super::{MemoryStore, Value};
use crate::error::{Result, StoreError};
use bytes::Bytes;
use std::time::Duration;

impl MemoryStore {
    /// Store a string, replacing any value and expiry the key had
    pub fn set_string(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        self.set(key, Value::String(value), ttl)
    }

    pub fn get_string(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        match self.get(key) {
            Some(value) => Ok(Some(value.as_string()?.clone())),
            None => Ok(None),
        }
    }

    /// Store a string only if the key does not exist. Returns true if it was set.
    pub fn set_nx(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        if self.exists(&key) {
            return Ok(false);
        }
        self.set(key, Value::String(value), ttl)?;
        Ok(true)
    }

    /// Add `delta` to the integer stored at `key`, treating a missing key as 0
    ///
    /// The key keeps its expiry.
    pub fn incr_by(&mut self, key: &Bytes, delta: i64) -> Result<i64> {
        let current = match self.get(key) {
            Some(value) => parse_integer(value.as_string()?)?,
            None => 0,
        };

        let updated = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::invalid("increment or decrement would overflow"))?;

        let encoded = Bytes::from(updated.to_string());
        match self.get_mut(key) {
            Some(value) => {
                *value = Value::String(encoded);
                self.touch(key);
            }
            None => self.set(key.clone(), Value::String(encoded), None)?,
        }
        Ok(updated)
    }
}

fn parse_integer(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| StoreError::invalid("value is not an integer or out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TtlStatus;

    #[test]
    fn test_set_get_string() {
        let mut store = MemoryStore::new();
        store.set_string(Bytes::from("k"), Bytes::from("v"), None).unwrap();
        assert_eq!(store.get_string(b"k").unwrap(), Some(Bytes::from("v")));
        assert_eq!(store.get_string(b"missing").unwrap(), None);
    }

    #[test]
    fn test_get_string_wrong_type() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("k"), Value::empty_stream(), None).unwrap();
        assert!(matches!(store.get_string(b"k"), Err(StoreError::TypeMismatch { .. })));
    }

    #[test]
    fn test_set_nx() {
        let mut store = MemoryStore::new();
        assert!(store.set_nx(Bytes::from("k"), Bytes::from("1"), None).unwrap());
        assert!(!store.set_nx(Bytes::from("k"), Bytes::from("2"), None).unwrap());
        assert_eq!(store.get_string(b"k").unwrap(), Some(Bytes::from("1")));
    }

    #[test]
    fn test_incr_by() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("counter");
        assert_eq!(store.incr_by(&key, 5).unwrap(), 5);
        assert_eq!(store.incr_by(&key, -7).unwrap(), -2);
        assert_eq!(store.get_string(b"counter").unwrap(), Some(Bytes::from("-2")));
    }

    #[test]
    fn test_incr_by_keeps_ttl() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("counter");
        store
            .set_string(key.clone(), Bytes::from("10"), Some(Duration::from_secs(60)))
            .unwrap();
        store.incr_by(&key, 1).unwrap();
        assert!(matches!(store.ttl(b"counter"), TtlStatus::Remaining(_)));
    }

    #[test]
    fn test_incr_by_errors() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("k");
        store.set_string(key.clone(), Bytes::from("abc"), None).unwrap();
        assert!(matches!(store.incr_by(&key, 1), Err(StoreError::InvalidArgument(_))));

        store.set_string(key.clone(), Bytes::from(i64::MAX.to_string()), None).unwrap();
        assert!(matches!(store.incr_by(&key, 1), Err(StoreError::InvalidArgument(_))));
    }
}

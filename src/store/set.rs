//! Set operations (SADD, SREM, SMEMBERS, SISMEMBER, SCARD)

use super::{MemoryStore, Value};
use crate::error::{Result, StoreError};
use bytes::Bytes;

impl MemoryStore {
    /// Add members, creating the set if needed. Returns how many were new.
    pub fn sadd(&mut self, key: &Bytes, members: Vec<Bytes>) -> Result<usize> {
        if members.is_empty() {
            return Err(StoreError::invalid("wrong number of arguments for sadd"));
        }

        let set = self.get_or_insert_with(key, Value::empty_set).as_set_mut()?;
        let added = members.into_iter().filter(|member| set.insert(member.clone())).count();
        if added > 0 {
            self.touch(key);
        }
        Ok(added)
    }

    /// Remove members. Returns how many were present.
    pub fn srem(&mut self, key: &[u8], members: &[Bytes]) -> Result<usize> {
        let Some(value) = self.get_mut(key) else {
            return Ok(0);
        };
        let set = value.as_set_mut()?;
        let removed = members.iter().filter(|member| set.remove(*member)).count();
        if removed > 0 {
            self.touch(key);
            self.remove_if_drained(key);
        }
        Ok(removed)
    }

    /// All members, in byte order
    pub fn smembers(&mut self, key: &[u8]) -> Result<Vec<Bytes>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<Bytes> = value.as_set()?.iter().cloned().collect();
        members.sort();
        Ok(members)
    }

    pub fn sismember(&mut self, key: &[u8], member: &[u8]) -> Result<bool> {
        match self.get(key) {
            Some(value) => Ok(value.as_set()?.contains(member)),
            None => Ok(false),
        }
    }

    pub fn scard(&mut self, key: &[u8]) -> Result<usize> {
        match self.get(key) {
            Some(value) => Ok(value.as_set()?.len()),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(items: &[&'static str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(*s)).collect()
    }

    #[test]
    fn test_sadd_dedupes() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("tags");
        assert_eq!(store.sadd(&key, members(&["a", "b", "a"])).unwrap(), 2);
        assert_eq!(store.sadd(&key, members(&["b", "c"])).unwrap(), 1);
        assert_eq!(store.scard(b"tags").unwrap(), 3);
        assert_eq!(store.smembers(b"tags").unwrap(), members(&["a", "b", "c"]));
    }

    #[test]
    fn test_srem_and_membership() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("s");
        store.sadd(&key, members(&["x", "y"])).unwrap();
        assert!(store.sismember(b"s", b"x").unwrap());
        assert_eq!(store.srem(b"s", &members(&["x", "z"])).unwrap(), 1);
        assert!(!store.sismember(b"s", b"x").unwrap());

        assert_eq!(store.srem(b"s", &members(&["y"])).unwrap(), 1);
        assert!(!store.exists(b"s"));
        assert!(store.smembers(b"s").unwrap().is_empty());
    }

    #[test]
    fn test_set_wrong_type() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("l");
        store.push(&key, members(&["a"]), crate::store::ListEnd::Right).unwrap();
        assert!(matches!(store.sadd(&key, members(&["a"])), Err(StoreError::TypeMismatch { .. })));
        assert!(matches!(store.scard(b"l"), Err(StoreError::TypeMismatch { .. })));
    }
}

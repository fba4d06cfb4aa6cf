//! Hash operations (HSET, HGET, HGETALL, HDEL, HLEN, HEXISTS)

use super::{MemoryStore, Value};
use crate::error::{Result, StoreError};
use bytes::Bytes;
use std::collections::HashMap;

impl MemoryStore {
    /// Set one field. Returns true if the field is new.
    pub fn hset(&mut self, key: &Bytes, field: Bytes, value: Bytes) -> Result<bool> {
        let hash = self.get_or_insert_with(key, Value::empty_hash).as_hash_mut()?;
        let added = hash.insert(field, value).is_none();
        self.touch(key);
        Ok(added)
    }

    /// Set several fields at once. Returns how many fields were new.
    pub fn hset_all(&mut self, key: &Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<usize> {
        if pairs.is_empty() {
            return Err(StoreError::invalid("wrong number of arguments for hset"));
        }

        let hash = self.get_or_insert_with(key, Value::empty_hash).as_hash_mut()?;
        let added = pairs
            .into_iter()
            .filter(|(field, value)| hash.insert(field.clone(), value.clone()).is_none())
            .count();
        self.touch(key);
        Ok(added)
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>> {
        match self.get(key) {
            Some(value) => Ok(value.as_hash()?.get(field).cloned()),
            None => Ok(None),
        }
    }

    /// Every field and value; empty for a missing key
    pub fn hgetall(&mut self, key: &[u8]) -> Result<HashMap<Bytes, Bytes>> {
        match self.get(key) {
            Some(value) => Ok(value.as_hash()?.clone()),
            None => Ok(HashMap::new()),
        }
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Bytes]) -> Result<usize> {
        let Some(value) = self.get_mut(key) else {
            return Ok(0);
        };
        let hash = value.as_hash_mut()?;
        let removed = fields.iter().filter(|field| hash.remove(*field).is_some()).count();
        if removed > 0 {
            self.touch(key);
            self.remove_if_drained(key);
        }
        Ok(removed)
    }

    pub fn hlen(&mut self, key: &[u8]) -> Result<usize> {
        match self.get(key) {
            Some(value) => Ok(value.as_hash()?.len()),
            None => Ok(0),
        }
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> Result<bool> {
        match self.get(key) {
            Some(value) => Ok(value.as_hash()?.contains_key(field)),
            None => Ok(false),
        }
    }
}

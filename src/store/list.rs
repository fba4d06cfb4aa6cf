//! List operations (LPUSH/RPUSH, LPOP/RPOP, LRANGE, LLEN)

use super::{MemoryStore, Value};
use crate::error::{Result, StoreError};
use crate::types::normalize_range;
use bytes::Bytes;

/// Which end of a list an operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    /// Head of the list (LPUSH / LPOP)
    Left,
    /// Tail of the list (RPUSH / RPOP)
    Right,
}

impl MemoryStore {
    /// Push values one by one at `end`, creating the list if needed
    ///
    /// Returns the new length.
    pub fn push(&mut self, key: &Bytes, values: Vec<Bytes>, end: ListEnd) -> Result<usize> {
        if values.is_empty() {
            return Err(StoreError::invalid("wrong number of arguments for push"));
        }

        let list = self.get_or_insert_with(key, Value::empty_list).as_list_mut()?;
        for value in values {
            match end {
                ListEnd::Left => list.push_front(value),
                ListEnd::Right => list.push_back(value),
            }
        }
        let len = list.len();
        self.touch(key);
        Ok(len)
    }

    pub fn pop(&mut self, key: &[u8], end: ListEnd) -> Result<Option<Bytes>> {
        let Some(value) = self.get_mut(key) else {
            return Ok(None);
        };
        let list = value.as_list_mut()?;
        let popped = match end {
            ListEnd::Left => list.pop_front(),
            ListEnd::Right => list.pop_back(),
        };
        if popped.is_some() {
            self.touch(key);
            self.remove_if_drained(key);
        }
        Ok(popped)
    }

    /// Elements in the inclusive index range; negative indices count from the tail
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Bytes>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let list = value.as_list()?;
        Ok(match normalize_range(start, stop, list.len()) {
            Some((s, e)) => list.range(s..=e).cloned().collect(),
            None => Vec::new(),
        })
    }

    pub fn llen(&mut self, key: &[u8]) -> Result<usize> {
        match self.get(key) {
            Some(value) => Ok(value.as_list()?.len()),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&'static str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(*s)).collect()
    }

    #[test]
    fn test_push_pop_fifo() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("queue");
        assert_eq!(store.push(&key, values(&["a"]), ListEnd::Right).unwrap(), 1);
        assert_eq!(store.push(&key, values(&["b", "c"]), ListEnd::Right).unwrap(), 3);

        assert_eq!(store.pop(b"queue", ListEnd::Left).unwrap(), Some(Bytes::from("a")));
        assert_eq!(store.pop(b"queue", ListEnd::Left).unwrap(), Some(Bytes::from("b")));
        assert_eq!(store.pop(b"queue", ListEnd::Left).unwrap(), Some(Bytes::from("c")));
        assert_eq!(store.pop(b"queue", ListEnd::Left).unwrap(), None);
        assert!(!store.exists(b"queue"));
    }

    #[test]
    fn test_lpush_reverses() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("l");
        store.push(&key, values(&["a", "b", "c"]), ListEnd::Left).unwrap();
        assert_eq!(store.lrange(b"l", 0, -1).unwrap(), values(&["c", "b", "a"]));
        assert_eq!(store.pop(b"l", ListEnd::Right).unwrap(), Some(Bytes::from("a")));
    }

    #[test]
    fn test_lrange_and_llen() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("l");
        store.push(&key, values(&["1", "2", "3", "4"]), ListEnd::Right).unwrap();
        assert_eq!(store.lrange(b"l", 1, 2).unwrap(), values(&["2", "3"]));
        assert_eq!(store.lrange(b"l", -2, -1).unwrap(), values(&["3", "4"]));
        assert!(store.lrange(b"l", 10, 20).unwrap().is_empty());
        assert_eq!(store.llen(b"l").unwrap(), 4);
        assert_eq!(store.llen(b"missing").unwrap(), 0);
    }

    #[test]
    fn test_push_wrong_type() {
        let mut store = MemoryStore::new();
        store.set_string(Bytes::from("s"), Bytes::from("x"), None).unwrap();
        let result = store.push(&Bytes::from("s"), values(&["a"]), ListEnd::Right);
        assert!(matches!(result, Err(StoreError::TypeMismatch { expected: "list", .. })));
        assert!(matches!(store.pop(b"s", ListEnd::Left), Err(StoreError::TypeMismatch { .. })));
    }
}

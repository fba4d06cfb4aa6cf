//! Value types for the key-value store

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{Result, StoreError};
use crate::types::{HyperLogLog, SortedSet, Stream};

/// Represents the different types of values that can be stored
///
/// Large or rarely used structures are boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe)
    String(Bytes),

    /// List of values (ordered, duplicates allowed)
    List(VecDeque<Bytes>),

    /// Set of unique values (unordered)
    Set(HashSet<Bytes>),

    /// Members ranked by score
    SortedSet(Box<SortedSet>),

    /// Hash map (field -> value)
    Hash(HashMap<Bytes, Bytes>),

    /// Append-only log with consumer groups
    Stream(Box<Stream>),

    /// Cardinality sketch
    HyperLogLog(Box<HyperLogLog>),
}

macro_rules! accessors {
    ($name:ident, $name_mut:ident, $variant:ident, $ty:ty, $label:literal) => {
        /// Borrow the inner value, or fail with `TypeMismatch`
        pub fn $name(&self) -> Result<&$ty> {
            match self {
                Value::$variant(inner) => {
                    let inner: &$ty = inner;
                    Ok(inner)
                }
                other => Err(StoreError::wrong_type($label, other.type_name())),
            }
        }

        /// Mutably borrow the inner value, or fail with `TypeMismatch`
        pub fn $name_mut(&mut self) -> Result<&mut $ty> {
            match self {
                Value::$variant(inner) => {
                    let inner: &mut $ty = inner;
                    Ok(inner)
                }
                other => Err(StoreError::wrong_type($label, other.type_name())),
            }
        }
    };
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    /// An empty list, filled by the first push
    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    /// An empty set
    pub fn empty_set() -> Self {
        Value::Set(HashSet::new())
    }

    /// An empty sorted set
    pub fn empty_sorted_set() -> Self {
        Value::SortedSet(Box::default())
    }

    /// An empty hash
    pub fn empty_hash() -> Self {
        Value::Hash(HashMap::new())
    }

    /// An empty stream with no consumer groups
    pub fn empty_stream() -> Self {
        Value::Stream(Box::default())
    }

    /// A sketch with every register at zero
    pub fn empty_hyperloglog() -> Self {
        Value::HyperLogLog(Box::default())
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
            Value::Hash(_) => "hash",
            Value::Stream(_) => "stream",
            Value::HyperLogLog(_) => "hyperloglog",
        }
    }

    accessors!(as_string, as_string_mut, String, Bytes, "string");
    accessors!(as_list, as_list_mut, List, VecDeque<Bytes>, "list");
    accessors!(as_set, as_set_mut, Set, HashSet<Bytes>, "set");
    accessors!(as_sorted_set, as_sorted_set_mut, SortedSet, SortedSet, "zset");
    accessors!(as_hash, as_hash_mut, Hash, HashMap<Bytes, Bytes>, "hash");
    accessors!(as_stream, as_stream_mut, Stream, Stream, "stream");
    accessors!(as_hyperloglog, as_hyperloglog_mut, HyperLogLog, HyperLogLog, "hyperloglog");

    /// True for a collection with no elements left
    ///
    /// Streams are never considered empty: they keep their last ID and
    /// consumer groups even when every record was trimmed.
    pub fn is_drained(&self) -> bool {
        match self {
            Value::List(list) => list.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
            Value::String(_) | Value::Stream(_) | Value::HyperLogLog(_) => false,
        }
    }

    /// Calculate approximate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        match self {
            Value::String(bytes) => bytes.len(),
            Value::List(list) => {
                let items_size: usize = list.iter().map(|b| b.len()).sum();
                items_size + std::mem::size_of::<VecDeque<Bytes>>()
            }
            Value::Set(set) => {
                let items_size: usize = set.iter().map(|b| b.len()).sum();
                items_size + std::mem::size_of::<HashSet<Bytes>>()
            }
            Value::SortedSet(zset) => zset.memory_usage(),
            Value::Hash(hash) => {
                let items_size: usize = hash.iter().map(|(k, v)| k.len() + v.len()).sum();
                items_size + std::mem::size_of::<HashMap<Bytes, Bytes>>()
            }
            Value::Stream(stream) => stream.memory_usage(),
            Value::HyperLogLog(hll) => hll.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch() {
        let mut value = Value::string("hello");
        assert!(value.as_string().is_ok());
        assert_eq!(
            value.as_list_mut(),
            Err(StoreError::TypeMismatch {
                expected: "list",
                found: "string"
            })
        );
    }

    #[test]
    fn test_drained() {
        assert!(Value::empty_list().is_drained());
        assert!(Value::empty_hash().is_drained());
        assert!(!Value::empty_stream().is_drained());
        assert!(!Value::string("").is_drained());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::empty_sorted_set().type_name(), "zset");
        assert_eq!(Value::empty_hyperloglog().type_name(), "hyperloglog");
        assert_eq!(Value::empty_set().type_name(), "set");
    }
}

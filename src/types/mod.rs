//! Data structures backing the collection values
//!
//! These types know nothing about keys, expiry or locking; the store wraps
//! them in [`Value`](crate::store::Value) variants.

pub mod hyperloglog;
pub mod sorted_set;
pub mod stream;

pub use hyperloglog::HyperLogLog;
pub use sorted_set::{ScoredMember, SortedSet};
pub use stream::{
    Consumer, ConsumerGroup, GroupStart, PendingEntry, Stream, StreamId, StreamRecord,
};

/// Resolve a Redis-style inclusive `[start, stop]` index range against a
/// collection of `len` elements
///
/// Negative indices count from the end (-1 is the last element).
/// Returns `None` when the range selects nothing.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

//! In-memory storage module
//!
//! Provides the keyspace of one shard: entries, expiry tracking and the
//! typed operations on each value kind. This module knows nothing about
//! locking, commands or pub/sub.

mod entry;
mod expiry;
mod memory;
mod value;

// Typed operations, one file per value kind
mod hash;
mod hll;
mod list;
mod set;
mod stream;
mod string;
mod zset;

pub use entry::{Entry, TtlStatus};
pub use expiry::{run_expiration_cycle, ExpiryIndex};
pub use list::ListEnd;
pub use memory::{MemoryStore, StoreStats};
pub use value::Value;
pub use zset::Extreme;


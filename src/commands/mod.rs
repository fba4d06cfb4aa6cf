//! Command execution module
//!
//! Every keyspace operation can be expressed as a [`Command`] value. Single
//! commands, transactions and pipelines all run through the same
//! [`Command::apply`] against a [`CommandContext`] that holds the locks of
//! the shards the command touches.

mod apply;
mod context;
mod parse;
mod pipeline;
mod reply;
mod transaction;

pub use apply::execute;
pub use context::CommandContext;
pub use parse::{parse_command, ParseError};
pub use pipeline::Pipeline;
pub use reply::Reply;
pub use transaction::Transaction;

use crate::store::{Extreme, ListEnd};
use crate::types::{GroupStart, StreamId};
use bytes::Bytes;
use std::time::Duration;

/// Keys a command touches, used to decide which shards to lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope<'a> {
    Keys(Vec<&'a [u8]>),
    /// The whole keyspace
    All,
}

/// A keyspace operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Strings
    Set { key: Bytes, value: Bytes, ttl: Option<Duration> },
    SetNx { key: Bytes, value: Bytes, ttl: Option<Duration> },
    Get { key: Bytes },
    IncrBy { key: Bytes, delta: i64 },

    // Keys and expiry
    Del { keys: Vec<Bytes> },
    Exists { keys: Vec<Bytes> },
    Expire { key: Bytes, ttl: Duration },
    Persist { key: Bytes },
    Ttl { key: Bytes },
    Type { key: Bytes },
    Keys { pattern: Bytes },
    DbSize,
    FlushAll,

    // Lists
    Push { key: Bytes, values: Vec<Bytes>, end: ListEnd },
    Pop { key: Bytes, end: ListEnd },
    LRange { key: Bytes, start: i64, stop: i64 },
    LLen { key: Bytes },

    // Sets
    SAdd { key: Bytes, members: Vec<Bytes> },
    SRem { key: Bytes, members: Vec<Bytes> },
    SMembers { key: Bytes },
    SIsMember { key: Bytes, member: Bytes },
    SCard { key: Bytes },

    // Sorted sets
    ZAdd { key: Bytes, member: Bytes, score: f64 },
    ZIncrBy { key: Bytes, member: Bytes, delta: f64 },
    ZPop { key: Bytes, which: Extreme },
    ZRem { key: Bytes, members: Vec<Bytes> },
    ZScore { key: Bytes, member: Bytes },
    ZRank { key: Bytes, member: Bytes },
    ZCard { key: Bytes },
    ZRange { key: Bytes, start: i64, stop: i64 },
    ZRevRange { key: Bytes, start: i64, stop: i64 },
    ZRangeByScore { key: Bytes, min: f64, max: f64 },

    // Hashes
    HSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HGet { key: Bytes, field: Bytes },
    HGetAll { key: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HLen { key: Bytes },
    HExists { key: Bytes, field: Bytes },

    // HyperLogLog
    PfAdd { key: Bytes, elements: Vec<Bytes> },
    PfCount { keys: Vec<Bytes> },
    PfMerge { dest: Bytes, sources: Vec<Bytes> },

    // Streams
    XAdd { key: Bytes, id: Option<StreamId>, fields: Vec<(Bytes, Bytes)> },
    XRead { key: Bytes, after: StreamId, count: Option<usize> },
    XRange { key: Bytes, start: StreamId, end: StreamId, count: Option<usize> },
    XLen { key: Bytes },
    XTrim { key: Bytes, maxlen: usize },
    XGroupCreate { key: Bytes, group: Bytes, start: GroupStart },
    /// `after: None` reads new records (`>`); `Some(id)` re-reads the
    /// consumer's pending records with ID greater than `id`
    XReadGroup { key: Bytes, group: Bytes, consumer: Bytes, after: Option<StreamId>, count: Option<usize> },
    XPending { key: Bytes, group: Bytes, consumer: Bytes, count: Option<usize> },
    XAck { key: Bytes, group: Bytes, ids: Vec<StreamId> },
}

impl Command {
    /// Get the command name (for debugging/logging)
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::SetNx { .. } => "SETNX",
            Command::Get { .. } => "GET",
            Command::IncrBy { .. } => "INCRBY",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Expire { .. } => "EXPIRE",
            Command::Persist { .. } => "PERSIST",
            Command::Ttl { .. } => "TTL",
            Command::Type { .. } => "TYPE",
            Command::Keys { .. } => "KEYS",
            Command::DbSize => "DBSIZE",
            Command::FlushAll => "FLUSHALL",
            Command::Push { end: ListEnd::Left, .. } => "LPUSH",
            Command::Push { end: ListEnd::Right, .. } => "RPUSH",
            Command::Pop { end: ListEnd::Left, .. } => "LPOP",
            Command::Pop { end: ListEnd::Right, .. } => "RPOP",
            Command::LRange { .. } => "LRANGE",
            Command::LLen { .. } => "LLEN",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SMembers { .. } => "SMEMBERS",
            Command::SIsMember { .. } => "SISMEMBER",
            Command::SCard { .. } => "SCARD",
            Command::ZAdd { .. } => "ZADD",
            Command::ZIncrBy { .. } => "ZINCRBY",
            Command::ZPop { which: Extreme::Min, .. } => "ZPOPMIN",
            Command::ZPop { which: Extreme::Max, .. } => "ZPOPMAX",
            Command::ZRem { .. } => "ZREM",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZRank { .. } => "ZRANK",
            Command::ZCard { .. } => "ZCARD",
            Command::ZRange { .. } => "ZRANGE",
            Command::ZRevRange { .. } => "ZREVRANGE",
            Command::ZRangeByScore { .. } => "ZRANGEBYSCORE",
            Command::HSet { .. } => "HSET",
            Command::HGet { .. } => "HGET",
            Command::HGetAll { .. } => "HGETALL",
            Command::HDel { .. } => "HDEL",
            Command::HLen { .. } => "HLEN",
            Command::HExists { .. } => "HEXISTS",
            Command::PfAdd { .. } => "PFADD",
            Command::PfCount { .. } => "PFCOUNT",
            Command::PfMerge { .. } => "PFMERGE",
            Command::XAdd { .. } => "XADD",
            Command::XRead { .. } => "XREAD",
            Command::XRange { .. } => "XRANGE",
            Command::XLen { .. } => "XLEN",
            Command::XTrim { .. } => "XTRIM",
            Command::XGroupCreate { .. } => "XGROUP",
            Command::XReadGroup { .. } => "XREADGROUP",
            Command::XPending { .. } => "XPENDING",
            Command::XAck { .. } => "XACK",
        }
    }

    /// Keys this command reads or writes
    pub fn keys(&self) -> KeyScope<'_> {
        match self {
            Command::Keys { .. } | Command::DbSize | Command::FlushAll => KeyScope::All,

            Command::Del { keys } | Command::Exists { keys } | Command::PfCount { keys } => {
                KeyScope::Keys(keys.iter().map(|k| &k[..]).collect())
            }

            Command::PfMerge { dest, sources } => KeyScope::Keys(
                std::iter::once(dest)
                    .chain(sources.iter())
                    .map(|k| &k[..])
                    .collect(),
            ),

            Command::Set { key, .. }
            | Command::SetNx { key, .. }
            | Command::Get { key }
            | Command::IncrBy { key, .. }
            | Command::Expire { key, .. }
            | Command::Persist { key }
            | Command::Ttl { key }
            | Command::Type { key }
            | Command::Push { key, .. }
            | Command::Pop { key, .. }
            | Command::LRange { key, .. }
            | Command::LLen { key }
            | Command::SAdd { key, .. }
            | Command::SRem { key, .. }
            | Command::SMembers { key }
            | Command::SIsMember { key, .. }
            | Command::SCard { key }
            | Command::ZAdd { key, .. }
            | Command::ZIncrBy { key, .. }
            | Command::ZPop { key, .. }
            | Command::ZRem { key, .. }
            | Command::ZScore { key, .. }
            | Command::ZRank { key, .. }
            | Command::ZCard { key }
            | Command::ZRange { key, .. }
            | Command::ZRevRange { key, .. }
            | Command::ZRangeByScore { key, .. }
            | Command::HSet { key, .. }
            | Command::HGet { key, .. }
            | Command::HGetAll { key }
            | Command::HDel { key, .. }
            | Command::HLen { key }
            | Command::HExists { key, .. }
            | Command::PfAdd { key, .. }
            | Command::XAdd { key, .. }
            | Command::XRead { key, .. }
            | Command::XRange { key, .. }
            | Command::XLen { key }
            | Command::XTrim { key, .. }
            | Command::XGroupCreate { key, .. }
            | Command::XReadGroup { key, .. }
            | Command::XPending { key, .. }
            | Command::XAck { key, .. } => KeyScope::Keys(vec![&key[..]]),
        }
    }

    /// Whether the command may modify the keyspace
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Command::Get { .. }
                | Command::Exists { .. }
                | Command::Ttl { .. }
                | Command::Type { .. }
                | Command::Keys { .. }
                | Command::DbSize
                | Command::LRange { .. }
                | Command::LLen { .. }
                | Command::SMembers { .. }
                | Command::SIsMember { .. }
                | Command::SCard { .. }
                | Command::ZScore { .. }
                | Command::ZRank { .. }
                | Command::ZCard { .. }
                | Command::ZRange { .. }
                | Command::ZRevRange { .. }
                | Command::ZRangeByScore { .. }
                | Command::HGet { .. }
                | Command::HGetAll { .. }
                | Command::HLen { .. }
                | Command::HExists { .. }
                | Command::PfCount { .. }
                | Command::XRead { .. }
                | Command::XRange { .. }
                | Command::XLen { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_direction() {
        let lpush = Command::Push {
            key: Bytes::from("l"),
            values: vec![],
            end: ListEnd::Left,
        };
        assert_eq!(lpush.name(), "LPUSH");
        let zpop = Command::ZPop {
            key: Bytes::from("z"),
            which: Extreme::Max,
        };
        assert_eq!(zpop.name(), "ZPOPMAX");
    }

    #[test]
    fn test_key_scope() {
        let merge = Command::PfMerge {
            dest: Bytes::from("d"),
            sources: vec![Bytes::from("a"), Bytes::from("b")],
        };
        assert_eq!(
            merge.keys(),
            KeyScope::Keys(vec![b"d".as_slice(), b"a".as_slice(), b"b".as_slice()])
        );
        assert_eq!(Command::FlushAll.keys(), KeyScope::All);
        assert!(Command::FlushAll.is_write());
        assert!(!Command::Get { key: Bytes::from("k") }.is_write());
    }
}

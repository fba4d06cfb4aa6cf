//! FerrumKV - an embeddable multi-structure in-memory store
//!
//! Strings, lists, sets, sorted sets, hashes, streams with consumer groups
//! and HyperLogLog sketches, with per-key TTL, transactions, pipelines and
//! publish/subscribe:
//! - `store` holds one shard's keys and the typed operations on them
//! - `keyspace` splits keys across mutex-guarded shards
//! - `commands` turns operations into values for transactions and pipelines
//! - `pubsub` is a separate broker that never touches the keyspace
//! - `engine` ties them together behind one handle

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod keyspace;
pub mod pattern;
pub mod pubsub;
pub mod store;
pub mod types;

/// Re-export commonly used types
pub use commands::{parse_command, Command, ParseError, Pipeline, Reply, Transaction};
pub use config::{EngineConfig, GroupDelivery};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, StoreError};
pub use pubsub::{Message, Subscription};
pub use store::{Extreme, ListEnd, TtlStatus};
pub use types::{GroupStart, ScoredMember, StreamId, StreamRecord};

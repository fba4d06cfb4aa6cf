//! Engine handle
//!
//! [`Engine`] is the entry point of the library: it owns the sharded
//! keyspace, the pub/sub broker and the background expiry sweeper, and
//! exposes one typed method per keyspace operation. Handles are cheap to
//! clone and share the same state.

use crate::commands::{execute, Command, CommandContext, KeyScope, Pipeline, Reply, Transaction};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::keyspace::{Keyspace, KeyspaceStats};
use crate::pubsub::{Broker, Subscription};
use crate::store::{Extreme, ListEnd, MemoryStore, TtlStatus};
use crate::types::{GroupStart, ScoredMember, StreamId, StreamRecord};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct EngineInner {
    config: EngineConfig,
    keyspace: Arc<Keyspace>,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle to an in-memory store
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

fn into_vec<I, K>(items: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = K>,
    K: Into<Bytes>,
{
    items.into_iter().map(Into::into).collect()
}

fn into_pairs<I, F, V>(pairs: I) -> Vec<(Bytes, Bytes)>
where
    I: IntoIterator<Item = (F, V)>,
    F: Into<Bytes>,
    V: Into<Bytes>,
{
    pairs.into_iter().map(|(f, v)| (f.into(), v.into())).collect()
}

impl Engine {
    /// Validate the configuration, build the keyspace and start the sweeper
    pub fn new(config: EngineConfig) -> std::result::Result<Self, EngineError> {
        config.validate()?;
        info!(
            "Starting engine with {} shards ({:?} group delivery)",
            config.num_shards, config.group_delivery
        );

        let keyspace = Arc::new(Keyspace::new(config.num_shards, config.initial_capacity));
        let broker = Arc::new(Broker::new(config.pubsub_capacity));
        let shutdown = CancellationToken::new();

        let sweeper = if config.active_expiry {
            Some(spawn_sweeper(&config, keyspace.clone(), shutdown.clone()).map_err(EngineError::Sweeper)?)
        } else {
            None
        };

        Ok(Engine {
            inner: Arc::new(EngineInner {
                config,
                keyspace,
                broker,
                shutdown,
                sweeper: Mutex::new(sweeper),
            }),
        })
    }

    /// Configuration the engine was started with
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Stop the background sweeper and wait for it to exit
    ///
    /// The keyspace stays usable; only active expiry stops. Calling this
    /// more than once is harmless.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Expiry sweeper panicked");
            }
            info!("Engine shut down");
        }
    }

    fn with_store<T>(&self, key: &[u8], f: impl FnOnce(&mut MemoryStore) -> Result<T>) -> Result<T> {
        let mut store = self.inner.keyspace.shard_for(key).lock();
        f(&mut store)
    }

    fn with_context<T>(&self, scope: KeyScope<'_>, f: impl FnOnce(&mut CommandContext<'_>) -> T) -> T {
        let mut ctx = CommandContext::lock(&self.inner.keyspace, &[scope], self.inner.config.group_delivery);
        f(&mut ctx)
    }

    // ---- Commands, transactions, pipelines ----

    /// Run one command atomically
    pub fn execute(&self, command: Command) -> Result<Reply> {
        execute(&self.inner.keyspace, self.inner.config.group_delivery, command)
    }

    /// Start an empty transaction; queue commands, optionally watch keys, then `exec`
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.inner.keyspace.clone(), self.inner.config.group_delivery)
    }

    /// Start an empty pipeline. Its commands run independently of each other.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.inner.keyspace.clone(), self.inner.config.group_delivery)
    }

    // ---- Strings ----

    /// Store a string, replacing any value; `None` clears an existing TTL
    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        self.with_store(&key.clone(), |store| store.set_string(key, value.into(), ttl))
    }

    /// Store a string only if the key does not exist
    pub fn set_nx(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, ttl: Option<Duration>) -> Result<bool> {
        let key = key.into();
        self.with_store(&key.clone(), |store| store.set_nx(key, value.into(), ttl))
    }

    /// String stored at `key`; `None` when missing or expired
    ///
    /// Fails with `TypeMismatch` when the key holds another kind of value.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.get_string(key))
    }

    /// Add `delta` to an integer string (missing counts as 0)
    pub fn incr_by(&self, key: impl Into<Bytes>, delta: i64) -> Result<i64> {
        let key = key.into();
        self.with_store(&key, |store| store.incr_by(&key, delta))
    }

    // ---- Keys and expiry ----

    /// Delete keys. Returns how many existed.
    pub fn del<I, K>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let keys = into_vec(keys);
        self.with_context(KeyScope::Keys(keys.iter().map(|k| &k[..]).collect()), |ctx| ctx.del(&keys))
    }

    /// Count the keys that exist (duplicates count twice)
    pub fn exists<I, K>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let keys = into_vec(keys);
        self.with_context(KeyScope::Keys(keys.iter().map(|k| &k[..]).collect()), |ctx| ctx.exists(&keys))
    }

    /// Set a TTL. Returns false when the key does not exist.
    pub fn expire(&self, key: impl AsRef<[u8]>, ttl: Duration) -> Result<bool> {
        let key = key.as_ref();
        self.with_store(key, |store| store.expire(key, ttl))
    }

    /// Remove a TTL. Returns true if one was removed.
    pub fn persist(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        let key = key.as_ref();
        self.with_store(key, |store| Ok(store.persist(key)))
    }

    /// Remaining lifetime of `key`
    pub fn ttl(&self, key: impl AsRef<[u8]>) -> Result<TtlStatus> {
        let key = key.as_ref();
        self.with_store(key, |store| Ok(store.ttl(key)))
    }

    /// Type name of the value at `key`
    pub fn type_of(&self, key: impl AsRef<[u8]>) -> Result<Option<&'static str>> {
        let key = key.as_ref();
        self.with_store(key, |store| Ok(store.type_of(key)))
    }

    /// Live keys matching a glob pattern, sorted
    pub fn keys(&self, pattern: impl AsRef<[u8]>) -> Result<Vec<Bytes>> {
        self.with_context(KeyScope::All, |ctx| Ok(ctx.keys(pattern.as_ref())))
    }

    /// Number of live keys across every shard
    pub fn dbsize(&self) -> Result<usize> {
        self.with_context(KeyScope::All, |ctx| Ok(ctx.dbsize()))
    }

    /// Delete every key in every shard
    pub fn flushall(&self) -> Result<()> {
        info!("Flushing every shard");
        self.with_context(KeyScope::All, |ctx| {
            ctx.flushall();
            Ok(())
        })
    }

    /// Every live key with its remaining TTL (`None` = persistent), sorted by key
    pub fn expiry_snapshot(&self) -> Vec<(Bytes, Option<Duration>)> {
        let mut snapshot: Vec<_> = self
            .inner
            .keyspace
            .shards()
            .iter()
            .flat_map(|shard| shard.lock().expiry_snapshot())
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Run one active expiration cycle now. Returns the number of keys reclaimed.
    pub fn sweep(&self) -> usize {
        let config = &self.inner.config;
        self.inner
            .keyspace
            .sweep(config.sweep_sample_size, config.sweep_max_rounds)
    }

    /// Per-shard and aggregate key, TTL and memory counters
    pub fn stats(&self) -> KeyspaceStats {
        self.inner.keyspace.stats()
    }

    // ---- Lists ----

    /// Push values onto one end. Returns the new length.
    pub fn push<I, V>(&self, key: impl Into<Bytes>, values: I, end: ListEnd) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.push(&key, into_vec(values), end))
    }

    /// Remove and return the value at one end of a list
    ///
    /// A list emptied by the pop is deleted.
    pub fn pop(&self, key: impl AsRef<[u8]>, end: ListEnd) -> Result<Option<Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.pop(key, end))
    }

    /// Elements in the inclusive index range; negative indices count from the tail
    pub fn lrange(&self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.lrange(key, start, stop))
    }

    /// Length of a list; 0 for a missing key
    pub fn llen(&self, key: impl AsRef<[u8]>) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.llen(key))
    }

    // ---- Sets ----

    /// Add members. Returns how many were new.
    pub fn sadd<I, M>(&self, key: impl Into<Bytes>, members: I) -> Result<usize>
    where
        I: IntoIterator<Item = M>,
        M: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.sadd(&key, into_vec(members)))
    }

    /// Remove members. Returns how many were present.
    pub fn srem<I, M>(&self, key: impl AsRef<[u8]>, members: I) -> Result<usize>
    where
        I: IntoIterator<Item = M>,
        M: Into<Bytes>,
    {
        let key = key.as_ref();
        self.with_store(key, |store| store.srem(key, &into_vec(members)))
    }

    /// All members of a set, in byte order
    pub fn smembers(&self, key: impl AsRef<[u8]>) -> Result<Vec<Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.smembers(key))
    }

    /// Whether `member` belongs to the set
    pub fn sismember(&self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> Result<bool> {
        let key = key.as_ref();
        self.with_store(key, |store| store.sismember(key, member.as_ref()))
    }

    /// Number of members; 0 for a missing key
    pub fn scard(&self, key: impl AsRef<[u8]>) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.scard(key))
    }

    // ---- Sorted sets ----

    /// Insert or update a member. Returns true if it was new.
    pub fn zadd(&self, key: impl Into<Bytes>, member: impl Into<Bytes>, score: f64) -> Result<bool> {
        let key = key.into();
        self.with_store(&key, |store| store.zadd(&key, member.into(), score))
    }

    /// Add `delta` to a member's score, starting from 0. Returns the new score.
    pub fn zincrby(&self, key: impl Into<Bytes>, member: impl Into<Bytes>, delta: f64) -> Result<f64> {
        let key = key.into();
        self.with_store(&key, |store| store.zincrby(&key, member.into(), delta))
    }

    /// Remove and return the lowest or highest scored member
    pub fn zpop(&self, key: impl AsRef<[u8]>, which: Extreme) -> Result<Option<ScoredMember>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zpop(key, which))
    }

    /// Remove members. Returns how many were present.
    pub fn zrem<I, M>(&self, key: impl AsRef<[u8]>, members: I) -> Result<usize>
    where
        I: IntoIterator<Item = M>,
        M: Into<Bytes>,
    {
        let key = key.as_ref();
        self.with_store(key, |store| store.zrem(key, &into_vec(members)))
    }

    /// Score of a member, if present
    pub fn zscore(&self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> Result<Option<f64>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zscore(key, member.as_ref()))
    }

    /// Zero-based rank of a member, lowest score first
    pub fn zrank(&self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> Result<Option<usize>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zrank(key, member.as_ref()))
    }

    /// Number of members; 0 for a missing key
    pub fn zcard(&self, key: impl AsRef<[u8]>) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zcard(key))
    }

    /// Members by rank, lowest score first; negative indices count from the end
    pub fn zrange(&self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zrange(key, start, stop))
    }

    /// Members by rank, highest score first
    pub fn zrevrange(&self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zrevrange(key, start, stop))
    }

    /// Members with `min <= score <= max`, ascending
    pub fn zrange_by_score(&self, key: impl AsRef<[u8]>, min: f64, max: f64) -> Result<Vec<ScoredMember>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.zrange_by_score(key, min, max))
    }

    // ---- Hashes ----

    /// Set one field. Returns true if the field was new.
    pub fn hset(&self, key: impl Into<Bytes>, field: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<bool> {
        let key = key.into();
        self.with_store(&key, |store| store.hset(&key, field.into(), value.into()))
    }

    /// Set several fields. Returns how many were new.
    pub fn hset_all<I, F, V>(&self, key: impl Into<Bytes>, pairs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.hset_all(&key, into_pairs(pairs)))
    }

    /// Value of one field
    pub fn hget(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.hget(key, field.as_ref()))
    }

    /// Every field and value; empty for a missing key
    pub fn hgetall(&self, key: impl AsRef<[u8]>) -> Result<HashMap<Bytes, Bytes>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.hgetall(key))
    }

    /// Remove fields. Returns how many existed.
    pub fn hdel<I, F>(&self, key: impl AsRef<[u8]>, fields: I) -> Result<usize>
    where
        I: IntoIterator<Item = F>,
        F: Into<Bytes>,
    {
        let key = key.as_ref();
        self.with_store(key, |store| store.hdel(key, &into_vec(fields)))
    }

    /// Number of fields
    pub fn hlen(&self, key: impl AsRef<[u8]>) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.hlen(key))
    }

    /// Whether `field` is set
    pub fn hexists(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Result<bool> {
        let key = key.as_ref();
        self.with_store(key, |store| store.hexists(key, field.as_ref()))
    }

    // ---- HyperLogLog ----

    /// Add elements to a sketch. Returns true if it was created or changed.
    pub fn pfadd<I, E>(&self, key: impl Into<Bytes>, elements: I) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
        E: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.pfadd(&key, &into_vec(elements)))
    }

    /// Cardinality estimate of one sketch, or of the union of several
    pub fn pfcount<I, K>(&self, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let keys = into_vec(keys);
        self.with_context(KeyScope::Keys(keys.iter().map(|k| &k[..]).collect()), |ctx| {
            ctx.pfcount(&keys)
        })
    }

    /// Merge the sources into `dest` (register-wise max)
    pub fn pfmerge<I, K>(&self, dest: impl Into<Bytes>, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let dest = dest.into();
        let sources = into_vec(sources);
        let mut scope: Vec<&[u8]> = vec![&dest[..]];
        scope.extend(sources.iter().map(|k| &k[..]));
        self.with_context(KeyScope::Keys(scope), |ctx| ctx.pfmerge(&dest, &sources))
    }

    // ---- Streams ----

    /// Append a record with a generated ID
    pub fn xadd<I, F, V>(&self, key: impl Into<Bytes>, fields: I) -> Result<StreamId>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.xadd(&key, into_pairs(fields)))
    }

    /// Append a record with an explicit ID, which must exceed the last one
    pub fn xadd_with_id<I, F, V>(&self, key: impl Into<Bytes>, id: StreamId, fields: I) -> Result<StreamId>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        let key = key.into();
        self.with_store(&key, |store| store.xadd_with_id(&key, id, into_pairs(fields)))
    }

    /// Records with an ID greater than `after`, oldest first
    ///
    /// The records are copied out of the stream and collected into a `Vec`;
    /// there is no blocking or streaming read.
    pub fn xread(&self, key: impl AsRef<[u8]>, after: StreamId, count: Option<usize>) -> Result<Vec<StreamRecord>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.xread(key, after, count))
    }

    /// Records with `start <= ID <= end`, oldest first
    pub fn xrange(
        &self,
        key: impl AsRef<[u8]>,
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let key = key.as_ref();
        self.with_store(key, |store| store.xrange(key, start, end, count))
    }

    /// Number of records currently in the stream
    pub fn xlen(&self, key: impl AsRef<[u8]>) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.xlen(key))
    }

    /// Drop the oldest records beyond `maxlen`. Returns how many were removed.
    pub fn xtrim(&self, key: impl AsRef<[u8]>, maxlen: usize) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.xtrim(key, maxlen))
    }

    /// Create a consumer group; a missing key becomes an empty stream
    ///
    /// Fails with `GroupExists` when the group is already there.
    pub fn xgroup_create(&self, key: impl Into<Bytes>, group: impl Into<Bytes>, start: GroupStart) -> Result<()> {
        let key = key.into();
        self.with_store(&key, |store| store.xgroup_create(&key, group.into(), start))
    }

    /// Deliver the records after the group's cursor to `consumer`
    pub fn xreadgroup(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
        consumer: impl Into<Bytes>,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let key = key.as_ref();
        let consumer = consumer.into();
        let delivery = self.inner.config.group_delivery;
        self.with_store(key, |store| {
            store.xreadgroup(key, group.as_ref(), &consumer, count, delivery)
        })
    }

    /// Records delivered to `consumer` and not acknowledged yet
    pub fn xpending(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
        consumer: impl AsRef<[u8]>,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let key = key.as_ref();
        self.with_store(key, |store| {
            store.xpending(key, group.as_ref(), consumer.as_ref(), StreamId::MIN, count)
        })
    }

    /// Re-read `consumer`'s pending records with an ID greater than `after`
    ///
    /// This is XREADGROUP with an explicit ID instead of `>`: the group's
    /// cursor does not move and nothing new is delivered. With
    /// at-most-once delivery there is no pending list, so the result is
    /// always empty.
    pub fn xreadgroup_from(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
        consumer: impl AsRef<[u8]>,
        after: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let key = key.as_ref();
        self.with_store(key, |store| {
            store.xpending(key, group.as_ref(), consumer.as_ref(), after, count)
        })
    }

    /// Acknowledge delivered records. Returns how many were still pending.
    pub fn xack(&self, key: impl AsRef<[u8]>, group: impl AsRef<[u8]>, ids: &[StreamId]) -> Result<usize> {
        let key = key.as_ref();
        self.with_store(key, |store| store.xack(key, group.as_ref(), ids))
    }

    // ---- Pub/sub ----

    /// Publish a message. Returns how many subscribers it was handed to.
    pub fn publish(&self, channel: impl Into<Bytes>, payload: impl Into<Bytes>) -> usize {
        self.inner.broker.publish(channel.into(), payload.into())
    }

    /// Subscribe to one channel
    pub fn subscribe(&self, channel: impl Into<Bytes>) -> Subscription {
        self.inner.broker.subscribe(channel.into())
    }

    /// Subscribe to every channel matching a glob pattern
    pub fn psubscribe(&self, pattern: impl Into<Bytes>) -> Subscription {
        self.inner.broker.psubscribe(pattern.into())
    }
}

/// Start the active expiry thread
///
/// The thread only holds the keyspace and the shutdown token, so dropping
/// the last engine handle stops it.
fn spawn_sweeper(
    config: &EngineConfig,
    keyspace: Arc<Keyspace>,
    shutdown: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    let interval = config.sweep_interval();
    let sample_size = config.sweep_sample_size;
    let max_rounds = config.sweep_max_rounds;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    std::thread::Builder::new()
        .name("ferrumkv-sweeper".into())
        .spawn(move || {
            runtime.block_on(async move {
                info!("Expiry sweeper started ({:?} interval)", interval);
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            let reclaimed = keyspace.sweep(sample_size, max_rounds);
                            if reclaimed > 0 {
                                debug!("Sweeper reclaimed {} expired keys", reclaimed);
                            }
                        }
                    }
                }

                info!("Expiry sweeper stopped");
            });
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupDelivery;

    fn engine(active_expiry: bool) -> Engine {
        Engine::new(EngineConfig {
            num_shards: 4,
            active_expiry,
            sweep_interval_ms: 10,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Engine::new(EngineConfig {
            pubsub_capacity: 0,
            ..EngineConfig::default()
        });
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_clones_share_state() {
        let engine = engine(false);
        let other = engine.clone();
        engine.set("k", "v", None).unwrap();
        assert_eq!(other.get("k").unwrap(), Some(Bytes::from("v")));
    }

    #[test]
    fn test_sweeper_reclaims_untouched_keys() {
        let engine = engine(true);
        for i in 0..10 {
            engine
                .set(format!("k{}", i), "v", Some(Duration::from_millis(20)))
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(300));

        let stats = engine.stats();
        assert_eq!(stats.expired_keys, 0);
        assert_eq!(stats.reclaimed_keys, 10);
        engine.shutdown();
    }

    #[test]
    fn test_manual_sweep_without_thread() {
        let engine = engine(false);
        engine.set("gone", "v", Some(Duration::from_millis(10))).unwrap();
        engine.set("kept", "v", None).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(engine.sweep(), 1);
        assert_eq!(engine.dbsize().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = engine(true);
        engine.shutdown();
        engine.shutdown();
        engine.set("still", "usable", None).unwrap();
        assert_eq!(engine.get("still").unwrap(), Some(Bytes::from("usable")));
    }

    #[test]
    fn test_multi_key_operations() {
        let engine = engine(false);
        engine.set("a", "1", None).unwrap();
        engine.set("b", "2", None).unwrap();
        engine.set("c", "3", None).unwrap();

        assert_eq!(engine.exists(["a", "b", "missing"]).unwrap(), 2);
        assert_eq!(engine.keys("*").unwrap().len(), 3);
        assert_eq!(engine.del(["a", "c", "missing"]).unwrap(), 2);
        assert_eq!(engine.keys("*").unwrap(), vec![Bytes::from("b")]);

        engine.flushall().unwrap();
        assert_eq!(engine.dbsize().unwrap(), 0);
    }

    #[test]
    fn test_expiry_snapshot_sorted() {
        let engine = engine(false);
        engine.set("b", "v", Some(Duration::from_secs(60))).unwrap();
        engine.set("a", "v", None).unwrap();

        let snapshot = engine.expiry_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], (Bytes::from("a"), None));
        assert_eq!(snapshot[1].0, Bytes::from("b"));
        assert!(snapshot[1].1.is_some());
    }

    #[test]
    fn test_group_delivery_from_config() {
        let engine = Engine::new(EngineConfig {
            num_shards: 2,
            active_expiry: false,
            group_delivery: GroupDelivery::AtLeastOnce,
            ..EngineConfig::default()
        })
        .unwrap();

        engine.xgroup_create("s", "g", GroupStart::Beginning).unwrap();
        let id = engine.xadd("s", [("f", "v")]).unwrap();
        assert_eq!(engine.xreadgroup("s", "g", "alice", None).unwrap().len(), 1);
        assert_eq!(engine.xpending("s", "g", "alice", None).unwrap().len(), 1);
        assert_eq!(engine.xack("s", "g", &[id]).unwrap(), 1);
        assert!(engine.xpending("s", "g", "alice", None).unwrap().is_empty());
    }

    #[test]
    fn test_xreadgroup_explicit_id_rereads_pending() {
        let engine = Engine::new(EngineConfig {
            num_shards: 2,
            active_expiry: false,
            group_delivery: GroupDelivery::AtLeastOnce,
            ..EngineConfig::default()
        })
        .unwrap();

        for ms in 1..=3 {
            engine.xadd_with_id("s", StreamId::new(ms, 0), [("n", ms.to_string())]).unwrap();
        }
        engine.xgroup_create("s", "g", GroupStart::Beginning).unwrap();
        assert_eq!(engine.xreadgroup("s", "g", "alice", None).unwrap().len(), 3);

        let after_two = engine.xreadgroup_from("s", "g", "alice", StreamId::new(2, 0), None).unwrap();
        assert_eq!(after_two.len(), 1);
        assert_eq!(after_two[0].id, StreamId::new(3, 0));
        assert_eq!(engine.xreadgroup_from("s", "g", "alice", StreamId::MIN, None).unwrap().len(), 3);
        assert!(engine.xreadgroup_from("s", "g", "bob", StreamId::MIN, None).unwrap().is_empty());

        let parsed = crate::commands::parse_command(
            &["XREADGROUP", "GROUP", "g", "alice", "COUNT", "1", "STREAMS", "s", "1"]
                .map(Bytes::from),
        )
        .unwrap();
        match engine.execute(parsed).unwrap() {
            Reply::Array(records) => assert_eq!(records.len(), 1),
            other => panic!("unexpected reply {:?}", other),
        }

        // Re-reading leaves the group cursor alone
        assert!(engine.xreadgroup("s", "g", "alice", None).unwrap().is_empty());
        engine.xack("s", "g", &[StreamId::new(3, 0)]).unwrap();
        assert!(engine.xreadgroup_from("s", "g", "alice", StreamId::new(2, 0), None).unwrap().is_empty());
    }
}

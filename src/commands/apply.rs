//! Command execution against locked shards

use super::{Command, CommandContext, Reply};
use crate::config::GroupDelivery;
use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::types::StreamId;
use tracing::debug;

/// Run one command atomically, locking every shard it touches
pub fn execute(keyspace: &Keyspace, delivery: GroupDelivery, command: Command) -> Result<Reply> {
    let mut ctx = CommandContext::lock(keyspace, &[command.keys()], delivery);
    command.apply(&mut ctx)
}

impl Command {
    /// Execute the command with the given context
    ///
    /// The context must hold the shards of every key in [`Command::keys`].
    pub fn apply(self, ctx: &mut CommandContext<'_>) -> Result<Reply> {
        debug!("Applying {}", self.name());

        match self {
            // Strings
            Command::Set { key, value, ttl } => {
                ctx.store(&key)?.set_string(key.clone(), value, ttl)?;
                Ok(Reply::Ok)
            }
            Command::SetNx { key, value, ttl } => {
                let set = ctx.store(&key)?.set_nx(key.clone(), value, ttl)?;
                Ok(Reply::flag(set))
            }
            Command::Get { key } => Ok(Reply::optional(ctx.store(&key)?.get_string(&key)?)),
            Command::IncrBy { key, delta } => Ok(Reply::Integer(ctx.store(&key)?.incr_by(&key, delta)?)),

            // Keys and expiry
            Command::Del { keys } => Ok(Reply::count(ctx.del(&keys)?)),
            Command::Exists { keys } => Ok(Reply::count(ctx.exists(&keys)?)),
            Command::Expire { key, ttl } => Ok(Reply::flag(ctx.store(&key)?.expire(&key, ttl)?)),
            Command::Persist { key } => Ok(Reply::flag(ctx.store(&key)?.persist(&key))),
            Command::Ttl { key } => Ok(Reply::Ttl(ctx.store(&key)?.ttl(&key))),
            Command::Type { key } => Ok(Reply::Status(ctx.store(&key)?.type_of(&key).unwrap_or("none"))),
            Command::Keys { pattern } => Ok(Reply::bulk_array(ctx.keys(&pattern))),
            Command::DbSize => Ok(Reply::count(ctx.dbsize())),
            Command::FlushAll => {
                ctx.flushall();
                Ok(Reply::Ok)
            }

            // Lists
            Command::Push { key, values, end } => Ok(Reply::count(ctx.store(&key)?.push(&key, values, end)?)),
            Command::Pop { key, end } => Ok(Reply::optional(ctx.store(&key)?.pop(&key, end)?)),
            Command::LRange { key, start, stop } => {
                Ok(Reply::bulk_array(ctx.store(&key)?.lrange(&key, start, stop)?))
            }
            Command::LLen { key } => Ok(Reply::count(ctx.store(&key)?.llen(&key)?)),

            // Sets
            Command::SAdd { key, members } => Ok(Reply::count(ctx.store(&key)?.sadd(&key, members)?)),
            Command::SRem { key, members } => Ok(Reply::count(ctx.store(&key)?.srem(&key, &members)?)),
            Command::SMembers { key } => Ok(Reply::bulk_array(ctx.store(&key)?.smembers(&key)?)),
            Command::SIsMember { key, member } => {
                Ok(Reply::flag(ctx.store(&key)?.sismember(&key, &member)?))
            }
            Command::SCard { key } => Ok(Reply::count(ctx.store(&key)?.scard(&key)?)),

            // Sorted sets
            Command::ZAdd { key, member, score } => {
                Ok(Reply::flag(ctx.store(&key)?.zadd(&key, member, score)?))
            }
            Command::ZIncrBy { key, member, delta } => {
                Ok(Reply::Double(ctx.store(&key)?.zincrby(&key, member, delta)?))
            }
            Command::ZPop { key, which } => Ok(match ctx.store(&key)?.zpop(&key, which)? {
                Some(popped) => Reply::scored(vec![popped]),
                None => Reply::Array(Vec::new()),
            }),
            Command::ZRem { key, members } => Ok(Reply::count(ctx.store(&key)?.zrem(&key, &members)?)),
            Command::ZScore { key, member } => Ok(ctx
                .store(&key)?
                .zscore(&key, &member)?
                .map(Reply::Double)
                .unwrap_or(Reply::Nil)),
            Command::ZRank { key, member } => Ok(ctx
                .store(&key)?
                .zrank(&key, &member)?
                .map(Reply::count)
                .unwrap_or(Reply::Nil)),
            Command::ZCard { key } => Ok(Reply::count(ctx.store(&key)?.zcard(&key)?)),
            Command::ZRange { key, start, stop } => {
                Ok(Reply::scored(ctx.store(&key)?.zrange(&key, start, stop)?))
            }
            Command::ZRevRange { key, start, stop } => {
                Ok(Reply::scored(ctx.store(&key)?.zrevrange(&key, start, stop)?))
            }
            Command::ZRangeByScore { key, min, max } => {
                Ok(Reply::scored(ctx.store(&key)?.zrange_by_score(&key, min, max)?))
            }

            // Hashes
            Command::HSet { key, pairs } => Ok(Reply::count(ctx.store(&key)?.hset_all(&key, pairs)?)),
            Command::HGet { key, field } => Ok(Reply::optional(ctx.store(&key)?.hget(&key, &field)?)),
            Command::HGetAll { key } => {
                let mut pairs: Vec<_> = ctx.store(&key)?.hgetall(&key)?.into_iter().collect();
                pairs.sort();
                Ok(Reply::bulk_array(pairs.into_iter().flat_map(|(f, v)| [f, v])))
            }
            Command::HDel { key, fields } => Ok(Reply::count(ctx.store(&key)?.hdel(&key, &fields)?)),
            Command::HLen { key } => Ok(Reply::count(ctx.store(&key)?.hlen(&key)?)),
            Command::HExists { key, field } => Ok(Reply::flag(ctx.store(&key)?.hexists(&key, &field)?)),

            // HyperLogLog
            Command::PfAdd { key, elements } => Ok(Reply::flag(ctx.store(&key)?.pfadd(&key, &elements)?)),
            Command::PfCount { keys } => {
                let estimate = ctx.pfcount(&keys)?;
                Ok(Reply::Integer(i64::try_from(estimate).unwrap_or(i64::MAX)))
            }
            Command::PfMerge { dest, sources } => {
                ctx.pfmerge(&dest, &sources)?;
                Ok(Reply::Ok)
            }

            // Streams
            Command::XAdd { key, id, fields } => {
                let store = ctx.store(&key)?;
                let id = match id {
                    Some(id) => store.xadd_with_id(&key, id, fields)?,
                    None => store.xadd(&key, fields)?,
                };
                Ok(Reply::stream_id(id))
            }
            Command::XRead { key, after, count } => {
                Ok(Reply::records(ctx.store(&key)?.xread(&key, after, count)?))
            }
            Command::XRange { key, start, end, count } => {
                Ok(Reply::records(ctx.store(&key)?.xrange(&key, start, end, count)?))
            }
            Command::XLen { key } => Ok(Reply::count(ctx.store(&key)?.xlen(&key)?)),
            Command::XTrim { key, maxlen } => Ok(Reply::count(ctx.store(&key)?.xtrim(&key, maxlen)?)),
            Command::XGroupCreate { key, group, start } => {
                ctx.store(&key)?.xgroup_create(&key, group, start)?;
                Ok(Reply::Ok)
            }
            Command::XReadGroup { key, group, consumer, after, count } => {
                let delivery = ctx.delivery;
                let store = ctx.store(&key)?;
                let records = match after {
                    None => store.xreadgroup(&key, &group, &consumer, count, delivery)?,
                    Some(after) => store.xpending(&key, &group, &consumer, after, count)?,
                };
                Ok(Reply::records(records))
            }
            Command::XPending { key, group, consumer, count } => Ok(Reply::records(
                ctx.store(&key)?
                    .xpending(&key, &group, &consumer, StreamId::MIN, count)?,
            )),
            Command::XAck { key, group, ids } => Ok(Reply::count(ctx.store(&key)?.xack(&key, &group, &ids)?)),
        }
    }
}

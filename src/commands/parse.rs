//! Parsing of whitespace-split command lines into [`Command`] values
//!
//! Syntax follows the familiar Redis forms, e.g. `SET key value EX 10`,
//! `ZADD key score member`, `XREADGROUP GROUP g c COUNT 10 STREAMS key >`.

use super::Command;
use crate::store::{Extreme, ListEnd};
use crate::types::{GroupStart, StreamId};
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while turning arguments into a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("ERR empty command")]
    Empty,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR value is not an integer or out of range")]
    InvalidInteger,

    #[error("ERR value is not a valid float")]
    InvalidFloat,

    #[error("ERR invalid stream ID")]
    InvalidStreamId,

    #[error("ERR syntax error")]
    Syntax,
}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Helper function to parse an integer argument
fn extract_integer(arg: &[u8]) -> ParseResult<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(ParseError::InvalidInteger)
}

fn extract_count(arg: &[u8]) -> ParseResult<usize> {
    usize::try_from(extract_integer(arg)?).map_err(|_| ParseError::InvalidInteger)
}

fn extract_float(arg: &[u8]) -> ParseResult<f64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(ParseError::InvalidFloat)
}

/// Positive number of seconds or milliseconds as a duration
fn extract_ttl(arg: &[u8], millis: bool) -> ParseResult<Duration> {
    let amount = u64::try_from(extract_integer(arg)?).map_err(|_| ParseError::InvalidInteger)?;
    Ok(if millis {
        Duration::from_millis(amount)
    } else {
        Duration::from_secs(amount)
    })
}

fn extract_id(arg: &[u8]) -> ParseResult<StreamId> {
    match arg {
        b"-" => Ok(StreamId::MIN),
        b"+" => Ok(StreamId::MAX),
        _ => std::str::from_utf8(arg)
            .ok()
            .and_then(|s| s.parse::<StreamId>().ok())
            .ok_or(ParseError::InvalidStreamId),
    }
}

fn pairs(args: &[Bytes]) -> ParseResult<Vec<(Bytes, Bytes)>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(ParseError::Syntax);
    }
    Ok(args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn keyword(arg: &[u8], expected: &str) -> bool {
    arg.eq_ignore_ascii_case(expected.as_bytes())
}

/// Parse a trailing `[COUNT n]`
fn optional_count(args: &[Bytes]) -> ParseResult<Option<usize>> {
    match args {
        [] => Ok(None),
        [kw, n] if keyword(kw, "COUNT") => Ok(Some(extract_count(n)?)),
        _ => Err(ParseError::Syntax),
    }
}

/// Parse a command line. `args[0]` is the command name (case-insensitive).
pub fn parse_command(args: &[Bytes]) -> ParseResult<Command> {
    let (name, args) = args.split_first().ok_or(ParseError::Empty)?;
    let name = String::from_utf8_lossy(name).to_ascii_uppercase();

    let arity = |ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(ParseError::WrongArity(name.to_lowercase()))
        }
    };

    let command = match name.as_str() {
        // Strings
        "SET" => {
            arity(args.len() == 2 || args.len() == 4)?;
            let ttl = match &args[2..] {
                [] => None,
                [unit, amount] if keyword(unit, "EX") => Some(extract_ttl(amount, false)?),
                [unit, amount] if keyword(unit, "PX") => Some(extract_ttl(amount, true)?),
                _ => return Err(ParseError::Syntax),
            };
            Command::Set { key: args[0].clone(), value: args[1].clone(), ttl }
        }
        "SETNX" => {
            arity(args.len() == 2)?;
            Command::SetNx { key: args[0].clone(), value: args[1].clone(), ttl: None }
        }
        "GET" => {
            arity(args.len() == 1)?;
            Command::Get { key: args[0].clone() }
        }
        "INCR" | "DECR" => {
            arity(args.len() == 1)?;
            let delta = if name == "INCR" { 1 } else { -1 };
            Command::IncrBy { key: args[0].clone(), delta }
        }
        "INCRBY" | "DECRBY" => {
            arity(args.len() == 2)?;
            let amount = extract_integer(&args[1])?;
            let delta = if name == "INCRBY" {
                amount
            } else {
                amount.checked_neg().ok_or(ParseError::InvalidInteger)?
            };
            Command::IncrBy { key: args[0].clone(), delta }
        }

        // Keys
        "DEL" => {
            arity(!args.is_empty())?;
            Command::Del { keys: args.to_vec() }
        }
        "EXISTS" => {
            arity(!args.is_empty())?;
            Command::Exists { keys: args.to_vec() }
        }
        "EXPIRE" | "PEXPIRE" => {
            arity(args.len() == 2)?;
            let ttl = extract_ttl(&args[1], name == "PEXPIRE")?;
            Command::Expire { key: args[0].clone(), ttl }
        }
        "PERSIST" => {
            arity(args.len() == 1)?;
            Command::Persist { key: args[0].clone() }
        }
        "TTL" | "PTTL" => {
            arity(args.len() == 1)?;
            Command::Ttl { key: args[0].clone() }
        }
        "TYPE" => {
            arity(args.len() == 1)?;
            Command::Type { key: args[0].clone() }
        }
        "KEYS" => {
            arity(args.len() == 1)?;
            Command::Keys { pattern: args[0].clone() }
        }
        "DBSIZE" => {
            arity(args.is_empty())?;
            Command::DbSize
        }
        "FLUSHALL" | "FLUSHDB" => {
            arity(args.is_empty())?;
            Command::FlushAll
        }

        // Lists
        "LPUSH" | "RPUSH" => {
            arity(args.len() >= 2)?;
            let end = if name == "LPUSH" { ListEnd::Left } else { ListEnd::Right };
            Command::Push { key: args[0].clone(), values: args[1..].to_vec(), end }
        }
        "LPOP" | "RPOP" => {
            arity(args.len() == 1)?;
            let end = if name == "LPOP" { ListEnd::Left } else { ListEnd::Right };
            Command::Pop { key: args[0].clone(), end }
        }
        "LRANGE" => {
            arity(args.len() == 3)?;
            Command::LRange {
                key: args[0].clone(),
                start: extract_integer(&args[1])?,
                stop: extract_integer(&args[2])?,
            }
        }
        "LLEN" => {
            arity(args.len() == 1)?;
            Command::LLen { key: args[0].clone() }
        }

        // Sets
        "SADD" | "SREM" => {
            arity(args.len() >= 2)?;
            let key = args[0].clone();
            let members = args[1..].to_vec();
            if name == "SADD" {
                Command::SAdd { key, members }
            } else {
                Command::SRem { key, members }
            }
        }
        "SMEMBERS" => {
            arity(args.len() == 1)?;
            Command::SMembers { key: args[0].clone() }
        }
        "SISMEMBER" => {
            arity(args.len() == 2)?;
            Command::SIsMember { key: args[0].clone(), member: args[1].clone() }
        }
        "SCARD" => {
            arity(args.len() == 1)?;
            Command::SCard { key: args[0].clone() }
        }

        // Sorted sets
        "ZADD" => {
            arity(args.len() == 3)?;
            Command::ZAdd {
                key: args[0].clone(),
                score: extract_float(&args[1])?,
                member: args[2].clone(),
            }
        }
        "ZINCRBY" => {
            arity(args.len() == 3)?;
            Command::ZIncrBy {
                key: args[0].clone(),
                delta: extract_float(&args[1])?,
                member: args[2].clone(),
            }
        }
        "ZPOPMIN" | "ZPOPMAX" => {
            arity(args.len() == 1)?;
            let which = if name == "ZPOPMIN" { Extreme::Min } else { Extreme::Max };
            Command::ZPop { key: args[0].clone(), which }
        }
        "ZREM" => {
            arity(args.len() >= 2)?;
            Command::ZRem { key: args[0].clone(), members: args[1..].to_vec() }
        }
        "ZSCORE" | "ZRANK" => {
            arity(args.len() == 2)?;
            let (key, member) = (args[0].clone(), args[1].clone());
            if name == "ZSCORE" {
                Command::ZScore { key, member }
            } else {
                Command::ZRank { key, member }
            }
        }
        "ZCARD" => {
            arity(args.len() == 1)?;
            Command::ZCard { key: args[0].clone() }
        }
        "ZRANGE" | "ZREVRANGE" => {
            arity(args.len() == 3)?;
            let key = args[0].clone();
            let start = extract_integer(&args[1])?;
            let stop = extract_integer(&args[2])?;
            if name == "ZRANGE" {
                Command::ZRange { key, start, stop }
            } else {
                Command::ZRevRange { key, start, stop }
            }
        }
        "ZRANGEBYSCORE" => {
            arity(args.len() == 3)?;
            Command::ZRangeByScore {
                key: args[0].clone(),
                min: extract_float(&args[1])?,
                max: extract_float(&args[2])?,
            }
        }

        // Hashes
        "HSET" | "HMSET" => {
            arity(args.len() >= 3)?;
            Command::HSet { key: args[0].clone(), pairs: pairs(&args[1..])? }
        }
        "HGET" | "HEXISTS" => {
            arity(args.len() == 2)?;
            let (key, field) = (args[0].clone(), args[1].clone());
            if name == "HGET" {
                Command::HGet { key, field }
            } else {
                Command::HExists { key, field }
            }
        }
        "HGETALL" => {
            arity(args.len() == 1)?;
            Command::HGetAll { key: args[0].clone() }
        }
        "HDEL" => {
            arity(args.len() >= 2)?;
            Command::HDel { key: args[0].clone(), fields: args[1..].to_vec() }
        }
        "HLEN" => {
            arity(args.len() == 1)?;
            Command::HLen { key: args[0].clone() }
        }

        // HyperLogLog
        "PFADD" => {
            arity(!args.is_empty())?;
            Command::PfAdd { key: args[0].clone(), elements: args[1..].to_vec() }
        }
        "PFCOUNT" => {
            arity(!args.is_empty())?;
            Command::PfCount { keys: args.to_vec() }
        }
        "PFMERGE" => {
            arity(!args.is_empty())?;
            Command::PfMerge { dest: args[0].clone(), sources: args[1..].to_vec() }
        }

        // Streams
        "XADD" => {
            arity(args.len() >= 4)?;
            let id = match args[1].as_ref() {
                b"*" => None,
                raw => Some(extract_id(raw)?),
            };
            Command::XAdd { key: args[0].clone(), id, fields: pairs(&args[2..])? }
        }
        "XREAD" => parse_xread(args)?,
        "XRANGE" => {
            arity(args.len() == 3 || args.len() == 5)?;
            Command::XRange {
                key: args[0].clone(),
                start: extract_id(&args[1])?,
                end: extract_id(&args[2])?,
                count: optional_count(&args[3..])?,
            }
        }
        "XLEN" => {
            arity(args.len() == 1)?;
            Command::XLen { key: args[0].clone() }
        }
        "XTRIM" => {
            arity(args.len() == 3)?;
            if !keyword(&args[1], "MAXLEN") {
                return Err(ParseError::Syntax);
            }
            Command::XTrim { key: args[0].clone(), maxlen: extract_count(&args[2])? }
        }
        "XGROUP" => {
            arity(args.len() >= 4)?;
            if !keyword(&args[0], "CREATE") {
                return Err(ParseError::Syntax);
            }
            let start = match args[3].as_ref() {
                b"$" => GroupStart::Latest,
                b"0" | b"0-0" => GroupStart::Beginning,
                raw => GroupStart::After(extract_id(raw)?),
            };
            match &args[4..] {
                [] => {}
                [flag] if keyword(flag, "MKSTREAM") => {}
                _ => return Err(ParseError::Syntax),
            }
            Command::XGroupCreate { key: args[1].clone(), group: args[2].clone(), start }
        }
        "XREADGROUP" => parse_xreadgroup(args)?,
        "XPENDING" => {
            arity(args.len() == 3 || args.len() == 4)?;
            let count = match args.get(3) {
                Some(n) => Some(extract_count(n)?),
                None => None,
            };
            Command::XPending {
                key: args[0].clone(),
                group: args[1].clone(),
                consumer: args[2].clone(),
                count,
            }
        }
        "XACK" => {
            arity(args.len() >= 3)?;
            let ids = args[2..]
                .iter()
                .map(|raw| extract_id(raw))
                .collect::<ParseResult<Vec<_>>>()?;
            Command::XAck { key: args[0].clone(), group: args[1].clone(), ids }
        }

        _ => return Err(ParseError::UnknownCommand(name.clone())),
    };

    Ok(command)
}

/// `XREAD [COUNT n] STREAMS key id`
fn parse_xread(args: &[Bytes]) -> ParseResult<Command> {
    let (count, rest) = match args {
        [kw, n, rest @ ..] if keyword(kw, "COUNT") => (Some(extract_count(n)?), rest),
        rest => (None, rest),
    };
    let [streams, key, id] = rest else {
        return Err(ParseError::WrongArity("xread".into()));
    };
    if !keyword(streams, "STREAMS") {
        return Err(ParseError::Syntax);
    }
    Ok(Command::XRead {
        key: key.clone(),
        after: extract_id(id)?,
        count,
    })
}

/// `XREADGROUP GROUP group consumer [COUNT n] STREAMS key (> | id)`
fn parse_xreadgroup(args: &[Bytes]) -> ParseResult<Command> {
    let [kw, group, consumer, rest @ ..] = args else {
        return Err(ParseError::WrongArity("xreadgroup".into()));
    };
    if !keyword(kw, "GROUP") {
        return Err(ParseError::Syntax);
    }

    let (count, rest) = match rest {
        [kw, n, rest @ ..] if keyword(kw, "COUNT") => (Some(extract_count(n)?), rest),
        rest => (None, rest),
    };
    match rest {
        [streams, key, cursor] if keyword(streams, "STREAMS") => {
            let after = match cursor.as_ref() {
                b">" => None,
                raw => Some(extract_id(raw)?),
            };
            Ok(Command::XReadGroup {
                key: key.clone(),
                group: group.clone(),
                consumer: consumer.clone(),
                after,
                count,
            })
        }
        _ => Err(ParseError::Syntax),
    }
}

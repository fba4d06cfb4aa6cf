//! Command replies
//!
//! A small value tree in the shape of RESP replies, so the same result can
//! be inspected by callers or printed by the shell.

use crate::store::TtlStatus;
use crate::types::{ScoredMember, StreamId, StreamRecord};
use bytes::Bytes;
use std::fmt;

/// Result of a successfully executed [`Command`](super::Command)
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain acknowledgement
    Ok,

    /// Absent value
    Nil,

    Integer(i64),

    /// Score or other floating point result
    Double(f64),

    /// Binary-safe string
    Bulk(Bytes),

    /// Short status text, such as a type name
    Status(&'static str),

    /// Remaining time to live of a key
    Ttl(TtlStatus),

    Array(Vec<Reply>),
}

impl Reply {
    /// Create a bulk string
    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(b.into())
    }

    /// Create an integer from a count
    pub fn count(n: usize) -> Self {
        Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// Create a 0/1 integer from a flag
    pub fn flag(b: bool) -> Self {
        Reply::Integer(i64::from(b))
    }

    /// Bulk string or nil
    pub fn optional(value: Option<Bytes>) -> Self {
        value.map(Reply::Bulk).unwrap_or(Reply::Nil)
    }

    pub fn bulk_array(items: impl IntoIterator<Item = Bytes>) -> Self {
        Reply::Array(items.into_iter().map(Reply::Bulk).collect())
    }

    /// Flat `[member, score, member, score, ...]` array
    pub fn scored(members: Vec<ScoredMember>) -> Self {
        Reply::Array(
            members
                .into_iter()
                .flat_map(|m| [Reply::Bulk(m.member), Reply::Double(m.score)])
                .collect(),
        )
    }

    pub fn stream_id(id: StreamId) -> Self {
        Reply::Bulk(Bytes::from(id.to_string()))
    }

    /// `[[id, [field, value, ...]], ...]`
    pub fn records(records: Vec<StreamRecord>) -> Self {
        Reply::Array(
            records
                .into_iter()
                .map(|record| {
                    let fields = record
                        .fields
                        .into_iter()
                        .flat_map(|(field, value)| [Reply::Bulk(field), Reply::Bulk(value)])
                        .collect();
                    Reply::Array(vec![Reply::stream_id(record.id), Reply::Array(fields)])
                })
                .collect(),
        )
    }

    /// Try to extract integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract bulk string bytes
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Double(d) => write!(f, "(double) {}", d),
            Reply::Bulk(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b).escape_debug()),
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Ttl(TtlStatus::Absent) => write!(f, "(integer) -2"),
            Reply::Ttl(TtlStatus::Persistent) => write!(f, "(integer) -1"),
            Reply::Ttl(TtlStatus::Remaining(left)) => write!(f, "(ttl) {}ms", left.as_millis()),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\n{:width$}", "", width = depth * 3)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    item.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// redis-cli style rendering
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

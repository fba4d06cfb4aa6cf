//! Append-only stream with consumer groups
//!
//! Records are keyed by [`StreamId`] in a `BTreeMap`, so reads after a
//! cursor are a range scan. Each consumer group keeps its own delivery
//! cursor; in at-least-once mode it also keeps a pending-entries list until
//! records are acknowledged.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::str::FromStr;
use std::time::Instant;

use crate::config::GroupDelivery;
use crate::error::StoreError;

/// Record identifier: milliseconds timestamp and a sequence within that millisecond
///
/// Ordering is lexicographic on `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// The smallest ID strictly greater than `self`
    fn successor(self) -> Option<StreamId> {
        if self.seq < u64::MAX {
            Some(StreamId::new(self.ms, self.seq + 1))
        } else if self.ms < u64::MAX {
            Some(StreamId::new(self.ms + 1, 0))
        } else {
            None
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = StoreError;

    /// Parses `ms-seq`, or a bare `ms` meaning `ms-0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::invalid(format!("invalid stream ID '{}'", s));
        match s.split_once('-') {
            Some((ms, seq)) => Ok(StreamId::new(
                ms.parse().map_err(|_| invalid())?,
                seq.parse().map_err(|_| invalid())?,
            )),
            None => Ok(StreamId::new(s.parse().map_err(|_| invalid())?, 0)),
        }
    }
}

/// One stream record, copied out of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: StreamId,
    pub fields: Vec<(Bytes, Bytes)>,
}

/// Where a new consumer group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStart {
    /// Deliver the whole history
    Beginning,
    /// Deliver only records appended after the group is created
    Latest,
    /// Deliver records with an ID greater than this one
    After(StreamId),
}

/// A record delivered to a consumer but not yet acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub consumer: Bytes,
    pub delivery_count: u32,
    pub delivered_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Consumer {
    /// Highest ID delivered to this consumer
    pub last_delivered: StreamId,
    /// Number of records delivered over the consumer's lifetime
    pub delivered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroup {
    pub last_delivered: StreamId,
    pub consumers: BTreeMap<Bytes, Consumer>,
    pub pending: BTreeMap<StreamId, PendingEntry>,
}

impl ConsumerGroup {
    fn new(start: StreamId) -> Self {
        ConsumerGroup {
            last_delivered: start,
            consumers: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }
}

/// Append-only log of records with strictly increasing IDs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stream {
    entries: BTreeMap<StreamId, Vec<(Bytes, Bytes)>>,
    /// Last ID ever assigned; survives trimming so IDs never go back
    last_id: StreamId,
    groups: BTreeMap<Bytes, ConsumerGroup>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID the next automatic append would receive at wall time `now_ms`
    ///
    /// Uses `(now_ms, 0)` when the clock moved past the last ID, otherwise
    /// bumps the sequence of the last ID, so a stalled or rewound clock
    /// still produces increasing IDs.
    pub fn next_id(&self, now_ms: u64) -> Result<StreamId, StoreError> {
        if now_ms > self.last_id.ms {
            return Ok(StreamId::new(now_ms, 0));
        }
        self.last_id
            .successor()
            .ok_or_else(|| StoreError::invalid("stream ID space exhausted"))
    }

    /// Append with an automatically assigned ID
    pub fn append(
        &mut self,
        now_ms: u64,
        fields: Vec<(Bytes, Bytes)>,
    ) -> Result<StreamId, StoreError> {
        let id = self.next_id(now_ms)?;
        self.entries.insert(id, fields);
        self.last_id = id;
        Ok(id)
    }

    /// Append with a caller-chosen ID, which must exceed every ID assigned so far
    pub fn append_with_id(
        &mut self,
        id: StreamId,
        fields: Vec<(Bytes, Bytes)>,
    ) -> Result<StreamId, StoreError> {
        if id == StreamId::MIN {
            return Err(StoreError::invalid("the ID specified must be greater than 0-0"));
        }
        if id <= self.last_id {
            return Err(StoreError::invalid(format!(
                "the ID specified ({}) is equal or smaller than the last ID ({})",
                id, self.last_id
            )));
        }
        self.entries.insert(id, fields);
        self.last_id = id;
        Ok(id)
    }

    /// Records with ID strictly greater than `after`, oldest first
    pub fn read_after(&self, after: StreamId, count: Option<usize>) -> Vec<StreamRecord> {
        self.collect((Excluded(after), Unbounded), count)
    }

    /// Records with `start <= ID <= end`, oldest first
    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamRecord> {
        if start > end {
            return Vec::new();
        }
        self.collect((Included(start), Included(end)), count)
    }

    /// Drop the oldest records until at most `maxlen` remain. Returns how many were dropped.
    pub fn trim(&mut self, maxlen: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if self.entries.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    pub fn create_group(&mut self, name: Bytes, start: GroupStart) -> Result<(), StoreError> {
        if self.groups.contains_key(&name) {
            return Err(StoreError::GroupExists);
        }
        let start = match start {
            GroupStart::Beginning => StreamId::MIN,
            GroupStart::Latest => self.last_id,
            GroupStart::After(id) => id,
        };
        self.groups.insert(name, ConsumerGroup::new(start));
        Ok(())
    }

    pub fn group(&self, name: &[u8]) -> Option<&ConsumerGroup> {
        self.groups.get(name)
    }

    /// Deliver up to `count` records after the group's cursor to `consumer`
    ///
    /// The cursor advances past everything returned. The consumer is
    /// registered on its first read. With [`GroupDelivery::AtLeastOnce`] the
    /// records also enter the pending list until [`ack`](Self::ack)ed.
    pub fn read_group(
        &mut self,
        group: &[u8],
        consumer: &Bytes,
        count: Option<usize>,
        delivery: GroupDelivery,
    ) -> Result<Vec<StreamRecord>, StoreError> {
        let state = self
            .groups
            .get_mut(group)
            .ok_or_else(|| StoreError::NotFound("consumer group".into()))?;

        let records = collect_range(&self.entries, (Excluded(state.last_delivered), Unbounded), count);

        let entry = state.consumers.entry(consumer.clone()).or_default();
        if let Some(last) = records.last() {
            state.last_delivered = last.id;
            entry.last_delivered = last.id;
            entry.delivered += records.len() as u64;
        }

        if delivery == GroupDelivery::AtLeastOnce {
            let now = Instant::now();
            for record in &records {
                state.pending.insert(
                    record.id,
                    PendingEntry {
                        consumer: consumer.clone(),
                        delivery_count: 1,
                        delivered_at: now,
                    },
                );
            }
        }

        Ok(records)
    }

    /// Re-deliver the records still pending for `consumer` with ID greater than `after`
    ///
    /// Records trimmed from the stream since delivery are skipped. Pass
    /// [`StreamId::MIN`] to start from the oldest pending record.
    pub fn pending(
        &mut self,
        group: &[u8],
        consumer: &[u8],
        after: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>, StoreError> {
        let state = self
            .groups
            .get_mut(group)
            .ok_or_else(|| StoreError::NotFound("consumer group".into()))?;

        let limit = count.unwrap_or(usize::MAX);
        let now = Instant::now();
        let mut out = Vec::new();
        for (id, pending) in state.pending.range_mut((Excluded(after), Unbounded)) {
            if out.len() >= limit {
                break;
            }
            if pending.consumer.as_ref() != consumer {
                continue;
            }
            if let Some(fields) = self.entries.get(id) {
                pending.delivery_count += 1;
                pending.delivered_at = now;
                out.push(StreamRecord {
                    id: *id,
                    fields: fields.clone(),
                });
            }
        }
        Ok(out)
    }

    /// Remove IDs from the group's pending list. Returns how many were pending.
    pub fn ack(&mut self, group: &[u8], ids: &[StreamId]) -> Result<usize, StoreError> {
        let state = self
            .groups
            .get_mut(group)
            .ok_or_else(|| StoreError::NotFound("consumer group".into()))?;

        Ok(ids.iter().filter(|id| state.pending.remove(*id).is_some()).count())
    }

    pub fn memory_usage(&self) -> usize {
        let fields: usize = self
            .entries
            .values()
            .flat_map(|fields| fields.iter())
            .map(|(f, v)| f.len() + v.len())
            .sum();
        fields + self.entries.len() * std::mem::size_of::<StreamId>()
    }

    fn collect(
        &self,
        bounds: (std::ops::Bound<StreamId>, std::ops::Bound<StreamId>),
        count: Option<usize>,
    ) -> Vec<StreamRecord> {
        collect_range(&self.entries, bounds, count)
    }
}

fn collect_range(
    entries: &BTreeMap<StreamId, Vec<(Bytes, Bytes)>>,
    bounds: (std::ops::Bound<StreamId>, std::ops::Bound<StreamId>),
    count: Option<usize>,
) -> Vec<StreamRecord> {
    entries
        .range(bounds)
        .take(count.unwrap_or(usize::MAX))
        .map(|(id, fields)| StreamRecord {
            id: *id,
            fields: fields.clone(),
        })
        .collect()
}

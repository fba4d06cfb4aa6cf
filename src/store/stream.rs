//! Stream operations (XADD, XREAD, XRANGE, XLEN, XTRIM, XGROUP, XREADGROUP, XACK)

use super::{MemoryStore, Value};
use crate::config::GroupDelivery;
use crate::error::{Result, StoreError};
use crate::types::{GroupStart, Stream, StreamId, StreamRecord};
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in milliseconds since the Unix epoch
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn check_fields(fields: &[(Bytes, Bytes)]) -> Result<()> {
    if fields.is_empty() {
        return Err(StoreError::invalid("wrong number of arguments for xadd"));
    }
    Ok(())
}

fn missing_group() -> StoreError {
    StoreError::NotFound("consumer group".into())
}

impl MemoryStore {
    /// Append a record with an ID derived from the wall clock
    pub fn xadd(&mut self, key: &Bytes, fields: Vec<(Bytes, Bytes)>) -> Result<StreamId> {
        check_fields(&fields)?;
        let now_ms = unix_millis();
        let id = self
            .get_or_insert_with(key, Value::empty_stream)
            .as_stream_mut()?
            .append(now_ms, fields)?;
        self.touch(key);
        Ok(id)
    }

    /// Append a record with an explicit ID greater than the stream's last ID
    pub fn xadd_with_id(&mut self, key: &Bytes, id: StreamId, fields: Vec<(Bytes, Bytes)>) -> Result<StreamId> {
        check_fields(&fields)?;
        match self.get_mut(key) {
            Some(value) => {
                let id = value.as_stream_mut()?.append_with_id(id, fields)?;
                self.touch(key);
                Ok(id)
            }
            None => {
                let mut stream = Stream::new();
                let id = stream.append_with_id(id, fields)?;
                self.set(key.clone(), Value::Stream(Box::new(stream)), None)?;
                Ok(id)
            }
        }
    }

    /// Records with ID strictly greater than `after`, oldest first
    ///
    /// The records are copied out into a `Vec`, so the result stays valid
    /// after the shard lock is released.
    pub fn xread(&mut self, key: &[u8], after: StreamId, count: Option<usize>) -> Result<Vec<StreamRecord>> {
        match self.get(key) {
            Some(value) => Ok(value.as_stream()?.read_after(after, count)),
            None => Ok(Vec::new()),
        }
    }

    /// Records with `start <= ID <= end`, oldest first
    pub fn xrange(
        &mut self,
        key: &[u8],
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        match self.get(key) {
            Some(value) => Ok(value.as_stream()?.range(start, end, count)),
            None => Ok(Vec::new()),
        }
    }

    pub fn xlen(&mut self, key: &[u8]) -> Result<usize> {
        match self.get(key) {
            Some(value) => Ok(value.as_stream()?.len()),
            None => Ok(0),
        }
    }

    /// Keep at most `maxlen` newest records. Returns how many were dropped.
    pub fn xtrim(&mut self, key: &[u8], maxlen: usize) -> Result<usize> {
        let removed = match self.get_mut(key) {
            Some(value) => value.as_stream_mut()?.trim(maxlen),
            None => return Ok(0),
        };
        if removed > 0 {
            self.touch(key);
        }
        Ok(removed)
    }

    /// Create a consumer group, creating an empty stream when the key is missing
    pub fn xgroup_create(&mut self, key: &Bytes, group: Bytes, start: GroupStart) -> Result<()> {
        self.get_or_insert_with(key, Value::empty_stream)
            .as_stream_mut()?
            .create_group(group, start)?;
        self.touch(key);
        Ok(())
    }

    /// Deliver records after the group's cursor to `consumer` and advance the cursor
    pub fn xreadgroup(
        &mut self,
        key: &[u8],
        group: &[u8],
        consumer: &Bytes,
        count: Option<usize>,
        delivery: GroupDelivery,
    ) -> Result<Vec<StreamRecord>> {
        let records = match self.get_mut(key) {
            Some(value) => value.as_stream_mut()?.read_group(group, consumer, count, delivery)?,
            None => return Err(missing_group()),
        };
        if !records.is_empty() {
            self.touch(key);
        }
        Ok(records)
    }

    /// Re-read the records delivered to `consumer` but not yet acknowledged
    ///
    /// Only records with ID greater than `after` are returned.
    pub fn xpending(
        &mut self,
        key: &[u8],
        group: &[u8],
        consumer: &[u8],
        after: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let records = match self.get_mut(key) {
            Some(value) => value.as_stream_mut()?.pending(group, consumer, after, count)?,
            None => return Err(missing_group()),
        };
        if !records.is_empty() {
            self.touch(key);
        }
        Ok(records)
    }

    /// Acknowledge delivered records. Returns how many were pending.
    pub fn xack(&mut self, key: &[u8], group: &[u8], ids: &[StreamId]) -> Result<usize> {
        let acked = match self.get_mut(key) {
            Some(value) => value.as_stream_mut()?.ack(group, ids)?,
            None => return Err(missing_group()),
        };
        if acked > 0 {
            self.touch(key);
        }
        Ok(acked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&'static str, &'static str)]) -> Vec<(Bytes, Bytes)> {
        pairs
            .iter()
            .map(|(f, v)| (Bytes::from(*f), Bytes::from(*v)))
            .collect()
    }

    #[test]
    fn test_xadd_ids_increase() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("events");
        let mut last = StreamId::MIN;
        for i in 0..100 {
            let id = store.xadd(&key, fields(&[("n", "x")])).unwrap();
            assert!(id > last, "id {} not after {} at {}", id, last, i);
            last = id;
        }
        assert_eq!(store.xlen(b"events").unwrap(), 100);
    }

    #[test]
    fn test_xadd_requires_fields() {
        let mut store = MemoryStore::new();
        let result = store.xadd(&Bytes::from("s"), Vec::new());
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert!(!store.exists(b"s"));
    }

    #[test]
    fn test_xadd_with_id() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("s");
        let id = StreamId::new(5, 1);
        assert_eq!(store.xadd_with_id(&key, id, fields(&[("a", "1")])).unwrap(), id);

        let stale = store.xadd_with_id(&key, StreamId::new(5, 1), fields(&[("a", "2")]));
        assert!(matches!(stale, Err(StoreError::InvalidArgument(_))));
        let zero = store.xadd_with_id(&Bytes::from("t"), StreamId::MIN, fields(&[("a", "2")]));
        assert!(matches!(zero, Err(StoreError::InvalidArgument(_))));
        assert!(!store.exists(b"t"));
        assert_eq!(store.xlen(b"s").unwrap(), 1);
    }

    #[test]
    fn test_xread_and_xrange() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("s");
        for i in 1..=3 {
            store
                .xadd_with_id(&key, StreamId::new(i, 0), fields(&[("i", "v")]))
                .unwrap();
        }
        let after_first = store.xread(b"s", StreamId::new(1, 0), None).unwrap();
        assert_eq!(after_first.iter().map(|r| r.id.ms).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(store.xread(b"s", StreamId::MIN, Some(1)).unwrap().len(), 1);
        assert!(store.xread(b"missing", StreamId::MIN, None).unwrap().is_empty());

        let range = store.xrange(b"s", StreamId::new(2, 0), StreamId::MAX, None).unwrap();
        assert_eq!(range.len(), 2);

        assert_eq!(store.xtrim(b"s", 1).unwrap(), 2);
        assert_eq!(store.xlen(b"s").unwrap(), 1);
    }

    #[test]
    fn test_groups() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("jobs");
        store
            .xgroup_create(&key, Bytes::from("workers"), GroupStart::Beginning)
            .unwrap();
        assert_eq!(store.type_of(b"jobs"), Some("stream"));
        assert_eq!(
            store.xgroup_create(&key, Bytes::from("workers"), GroupStart::Beginning),
            Err(StoreError::GroupExists)
        );

        store.xadd(&key, fields(&[("job", "1")])).unwrap();
        store.xadd(&key, fields(&[("job", "2")])).unwrap();

        let alice = Bytes::from("alice");
        let got = store
            .xreadgroup(b"jobs", b"workers", &alice, Some(1), GroupDelivery::AtMostOnce)
            .unwrap();
        assert_eq!(got.len(), 1);
        let rest = store
            .xreadgroup(b"jobs", b"workers", &Bytes::from("bob"), None, GroupDelivery::AtMostOnce)
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_ne!(got[0].id, rest[0].id);

        let missing = store.xreadgroup(b"jobs", b"nope", &alice, None, GroupDelivery::AtMostOnce);
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
        let no_stream = store.xreadgroup(b"none", b"workers", &alice, None, GroupDelivery::AtMostOnce);
        assert!(matches!(no_stream, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_pending_and_ack() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("jobs");
        store.xgroup_create(&key, Bytes::from("g"), GroupStart::Latest).unwrap();
        let id = store.xadd(&key, fields(&[("job", "1")])).unwrap();

        let worker = Bytes::from("w");
        store
            .xreadgroup(b"jobs", b"g", &worker, None, GroupDelivery::AtLeastOnce)
            .unwrap();
        let pending = store.xpending(b"jobs", b"g", b"w", StreamId::MIN, None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        assert_eq!(store.xack(b"jobs", b"g", &[id]).unwrap(), 1);
        assert_eq!(store.xack(b"jobs", b"g", &[id]).unwrap(), 0);
        assert!(store.xpending(b"jobs", b"g", b"w", StreamId::MIN, None).unwrap().is_empty());
    }
}

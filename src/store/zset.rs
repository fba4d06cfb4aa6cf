//! Sorted set operations (ZADD, ZINCRBY, ZPOPMIN/ZPOPMAX, ZRANGE, ...)

use super::{MemoryStore, Value};
use crate::error::{Result, StoreError};
use crate::types::ScoredMember;
use bytes::Bytes;

/// Which end of a sorted set to pop from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

fn check_score(score: f64) -> Result<()> {
    if score.is_nan() {
        return Err(StoreError::invalid("score is not a valid float"));
    }
    Ok(())
}

impl MemoryStore {
    /// Insert a member or update its score. Returns true if the member is new.
    pub fn zadd(&mut self, key: &Bytes, member: Bytes, score: f64) -> Result<bool> {
        check_score(score)?;
        let zset = self.get_or_insert_with(key, Value::empty_sorted_set).as_sorted_set_mut()?;
        let added = zset.add(member, score);
        self.touch(key);
        Ok(added)
    }

    /// Add `delta` to a member's score (missing member starts at 0). Returns the new score.
    pub fn zincrby(&mut self, key: &Bytes, member: Bytes, delta: f64) -> Result<f64> {
        check_score(delta)?;
        let current = match self.get(key) {
            Some(value) => value.as_sorted_set()?.score(&member).unwrap_or(0.0),
            None => 0.0,
        };
        if (current + delta).is_nan() {
            return Err(StoreError::invalid("resulting score is not a number (NaN)"));
        }

        let zset = self.get_or_insert_with(key, Value::empty_sorted_set).as_sorted_set_mut()?;
        let score = zset.incr(member, delta);
        self.touch(key);
        Ok(score)
    }

    /// Remove and return the member with the lowest or highest score
    ///
    /// Ties are broken by ascending member at both ends.
    pub fn zpop(&mut self, key: &[u8], which: Extreme) -> Result<Option<ScoredMember>> {
        let Some(value) = self.get_mut(key) else {
            return Ok(None);
        };
        let zset = value.as_sorted_set_mut()?;
        let popped = match which {
            Extreme::Min => zset.pop_min(),
            Extreme::Max => zset.pop_max(),
        };
        if popped.is_some() {
            self.touch(key);
            self.remove_if_drained(key);
        }
        Ok(popped)
    }

    pub fn zrem(&mut self, key: &[u8], members: &[Bytes]) -> Result<usize> {
        let Some(value) = self.get_mut(key) else {
            return Ok(0);
        };
        let zset = value.as_sorted_set_mut()?;
        let removed = members.iter().filter(|member| zset.remove(member)).count();
        if removed > 0 {
            self.touch(key);
            self.remove_if_drained(key);
        }
        Ok(removed)
    }

    pub fn zscore(&mut self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.score(member)),
            None => Ok(None),
        }
    }

    /// Zero-based rank of a member, lowest score first
    pub fn zrank(&mut self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.rank(member)),
            None => Ok(None),
        }
    }

    pub fn zcard(&mut self, key: &[u8]) -> Result<usize> {
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.len()),
            None => Ok(0),
        }
    }

    pub fn zrange(&mut self, key: &[u8], start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.range_by_rank(start, stop)),
            None => Ok(Vec::new()),
        }
    }

    pub fn zrevrange(&mut self, key: &[u8], start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.rev_range_by_rank(start, stop)),
            None => Ok(Vec::new()),
        }
    }

    /// Members with `min <= score <= max`, ascending
    pub fn zrange_by_score(&mut self, key: &[u8], min: f64, max: f64) -> Result<Vec<ScoredMember>> {
        check_score(min)?;
        check_score(max)?;
        match self.get(key) {
            Some(value) => Ok(value.as_sorted_set()?.range_by_score(min, max)),
            None => Ok(Vec::new()),
        }
    }
}

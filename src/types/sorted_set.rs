//! Sorted set: unique members ranked by (score, member)
//!
//! Kept as a sorted `Vec` for O(log n) rank lookups and cheap ordered
//! iteration, plus a member→score map for O(1) score lookups. Members are
//! `Bytes`, so both indexes share the same allocation.

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

use super::normalize_range;

/// A member together with its score, as returned by range and pop operations
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: Bytes,
    pub score: f64,
}

/// Sorted set of unique byte-string members with `f64` scores
///
/// Ordering is score ascending, then member ascending (lexicographic bytes).
/// Scores are never NaN; callers validate before inserting.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    /// Kept sorted by `(score, member)` at all times
    sorted: Vec<(OrderedFloat<f64>, Bytes)>,
    scores: HashMap<Bytes, OrderedFloat<f64>>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member or update its score. Returns true if the member is new.
    pub fn add(&mut self, member: Bytes, score: f64) -> bool {
        let new_score = OrderedFloat(score);

        match self.scores.get(&member).copied() {
            Some(old_score) if old_score == new_score => false,
            Some(old_score) => {
                if let Ok(idx) = self.search_idx(old_score, &member) {
                    self.sorted.remove(idx);
                }
                self.insert_sorted(new_score, member.clone());
                self.scores.insert(member, new_score);
                false
            }
            None => {
                self.insert_sorted(new_score, member.clone());
                self.scores.insert(member, new_score);
                true
            }
        }
    }

    /// Add `delta` to a member's score (missing members start at 0).
    /// Returns the new score.
    pub fn incr(&mut self, member: Bytes, delta: f64) -> f64 {
        let score = self.score(&member).unwrap_or(0.0) + delta;
        self.add(member, score);
        score
    }

    /// Remove a member. Returns true if it existed.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((name, score)) => {
                if let Ok(idx) = self.search_idx(score, &name) {
                    self.sorted.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    /// 0-based position of a member, lowest score first
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let (name, &score) = self.scores.get_key_value(member)?;
        self.search_idx(score, name).ok()
    }

    /// Members in the inclusive rank range, ascending. Negative indices
    /// count from the highest-ranked member.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<ScoredMember> {
        match normalize_range(start, stop, self.sorted.len()) {
            Some((s, e)) => self.sorted[s..=e].iter().map(to_scored).collect(),
            None => Vec::new(),
        }
    }

    /// Like [`range_by_rank`](Self::range_by_rank) but ranks are counted
    /// from the highest score and results come highest first
    pub fn rev_range_by_rank(&self, start: i64, stop: i64) -> Vec<ScoredMember> {
        let len = self.sorted.len();
        match normalize_range(start, stop, len) {
            Some((s, e)) => self.sorted[len - 1 - e..=len - 1 - s]
                .iter()
                .rev()
                .map(to_scored)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Members with `min <= score <= max`, ascending
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<ScoredMember> {
        let min = OrderedFloat(min);
        let max = OrderedFloat(max);
        let start = self.sorted.partition_point(|(s, _)| *s < min);
        self.sorted[start..]
            .iter()
            .take_while(|(s, _)| *s <= max)
            .map(to_scored)
            .collect()
    }

    /// Remove and return the lowest-ranked member
    pub fn pop_min(&mut self) -> Option<ScoredMember> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.take_at(0))
    }

    /// Remove and return a member with the highest score
    ///
    /// Among members sharing the highest score, the lexicographically
    /// smallest one is taken first.
    pub fn pop_max(&mut self) -> Option<ScoredMember> {
        let top = self.sorted.last()?.0;
        let idx = self.sorted.partition_point(|(s, _)| *s < top);
        Some(self.take_at(idx))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterate `(member, score)` in rank order
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.sorted.iter().map(|(score, member)| (member, score.0))
    }

    pub fn memory_usage(&self) -> usize {
        let members: usize = self.sorted.iter().map(|(_, m)| m.len()).sum();
        members + self.sorted.len() * std::mem::size_of::<(OrderedFloat<f64>, Bytes)>() * 2
    }

    fn take_at(&mut self, idx: usize) -> ScoredMember {
        let (score, member) = self.sorted.remove(idx);
        self.scores.remove(&member);
        ScoredMember {
            member,
            score: score.0,
        }
    }

    fn insert_sorted(&mut self, score: OrderedFloat<f64>, member: Bytes) {
        let idx = match self.search_idx(score, &member) {
            Ok(idx) | Err(idx) => idx,
        };
        self.sorted.insert(idx, (score, member));
    }

    /// `Ok(idx)` if `(score, member)` is present, `Err(insertion point)` otherwise
    fn search_idx(&self, score: OrderedFloat<f64>, member: &[u8]) -> Result<usize, usize> {
        self.sorted
            .binary_search_by(|(s, m)| s.cmp(&score).then_with(|| m.as_ref().cmp(member)))
    }
}

impl PartialEq for SortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.sorted == other.sorted
    }
}

fn to_scored((score, member): &(OrderedFloat<f64>, Bytes)) -> ScoredMember {
    ScoredMember {
        member: member.clone(),
        score: score.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(members: &[ScoredMember]) -> Vec<&[u8]> {
        members.iter().map(|m| m.member.as_ref()).collect()
    }

    #[test]
    fn test_add_and_update() {
        let mut ss = SortedSet::new();
        assert!(ss.add(Bytes::from("alice"), 100.0));
        assert!(!ss.add(Bytes::from("alice"), 200.0));
        assert_eq!(ss.score(b"alice"), Some(200.0));
        assert_eq!(ss.len(), 1);
    }

    #[test]
    fn test_rank_ties_are_lexicographic() {
        let mut ss = SortedSet::new();
        ss.add(Bytes::from("charlie"), 1.0);
        ss.add(Bytes::from("alice"), 1.0);
        ss.add(Bytes::from("bob"), 1.0);
        ss.add(Bytes::from("zed"), 0.5);

        assert_eq!(ss.rank(b"zed"), Some(0));
        assert_eq!(ss.rank(b"alice"), Some(1));
        assert_eq!(ss.rank(b"bob"), Some(2));
        assert_eq!(ss.rank(b"charlie"), Some(3));
        assert_eq!(ss.rank(b"nobody"), None);
    }

    #[test]
    fn test_update_moves_member() {
        let mut ss = SortedSet::new();
        ss.add(Bytes::from("a"), 1.0);
        ss.add(Bytes::from("b"), 2.0);
        ss.add(Bytes::from("a"), 3.0);

        assert_eq!(names(&ss.range_by_rank(0, -1)), vec![&b"b"[..], b"a"]);
    }

    #[test]
    fn test_pop_max_order() {
        let mut ss = SortedSet::new();
        ss.add(Bytes::from("Arief"), 49.0);
        ss.add(Bytes::from("Erlang"), 62.0);
        ss.add(Bytes::from("Parhan"), 61.0);

        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("Erlang"));
        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("Parhan"));
        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("Arief"));
        assert!(ss.pop_max().is_none());
        assert!(ss.is_empty());
    }

    #[test]
    fn test_pop_max_ties_ascending_member() {
        let mut ss = SortedSet::new();
        ss.add(Bytes::from("b"), 5.0);
        ss.add(Bytes::from("c"), 5.0);
        ss.add(Bytes::from("a"), 5.0);
        ss.add(Bytes::from("low"), 1.0);

        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("a"));
        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("b"));
        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("c"));
        assert_eq!(ss.pop_max().unwrap().member, Bytes::from("low"));
    }

    #[test]
    fn test_pop_min() {
        let mut ss = SortedSet::new();
        ss.add(Bytes::from("b"), 1.0);
        ss.add(Bytes::from("a"), 1.0);
        ss.add(Bytes::from("c"), 0.0);

        let popped = ss.pop_min().unwrap();
        assert_eq!(popped.member, Bytes::from("c"));
        assert_eq!(popped.score, 0.0);
        assert_eq!(ss.pop_min().unwrap().member, Bytes::from("a"));
        assert_eq!(ss.score(b"a"), None);
    }

    #[test]
    fn test_ranges() {
        let mut ss = SortedSet::new();
        for (m, s) in [("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 40.0)] {
            ss.add(Bytes::from(m), s);
        }

        assert_eq!(names(&ss.range_by_rank(1, 2)), vec![&b"b"[..], b"c"]);
        assert_eq!(names(&ss.rev_range_by_rank(0, 1)), vec![&b"d"[..], b"c"]);
        assert_eq!(names(&ss.range_by_score(15.0, 30.0)), vec![&b"b"[..], b"c"]);
        assert!(ss.range_by_score(50.0, 60.0).is_empty());
        assert!(ss.range_by_rank(10, 20).is_empty());
    }

    #[test]
    fn test_incr_and_remove() {
        let mut ss = SortedSet::new();
        assert_eq!(ss.incr(Bytes::from("x"), 2.5), 2.5);
        assert_eq!(ss.incr(Bytes::from("x"), 1.0), 3.5);
        assert!(ss.remove(b"x"));
        assert!(!ss.remove(b"x"));
        assert!(ss.is_empty());
    }
}

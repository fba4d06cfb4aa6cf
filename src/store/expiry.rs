//! Expiry index and active expiration
//!
//! Deadlines live on each [`Entry`](super::Entry); lazy expiration on access
//! is what makes expired keys invisible. This index only remembers which
//! keys carry a deadline so the active sweep can sample them at random and
//! reclaim memory held by keys nobody reads again.

use bytes::Bytes;
use rand::seq::index;
use rand::Rng;
use std::collections::HashMap;

use super::MemoryStore;

/// If more than this fraction of a sample was expired, sample again
const EXPIRED_THRESHOLD: f64 = 0.25;

/// Set of keys with a deadline, supporting O(1) insert, remove and random pick
#[derive(Debug, Clone, Default)]
pub struct ExpiryIndex {
    keys: Vec<Bytes>,
    slots: HashMap<Bytes, usize>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, key: &Bytes) {
        if self.slots.contains_key(key) {
            return;
        }
        self.slots.insert(key.clone(), self.keys.len());
        self.keys.push(key.clone());
    }

    pub fn untrack(&mut self, key: &[u8]) {
        if let Some(slot) = self.slots.remove(key) {
            self.keys.swap_remove(slot);
            if let Some(moved) = self.keys.get(slot) {
                self.slots.insert(moved.clone(), slot);
            }
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pick up to `count` distinct tracked keys at random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Bytes> {
        let amount = count.min(self.keys.len());
        index::sample(rng, self.keys.len(), amount)
            .into_iter()
            .map(|slot| self.keys[slot].clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.slots.clear();
    }
}

/// Run one active expiration cycle on a store
///
/// Samples `sample_size` keys with a deadline, reclaims the expired ones,
/// and goes again while more than a quarter of the sample was expired, for
/// at most `max_rounds` rounds. Returns the number of keys reclaimed.
pub fn run_expiration_cycle(store: &mut MemoryStore, sample_size: usize, max_rounds: usize) -> usize {
    let mut rng = rand::thread_rng();
    let mut total_removed = 0;

    for _ in 0..max_rounds {
        let removed = store.expire_sample(&mut rng, sample_size);
        total_removed += removed;

        if (removed as f64) <= (sample_size as f64) * EXPIRED_THRESHOLD {
            break;
        }
    }

    total_removed
}

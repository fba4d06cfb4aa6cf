//! Key routing logic for sharding
//!
//! Routes keys to shards by hashing them with SipHash-1-3.

use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Maps keys to shard ids
#[derive(Debug, Clone, Copy)]
pub struct ShardRouter {
    num_shards: usize,
}

impl ShardRouter {
    /// Create a new shard router; zero shards is treated as one
    pub fn new(num_shards: usize) -> Self {
        ShardRouter {
            num_shards: num_shards.max(1),
        }
    }

    /// Route a key to a shard ID
    ///
    /// The same key always lands on the same shard for a given shard count.
    pub fn route_key(&self, key: &[u8]) -> usize {
        if self.num_shards == 1 {
            return 0;
        }
        (hash_key(key) % self.num_shards as u64) as usize
    }

    /// Get the number of shards
    pub fn num_shards(&self) -> usize {
        self.num_shards
    }
}

fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new();
    key.hash(&mut hasher);
    hasher.finish()
}

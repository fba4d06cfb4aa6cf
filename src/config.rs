//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Delivery guarantee for stream consumer groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDelivery {
    /// Reading advances the cursor and the records are considered handled
    #[default]
    AtMostOnce,

    /// Delivered records stay pending until acknowledged
    AtLeastOnce,
}

/// Configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of keyspace shards
    pub num_shards: usize,

    /// Initial key capacity of each shard
    pub initial_capacity: usize,

    /// Run the background sweep that reclaims expired keys nobody reads
    pub active_expiry: bool,

    /// Delay between two sweep cycles
    pub sweep_interval_ms: u64,

    /// Keys sampled per sweep round
    pub sweep_sample_size: usize,

    /// Upper bound on rounds per shard per cycle
    pub sweep_max_rounds: usize,

    /// Messages buffered per pub/sub channel before slow subscribers lag
    pub pubsub_capacity: usize,

    pub group_delivery: GroupDelivery,
}

fn default_num_shards() -> usize {
    // One shard per core, min 1, max 16
    num_cpus::get().clamp(1, 16)
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_shards: default_num_shards(),
            initial_capacity: 1024,
            active_expiry: true,
            sweep_interval_ms: 100,
            sweep_sample_size: 20,
            sweep_max_rounds: 3,
            pubsub_capacity: 256,
            group_delivery: GroupDelivery::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_shards == 0 {
            return Err(ConfigError::Validation("num_shards must be > 0".into()));
        }
        if self.sweep_sample_size == 0 {
            return Err(ConfigError::Validation(
                "sweep_sample_size must be > 0".into(),
            ));
        }
        if self.sweep_max_rounds == 0 {
            return Err(ConfigError::Validation("sweep_max_rounds must be > 0".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "sweep_interval_ms must be > 0".into(),
            ));
        }
        if self.pubsub_capacity == 0 {
            return Err(ConfigError::Validation("pubsub_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

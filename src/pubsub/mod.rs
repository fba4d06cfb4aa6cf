//! Publish/subscribe broker
//!
//! Channels live outside the keyspace and are never persisted. Each channel
//! (or pattern) owns a bounded broadcast buffer; a subscriber that falls
//! more than the buffer capacity behind skips the messages it missed.
//! Publishing to a channel nobody listens on drops the message.

mod subscription;

pub use subscription::Subscription;

use crate::pattern::glob_match;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// A message delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel the message was published to
    pub channel: Bytes,

    /// Pattern that matched, for pattern subscriptions
    pub pattern: Option<Bytes>,

    pub payload: Bytes,
}

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Channel(Bytes),
    Pattern(Bytes),
}

type SenderMap = DashMap<Bytes, broadcast::Sender<Message>>;

/// Channel registry shared by every engine handle
pub struct Broker {
    /// Exact channel name -> sender
    channels: SenderMap,

    /// Glob pattern -> sender
    patterns: SenderMap,

    capacity: usize,
}

impl Broker {
    /// Create a broker whose channels buffer `capacity` messages each
    pub fn new(capacity: usize) -> Self {
        Broker {
            channels: DashMap::new(),
            patterns: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to an exact channel name
    pub fn subscribe(self: &Arc<Self>, channel: Bytes) -> Subscription {
        let receiver = self.attach(&self.channels, channel.clone());
        debug!("Subscribed to channel {:?}", channel);
        Subscription::new(Arc::clone(self), Target::Channel(channel), receiver)
    }

    /// Subscribe to every channel matching a glob pattern
    pub fn psubscribe(self: &Arc<Self>, pattern: Bytes) -> Subscription {
        let receiver = self.attach(&self.patterns, pattern.clone());
        debug!("Subscribed to pattern {:?}", pattern);
        Subscription::new(Arc::clone(self), Target::Pattern(pattern), receiver)
    }

    /// Publish a payload. Returns how many subscribers it was handed to.
    pub fn publish(&self, channel: Bytes, payload: Bytes) -> usize {
        let mut receivers = 0;

        if let Some(sender) = self.channels.get(&channel) {
            let message = Message {
                channel: channel.clone(),
                pattern: None,
                payload: payload.clone(),
            };
            // send fails only when every receiver is gone
            receivers += sender.send(message).unwrap_or(0);
        }

        for entry in self.patterns.iter() {
            if glob_match(entry.key(), &channel) {
                let message = Message {
                    channel: channel.clone(),
                    pattern: Some(entry.key().clone()),
                    payload: payload.clone(),
                };
                receivers += entry.value().send(message).unwrap_or(0);
            }
        }

        receivers
    }

    /// Number of subscribers on an exact channel
    pub fn subscriber_count(&self, channel: &[u8]) -> usize {
        self.channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Channels with at least one subscriber
    pub fn channels(&self) -> Vec<Bytes> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    fn attach(&self, map: &SenderMap, name: Bytes) -> broadcast::Receiver<Message> {
        // the entry guard is held while subscribing, so a concurrent
        // detach cannot remove the sender in between
        map.entry(name)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Forget a channel or pattern once its last receiver is gone
    pub(crate) fn detach(&self, target: &Target) {
        let (map, name) = match target {
            Target::Channel(name) => (&self.channels, name),
            Target::Pattern(name) => (&self.patterns, name),
        };
        map.remove_if(name, |_, sender| sender.receiver_count() == 0);
    }
}

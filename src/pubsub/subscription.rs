//! Subscriber handle

use super::{Broker, Message, Target};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::warn;

/// A live subscription to one channel or pattern
///
/// Messages published after the subscription was created are yielded by
/// [`recv`](Self::recv) in publish order. Dropping the handle unsubscribes.
pub struct Subscription {
    broker: Arc<Broker>,
    target: Target,
    receiver: Option<Receiver<Message>>,
}

impl Subscription {
    pub(crate) fn new(broker: Arc<Broker>, target: Target, receiver: Receiver<Message>) -> Self {
        Subscription {
            broker,
            target,
            receiver: Some(receiver),
        }
    }

    /// Channel name or pattern this subscription listens to
    pub fn topic(&self) -> &Bytes {
        match &self.target {
            Target::Channel(name) | Target::Pattern(name) => name,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.target, Target::Pattern(_))
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Wait for the next message
    ///
    /// Returns `None` once unsubscribed. Messages lost because this
    /// subscriber lagged behind the buffer are skipped with a warning.
    pub async fn recv(&mut self) -> Option<Message> {
        let topic = self.topic().clone();
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Subscriber on {:?} lagged, {} messages dropped", topic, missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered message without waiting
    pub fn try_recv(&mut self) -> Option<Message> {
        let topic = self.topic().clone();
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Subscriber on {:?} lagged, {} messages dropped", topic, missed);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving. Buffered messages are discarded; calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            drop(receiver);
            self.broker.detach(&self.target);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.target)
            .field("active", &self.is_active())
            .finish()
    }
}

//! Pipelines: batched, independent execution

use super::{execute, Command, Reply};
use crate::config::GroupDelivery;
use crate::error::Result;
use crate::keyspace::Keyspace;
use std::sync::Arc;
use tracing::debug;

/// A batch of commands run one after the other
///
/// Unlike a [`Transaction`](super::Transaction), each command is atomic on
/// its own and a failing command does not stop the ones after it.
pub struct Pipeline {
    keyspace: Arc<Keyspace>,
    delivery: GroupDelivery,
    queued: Vec<Command>,
}

impl Pipeline {
    pub(crate) fn new(keyspace: Arc<Keyspace>, delivery: GroupDelivery) -> Self {
        Pipeline {
            keyspace,
            delivery,
            queued: Vec::new(),
        }
    }

    /// Buffer a command
    pub fn queue(&mut self, command: Command) -> &mut Self {
        self.queued.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Run every command in submission order
    ///
    /// The result at index `i` belongs to the `i`-th queued command.
    pub fn run(self) -> Vec<Result<Reply>> {
        debug!("Running pipeline of {} commands", self.queued.len());
        let Pipeline {
            keyspace,
            delivery,
            queued,
        } = self;
        queued
            .into_iter()
            .map(|command| execute(&keyspace, delivery, command))
            .collect()
    }
}

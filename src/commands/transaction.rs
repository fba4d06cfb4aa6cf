//! Transactions (WATCH / MULTI / EXEC / DISCARD)
//!
//! Commands are buffered and applied together under the locks of every
//! shard they touch. Either all of them take effect or none do: a watched
//! key that changed, or any command failing, aborts the whole transaction.

use super::{Command, CommandContext, KeyScope, Reply};
use crate::config::GroupDelivery;
use crate::error::{Result, StoreError};
use crate::keyspace::Keyspace;
use crate::store::{Entry, MemoryStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State captured before applying, used to undo a failed transaction
enum Rollback {
    Keys(Vec<(Bytes, Option<Entry>)>),
    Stores(Vec<MemoryStore>),
}

impl Rollback {
    fn restore(self, ctx: &mut CommandContext<'_>) -> Result<()> {
        match self {
            Rollback::Keys(entries) => {
                for (key, entry) in entries {
                    ctx.restore(key, entry)?;
                }
            }
            Rollback::Stores(stores) => ctx.restore_all(stores),
        }
        Ok(())
    }
}

/// A buffered group of commands applied atomically by [`exec`](Self::exec)
pub struct Transaction {
    keyspace: Arc<Keyspace>,
    delivery: GroupDelivery,
    watched: Vec<(Bytes, Option<u64>)>,
    queued: Vec<Command>,
}

impl Transaction {
    pub(crate) fn new(keyspace: Arc<Keyspace>, delivery: GroupDelivery) -> Self {
        Transaction {
            keyspace,
            delivery,
            watched: Vec::new(),
            queued: Vec::new(),
        }
    }

    /// Watch keys: if any of them is written before `exec`, the transaction aborts
    pub fn watch<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        for key in keys {
            let key = key.into();
            let version = self.keyspace.shard_for(&key).lock().version(&key);
            self.watched.push((key, version));
        }
        self
    }

    /// Forget every watched key
    pub fn unwatch(&mut self) -> &mut Self {
        self.watched.clear();
        self
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

    /// Drop the buffered commands and watched keys
    pub fn discard(&mut self) {
        debug!("Transaction discarded with {} queued commands", self.queued.len());
        self.queued.clear();
        self.watched.clear();
    }

    /// Apply every buffered command atomically
    ///
    /// Returns one reply per command, in order. Fails with
    /// [`StoreError::TransactionAborted`] and leaves the keyspace untouched
    /// when a watched key changed or any command failed.
    pub fn exec(self) -> Result<Vec<Reply>> {
        let Transaction {
            keyspace,
            delivery,
            watched,
            queued,
        } = self;

        let mut scopes: Vec<KeyScope<'_>> = queued.iter().map(Command::keys).collect();
        scopes.push(KeyScope::Keys(watched.iter().map(|(key, _)| &key[..]).collect()));
        let whole = scopes.iter().any(|scope| matches!(scope, KeyScope::All));

        let mut touched: Vec<Bytes> = queued
            .iter()
            .filter(|command| command.is_write())
            .flat_map(|command| match command.keys() {
                KeyScope::Keys(keys) => keys,
                KeyScope::All => Vec::new(),
            })
            .map(Bytes::copy_from_slice)
            .collect();
        touched.sort();
        touched.dedup();

        let mut ctx = CommandContext::lock(&keyspace, &scopes, delivery);
        drop(scopes);

        for (key, version) in &watched {
            if ctx.version(key)? != *version {
                info!("Transaction aborted: watched key {:?} changed", key);
                return Err(StoreError::TransactionAborted);
            }
        }

        let rollback = if whole {
            Rollback::Stores(ctx.snapshot_all())
        } else {
            let mut entries = Vec::with_capacity(touched.len());
            for key in touched {
                let entry = ctx.snapshot(&key)?;
                entries.push((key, entry));
            }
            Rollback::Keys(entries)
        };

        let mut replies = Vec::with_capacity(queued.len());
        for command in queued {
            let name = command.name();
            match command.apply(&mut ctx) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    warn!("Transaction aborted by {}: {}", name, e);
                    rollback.restore(&mut ctx)?;
                    return Err(StoreError::TransactionAborted);
                }
            }
        }

        debug!("Transaction applied {} commands", replies.len());
        Ok(replies)
    }
}

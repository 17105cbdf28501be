use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use streamer_types::{BlockHash, Message};

use crate::api::{KvBatch, KvRead, KvStore};
use crate::error::StoreError;

#[derive(Default, Debug)]
struct StoreInner {
    messages: BTreeMap<u64, Message>,
    block_hashes: BTreeMap<u64, BlockHash>,
    count: u64,
    notarizer_submitted_pos: Option<u64>,
    notarizer_submitted_hash: Option<String>,
    notarizer_pending_positions: Vec<u64>,
}

/// Hermetic in-memory backend used by tests, mirroring the rollup store's
/// `Arc<Mutex<StoreInner>>` in-memory engine.
#[derive(Clone, Default)]
pub struct Store(Arc<Mutex<StoreInner>>);

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.0
            .lock()
            .map_err(|_| StoreError::Custom("in-memory store mutex poisoned".to_string()))
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("In-memory streamer store").finish()
    }
}

impl KvStore for Store {
    fn begin_read(&self) -> Result<Box<dyn KvRead>, StoreError> {
        Ok(Box::new(Snapshot {
            inner: self.inner()?.clone_for_read(),
        }))
    }

    fn begin_batch(&self) -> Result<Box<dyn KvBatch>, StoreError> {
        Ok(Box::new(Batch {
            store: self.clone(),
            staged: self.inner()?.clone_for_read(),
        }))
    }
}

impl StoreInner {
    fn clone_for_read(&self) -> StoreInner {
        StoreInner {
            messages: self.messages.clone(),
            block_hashes: self.block_hashes.clone(),
            count: self.count,
            notarizer_submitted_pos: self.notarizer_submitted_pos,
            notarizer_submitted_hash: self.notarizer_submitted_hash.clone(),
            notarizer_pending_positions: self.notarizer_pending_positions.clone(),
        }
    }
}

/// A consistent point-in-time read of the store, taken while holding the mutex
/// momentarily and then released — readers never block writers for longer than a copy.
struct Snapshot {
    inner: StoreInner,
}

impl Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot").finish()
    }
}

impl KvRead for Snapshot {
    fn message_count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.count)
    }

    fn get_message(&self, index: u64) -> Result<Option<Message>, StoreError> {
        Ok(self.inner.messages.get(&index).cloned())
    }

    fn get_block_hash(&self, index: u64) -> Result<Option<BlockHash>, StoreError> {
        Ok(self.inner.block_hashes.get(&index).copied())
    }

    fn notarizer_submitted_pos(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.notarizer_submitted_pos)
    }

    fn notarizer_submitted_hash(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.notarizer_submitted_hash.clone())
    }

    fn notarizer_pending_positions(&self) -> Result<Vec<u64>, StoreError> {
        Ok(self.inner.notarizer_pending_positions.clone())
    }
}

/// A write batch: mutations land in a staged copy and only reach the shared store on
/// `commit`, so a dropped batch leaves the store untouched.
struct Batch {
    store: Store,
    staged: StoreInner,
}

impl Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch").finish()
    }
}

impl KvRead for Batch {
    fn message_count(&self) -> Result<u64, StoreError> {
        Ok(self.staged.count)
    }

    fn get_message(&self, index: u64) -> Result<Option<Message>, StoreError> {
        Ok(self.staged.messages.get(&index).cloned())
    }

    fn get_block_hash(&self, index: u64) -> Result<Option<BlockHash>, StoreError> {
        Ok(self.staged.block_hashes.get(&index).copied())
    }

    fn notarizer_submitted_pos(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.staged.notarizer_submitted_pos)
    }

    fn notarizer_submitted_hash(&self) -> Result<Option<String>, StoreError> {
        Ok(self.staged.notarizer_submitted_hash.clone())
    }

    fn notarizer_pending_positions(&self) -> Result<Vec<u64>, StoreError> {
        Ok(self.staged.notarizer_pending_positions.clone())
    }
}

impl KvBatch for Batch {
    fn append_messages(
        &mut self,
        start_pos: u64,
        messages: &[(Message, Option<BlockHash>)],
    ) -> Result<(), StoreError> {
        for (offset, (message, hash)) in messages.iter().enumerate() {
            let index = start_pos + offset as u64;
            self.staged.messages.insert(index, message.clone());
            match hash {
                Some(hash) => {
                    self.staged.block_hashes.insert(index, *hash);
                }
                None => {
                    self.staged.block_hashes.remove(&index);
                }
            }
        }
        self.staged.count = start_pos + messages.len() as u64;
        Ok(())
    }

    fn truncate(&mut self, new_count: u64) -> Result<(), StoreError> {
        self.staged.messages.split_off(&new_count);
        self.staged.block_hashes.split_off(&new_count);
        self.staged.count = new_count;
        Ok(())
    }

    fn upgrade_message(&mut self, index: u64, message: &Message) -> Result<(), StoreError> {
        self.staged.messages.insert(index, message.clone());
        Ok(())
    }

    fn set_notarizer_state(
        &mut self,
        submitted_pos: Option<u64>,
        submitted_hash: Option<String>,
        pending_positions: &[u64],
    ) -> Result<(), StoreError> {
        self.staged.notarizer_submitted_pos = submitted_pos;
        self.staged.notarizer_submitted_hash = submitted_hash;
        self.staged.notarizer_pending_positions = pending_positions.to_vec();
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.store.inner()? = self.staged;
        Ok(())
    }
}

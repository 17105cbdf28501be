use std::fmt::Debug;

use streamer_types::{BlockHash, Message};

use crate::error::StoreError;

/// Read-only view over the message log and notarizer state. Implemented both by plain
/// read transactions and by in-flight write batches (a batch can always be read from).
pub trait KvRead: Debug + Send {
    fn message_count(&self) -> Result<u64, StoreError>;
    fn get_message(&self, index: u64) -> Result<Option<Message>, StoreError>;
    fn get_block_hash(&self, index: u64) -> Result<Option<BlockHash>, StoreError>;

    fn notarizer_submitted_pos(&self) -> Result<Option<u64>, StoreError>;
    fn notarizer_submitted_hash(&self) -> Result<Option<String>, StoreError>;
    fn notarizer_pending_positions(&self) -> Result<Vec<u64>, StoreError>;
}

/// A single read-write transaction. All mutations performed through a batch become
/// visible to other readers only once `commit` is called; dropping a batch without
/// committing discards every write made through it.
pub trait KvBatch: KvRead {
    /// Writes `(message, blockHash?)` pairs starting at `start_pos`, then sets
    /// `count = start_pos + messages.len()`. Caller must already hold the insertion lock
    /// and guarantee `start_pos` is either the current count or a count produced by a
    /// reorg earlier in this same batch.
    fn append_messages(
        &mut self,
        start_pos: u64,
        messages: &[(Message, Option<BlockHash>)],
    ) -> Result<(), StoreError>;

    /// Deletes every key `>= new_count` in both the message and block-hash spaces, then
    /// sets `count = new_count`.
    fn truncate(&mut self, new_count: u64) -> Result<(), StoreError>;

    /// Rewrites the message at `index` in place. Used only for the two compatible
    /// upgrades (batch-gas-cost back-fill, block-merkle justification back-fill) and for
    /// the notarizer's post-finality rewrite; never changes `count`.
    fn upgrade_message(&mut self, index: u64, message: &Message) -> Result<(), StoreError>;

    /// Atomically replaces all three notarizer scalars. Callers land this in the same
    /// batch as any accompanying log rewrite.
    fn set_notarizer_state(
        &mut self,
        submitted_pos: Option<u64>,
        submitted_hash: Option<String>,
        pending_positions: &[u64],
    ) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// The KV storage engine adapter: a typed interface over whichever underlying engine
/// backs it (in-memory for tests, libmdbx in production).
pub trait KvStore: Debug + Send + Sync {
    fn begin_read(&self) -> Result<Box<dyn KvRead>, StoreError>;
    fn begin_batch(&self) -> Result<Box<dyn KvBatch>, StoreError>;
}

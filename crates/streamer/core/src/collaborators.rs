//! Named interfaces for the components this crate treats as external collaborators
//! (§6 of the design doc): the execution engine, the broadcast server, the
//! sequencer-coordination lock service, the block validator, the L1 inbox/delayed
//! bridge, and the optional notarizer client. Every production node wires concrete
//! adapters to these; tests wire fakes.
//!
//! `async_trait` is used instead of native `async fn in trait` because these traits are
//! consumed as `Arc<dyn Trait>` throughout `IngestionController` and `ExecutionPump` —
//! the same reason the teacher's `StoreEngineL2` reaches for it.

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use streamer_types::{BlockHash, Message};

use crate::errors::StreamerError;

/// Result of feeding one message through the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestResult {
    pub block_hash: BlockHash,
}

/// The execution engine: authoritative consumer of the message log. Out of scope for
/// this crate's implementation, but its interface is load-bearing for the reorg and
/// execution-pump algorithms.
#[async_trait]
pub trait ExecutionEngine: Debug + Send + Sync {
    /// Index of the last message the engine has produced a block for.
    async fn head_message_number(&self) -> Result<u64, StreamerError>;

    /// Feeds message `pos` to the engine, optionally passing the next message along for
    /// 1-ahead prefetch. Never mutates the message log.
    async fn digest(
        &self,
        pos: u64,
        message: &Message,
        prefetch_next: Option<&Message>,
    ) -> Result<DigestResult, StreamerError>;

    /// The consistency root for a reorg: truncates its own state to `new_count`, then
    /// re-executes `new_messages`, optionally replaying `old_messages` bodies for
    /// messages that can be safely resequenced. Returns one result per `new_messages`
    /// entry, aligned by index.
    async fn reorg(
        &self,
        new_count: u64,
        new_messages: &[Message],
        old_messages: &[Message],
    ) -> Result<Vec<DigestResult>, StreamerError>;

    async fn result_at_pos(&self, pos: u64) -> Result<DigestResult, StreamerError>;

    /// Hint that confirmed messages now start at `pos`; lets the engine drop pricing
    /// caches for the region that is no longer speculative.
    async fn mark_feed_start(&self, pos: u64);
}

/// Best-effort downstream rebroadcast of computed results. Errors are logged by the
/// implementation, never propagated — callers in this crate never see a `Result` here.
#[async_trait]
pub trait BroadcastServer: Debug + Send + Sync {
    async fn broadcast(&self, start_pos: u64, items: &[(Message, BlockHash)]);
}

/// Sequencer-coordination lock service: answers "is this node allowed to sequence right
/// now" and records each sequenced message against that lock.
#[async_trait]
pub trait Coordinator: Debug + Send + Sync {
    async fn currently_chosen(&self) -> bool;

    /// May reject (e.g. because the lock was lost between the check and this call).
    async fn sequencing_message(&self, pos: u64, message: &Message) -> Result<(), StreamerError>;
}

/// The block validator, notified so it can follow reorgs.
#[async_trait]
pub trait Validator: Debug + Send + Sync {
    async fn reorg(&self, new_count: u64);
}

/// One delayed message as read back from L1, used by the reorg engine to re-verify a
/// displaced delayed message before resequencing it.
#[derive(Debug, Clone)]
pub struct DelayedLookup {
    pub after_inbox_acc: [u8; 32],
    pub message: Message,
}

/// L1 inbox reader / delayed-message bridge.
#[async_trait]
pub trait InboxReader: Debug + Send + Sync {
    /// Accumulator hash of the delayed inbox after consuming delayed message `seq`.
    async fn get_delayed_acc(&self, seq: u64) -> Result<[u8; 32], StreamerError>;

    async fn lookup_messages_in_range(
        &self,
        block_lo: u64,
        block_hi: u64,
    ) -> Result<Vec<DelayedLookup>, StreamerError>;

    /// Backfills the feed cache with anything the broadcaster missed while offline.
    async fn populate_feed_backlog(&self, broadcaster: &dyn BroadcastServer);
}

/// External notarization service ("the notarizer"). Optional; only consulted when
/// `NotarizerConfig::sovereign_sequencer_enabled` is set.
#[async_trait]
pub trait NotarizerClient: Debug + Send + Sync {
    async fn submit_transaction(&self, payload: Bytes, namespace: u64) -> Result<String, StreamerError>;

    /// Returns the block height the submitted transaction landed in.
    async fn fetch_transaction_by_hash(&self, handle: &str) -> Result<u64, StreamerError>;

    async fn fetch_header_by_height(&self, height: u64) -> Result<Bytes, StreamerError>;

    /// Returns `(proof, vid_common)` for the namespace at that height.
    async fn fetch_transactions_in_block(
        &self,
        height: u64,
        namespace: u64,
    ) -> Result<(Bytes, Bytes), StreamerError>;
}

//! Thin stub adapters for the collaborator traits `streamer_core` depends on (§6): the
//! execution engine, broadcast server, coordinator, validator, inbox reader, and
//! notarizer client are all out of scope for this crate (spec.md §1), so this process
//! wires the simplest adapters that satisfy the traits rather than leaving the
//! ingestion pipeline unable to run standalone. A real deployment replaces every one of
//! these with an adapter that actually talks to its collaborator.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use streamer_core::{BroadcastServer, Coordinator, DigestResult, ExecutionEngine};
use streamer_core::{DelayedLookup, InboxReader, NotarizerClient, StreamerError, Validator};
use streamer_types::{BlockHash, Message};
use tracing::{debug, info};

/// Computes a deterministic, non-cryptographic stand-in block hash from a message's
/// position and body length. Good enough to exercise the ingestion/pump pipeline
/// end-to-end without a real execution engine attached.
fn placeholder_hash(pos: u64, message: &Message) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&pos.to_be_bytes());
    bytes[8..16].copy_from_slice(&(message.body.len() as u64).to_be_bytes());
    BlockHash::from(bytes)
}

#[derive(Debug, Default)]
pub struct StubExecutionEngine {
    head: AtomicU64,
}

#[async_trait]
impl ExecutionEngine for StubExecutionEngine {
    async fn head_message_number(&self) -> Result<u64, StreamerError> {
        Ok(self.head.load(Ordering::Acquire))
    }

    async fn digest(
        &self,
        pos: u64,
        message: &Message,
        _prefetch_next: Option<&Message>,
    ) -> Result<DigestResult, StreamerError> {
        self.head.store(pos + 1, Ordering::Release);
        Ok(DigestResult {
            block_hash: placeholder_hash(pos, message),
        })
    }

    async fn reorg(
        &self,
        new_count: u64,
        new_messages: &[Message],
        _old_messages: &[Message],
    ) -> Result<Vec<DigestResult>, StreamerError> {
        self.head.store(new_count, Ordering::Release);
        let results = new_messages
            .iter()
            .enumerate()
            .map(|(offset, message)| DigestResult {
                block_hash: placeholder_hash(new_count + offset as u64, message),
            })
            .collect();
        Ok(results)
    }

    async fn result_at_pos(&self, pos: u64) -> Result<DigestResult, StreamerError> {
        Ok(DigestResult {
            block_hash: placeholder_hash(pos, &Message::new(None, 0, Bytes::new())),
        })
    }

    async fn mark_feed_start(&self, _pos: u64) {}
}

#[derive(Debug, Default)]
pub struct LoggingBroadcaster;

#[async_trait]
impl BroadcastServer for LoggingBroadcaster {
    async fn broadcast(&self, start_pos: u64, items: &[(Message, BlockHash)]) {
        debug!(start_pos, count = items.len(), "broadcasting computed results");
    }
}

/// Single-node coordinator: this process is always the chosen sequencer.
#[derive(Debug, Default)]
pub struct AlwaysChosenCoordinator;

#[async_trait]
impl Coordinator for AlwaysChosenCoordinator {
    async fn currently_chosen(&self) -> bool {
        true
    }

    async fn sequencing_message(&self, _pos: u64, _message: &Message) -> Result<(), StreamerError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingValidator;

#[async_trait]
impl Validator for LoggingValidator {
    async fn reorg(&self, new_count: u64) {
        info!(new_count, "validator notified of reorg");
    }
}

/// No delayed inbox attached; reports an empty range and never backfills the feed.
#[derive(Debug, Default)]
pub struct NoInboxReader;

#[async_trait]
impl InboxReader for NoInboxReader {
    async fn get_delayed_acc(&self, _seq: u64) -> Result<[u8; 32], StreamerError> {
        Ok([0u8; 32])
    }

    async fn lookup_messages_in_range(
        &self,
        _block_lo: u64,
        _block_hi: u64,
    ) -> Result<Vec<DelayedLookup>, StreamerError> {
        Ok(Vec::new())
    }

    async fn populate_feed_backlog(&self, _broadcaster: &dyn BroadcastServer) {}
}

/// Notarizer client stub; only ever called when `sovereignSequencerEnabled` is set, and
/// this adapter always reports "not yet final" so the bridge simply idles rather than
/// panicking when no real notarization service is configured.
#[derive(Debug, Default)]
pub struct UnavailableNotarizerClient;

#[async_trait]
impl NotarizerClient for UnavailableNotarizerClient {
    async fn submit_transaction(&self, _payload: Bytes, _namespace: u64) -> Result<String, StreamerError> {
        Err(StreamerError::Notarizer("no notarizer client configured".into()))
    }

    async fn fetch_transaction_by_hash(&self, _handle: &str) -> Result<u64, StreamerError> {
        Err(StreamerError::Notarizer("no notarizer client configured".into()))
    }

    async fn fetch_header_by_height(&self, _height: u64) -> Result<Bytes, StreamerError> {
        Err(StreamerError::Notarizer("no notarizer client configured".into()))
    }

    async fn fetch_transactions_in_block(
        &self,
        _height: u64,
        _namespace: u64,
    ) -> Result<(Bytes, Bytes), StreamerError> {
        Err(StreamerError::Notarizer("no notarizer client configured".into()))
    }
}

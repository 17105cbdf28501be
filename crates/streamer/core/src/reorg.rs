//! Reorg engine (§4.3): truncates the log to a shorter count, collecting the displaced
//! suffix for possible re-sequencing through the execution engine, which is the
//! consistency root across itself, the log, and the validator.
//!
//! `reorg` performs every suspend point (reading the displaced suffix, re-verifying
//! delayed messages against L1, calling the execution engine, broadcasting, notifying
//! the validator) *before* touching a `KvBatch`. The caller commits the truncate (and,
//! typically, an append of the new messages) in one batch afterwards — see the design
//! note against splitting a reorg across two batches.

use std::sync::Arc;

use streamer_storage::Store;
use streamer_types::{BlockHash, Message, ReorgConfig};
use tracing::error;

use crate::collaborators::{BroadcastServer, ExecutionEngine, InboxReader, Validator};
use crate::errors::StreamerError;

pub struct ReorgEngine {
    execution_engine: Arc<dyn ExecutionEngine>,
    broadcaster: Arc<dyn BroadcastServer>,
    validator: Option<Arc<dyn Validator>>,
    inbox_reader: Option<Arc<dyn InboxReader>>,
    config: ReorgConfig,
}

/// What a reorg actually did, beyond the log truncation the caller still owes: how many
/// of the new messages got a hash, and how many displaced messages were dropped by the
/// resequence-depth cap rather than genuinely rejected as invalid.
pub struct ReorgOutcome {
    /// `new_messages[i]` paired with the block hash the execution engine computed for
    /// it, ready to append at `new_count`.
    pub new_messages_with_hash: Vec<(Message, BlockHash)>,
    /// Displaced messages dropped purely because `maxReorgResequenceDepth` was
    /// exceeded — a data-loss event by policy (§7), surfaced here so a caller can wire
    /// up metrics without scraping logs.
    pub dropped_by_depth_cap: usize,
}

impl ReorgEngine {
    pub fn new(
        execution_engine: Arc<dyn ExecutionEngine>,
        broadcaster: Arc<dyn BroadcastServer>,
        validator: Option<Arc<dyn Validator>>,
        inbox_reader: Option<Arc<dyn InboxReader>>,
        config: ReorgConfig,
    ) -> Self {
        Self {
            execution_engine,
            broadcaster,
            validator,
            inbox_reader,
            config,
        }
    }

    /// Re-reads a displaced delayed message from L1 within its origin block (§4.3 step 3)
    /// and requires both the accumulator and the message body to match before the
    /// message is trusted for resequencing. `get_delayed_acc` gives the accumulator we
    /// already expect at `request_id`; `lookup_messages_in_range` re-fetches what L1
    /// currently has at the message's origin block, so a reorg on L1 itself (or any
    /// drift between what we stored and what's on chain now) shows up as a mismatch
    /// here even though both calls go through the same inbox reader.
    async fn reverify_delayed_message(
        &self,
        inbox: &dyn InboxReader,
        request_id: u64,
        message: &Message,
    ) -> bool {
        let Some(origin_block) = message.origin_block else {
            return false;
        };
        let Ok(expected_acc) = inbox.get_delayed_acc(request_id).await else {
            return false;
        };
        let Ok(lookups) = inbox.lookup_messages_in_range(origin_block, origin_block).await else {
            return false;
        };
        lookups
            .iter()
            .any(|l| l.after_inbox_acc == expected_acc && l.message.body == message.body)
    }

    /// Runs the reorg against `store`'s current state. Precondition: caller holds the
    /// insertion lock and `new_count > 0` (index 0 is never reorg'd away).
    ///
    /// `snap_sync_prev_delayed_read` overrides reading `M[new_count - 1]` for the
    /// baseline `DelayedMessagesRead`, used only at boot when snap-sync supplies it
    /// directly from config (§6 "Snap-sync bootstrap").
    pub async fn reorg(
        &self,
        store: &Store,
        new_count: u64,
        new_messages: Vec<Message>,
        snap_sync_prev_delayed_read: Option<u64>,
    ) -> Result<ReorgOutcome, StreamerError> {
        if new_count == 0 {
            return Err(StreamerError::InvariantViolation(
                "reorg target count must be > 0; index 0 is immutable".to_string(),
            ));
        }

        let current_count = store.message_count().await?;
        let mut prev_delayed_read = match snap_sync_prev_delayed_read {
            Some(v) => v,
            None => store
                .get_message(new_count - 1)
                .await
                .map(|m| m.delayed_messages_read)?,
        };

        let displaced_len = current_count.saturating_sub(new_count);
        let cap = match self.config.max_reorg_resequence_depth {
            d if d < 0 => usize::MAX,
            d => d as usize,
        };

        let mut old_messages = Vec::new();
        let mut dropped_by_depth_cap = 0usize;

        for offset in 0..displaced_len {
            if old_messages.len() >= cap {
                dropped_by_depth_cap += 1;
                continue;
            }

            let index = new_count + offset;
            let message = store.get_message(index).await?;

            if let Some(request_id) = message.request_id {
                let positioned_correctly =
                    request_id + 1 == message.delayed_messages_read && request_id == prev_delayed_read;

                let verified = if !positioned_correctly {
                    false
                } else if let Some(inbox) = &self.inbox_reader {
                    self.reverify_delayed_message(inbox.as_ref(), request_id, &message).await
                } else {
                    true
                };

                if !verified {
                    // Doesn't line up with the current delayed-message cursor, or L1
                    // re-verification (accumulator and/or body) failed: drop it from
                    // resequencing rather than replay a message the engine can no longer
                    // vouch for.
                    continue;
                }
                prev_delayed_read += 1;
            }

            old_messages.push(message);
        }

        if dropped_by_depth_cap > 0 {
            error!(
                dropped_by_depth_cap,
                cap, new_count, current_count, "reorg resequence depth exceeded, dropping displaced messages"
            );
        }

        let results = self
            .execution_engine
            .reorg(new_count, &new_messages, &old_messages)
            .await
            .map_err(|e| StreamerError::ExecutionEngineReorg(e.to_string()))?;

        if results.len() != new_messages.len() {
            return Err(StreamerError::ExecutionEngineReorg(format!(
                "execution engine returned {} results for {} new messages",
                results.len(),
                new_messages.len()
            )));
        }

        let new_messages_with_hash: Vec<(Message, BlockHash)> = new_messages
            .into_iter()
            .zip(results.into_iter().map(|r| r.block_hash))
            .collect();

        self.broadcaster
            .broadcast(new_count, &new_messages_with_hash)
            .await;

        if let Some(validator) = &self.validator {
            validator.reorg(new_count).await;
        }

        Ok(ReorgOutcome {
            new_messages_with_hash,
            dropped_by_depth_cap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DigestResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use streamer_storage::KvBatch;

    #[derive(Debug, Default)]
    struct FakeExecutionEngine {
        reorg_calls: Mutex<Vec<(u64, usize, usize)>>,
    }

    #[async_trait]
    impl ExecutionEngine for FakeExecutionEngine {
        async fn head_message_number(&self) -> Result<u64, StreamerError> {
            Ok(0)
        }

        async fn digest(
            &self,
            _pos: u64,
            _message: &Message,
            _prefetch_next: Option<&Message>,
        ) -> Result<DigestResult, StreamerError> {
            Ok(DigestResult {
                block_hash: BlockHash::zero(),
            })
        }

        async fn reorg(
            &self,
            new_count: u64,
            new_messages: &[Message],
            old_messages: &[Message],
        ) -> Result<Vec<DigestResult>, StreamerError> {
            self.reorg_calls
                .lock()
                .unwrap()
                .push((new_count, new_messages.len(), old_messages.len()));
            Ok(new_messages
                .iter()
                .map(|_| DigestResult {
                    block_hash: BlockHash::zero(),
                })
                .collect())
        }

        async fn result_at_pos(&self, _pos: u64) -> Result<DigestResult, StreamerError> {
            Ok(DigestResult {
                block_hash: BlockHash::zero(),
            })
        }

        async fn mark_feed_start(&self, _pos: u64) {}
    }

    #[derive(Debug, Default)]
    struct FakeBroadcaster;

    #[async_trait]
    impl BroadcastServer for FakeBroadcaster {
        async fn broadcast(&self, _start_pos: u64, _items: &[(Message, BlockHash)]) {}
    }

    fn msg(delayed: u64) -> Message {
        Message::new(None, delayed, Bytes::from_static(b"x"))
    }

    async fn populated_store(n: u64) -> Store {
        let store = Store::new_in_memory();
        let pairs: Vec<_> = (0..n).map(|i| (msg(i), None)).collect();
        store
            .write(move |batch| batch.append_messages(0, &pairs))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn resequence_depth_cap_drops_excess_displaced_messages() {
        let store = populated_store(10).await;
        let engine = Arc::new(FakeExecutionEngine::default());
        let reorg = ReorgEngine::new(
            engine.clone(),
            Arc::new(FakeBroadcaster),
            None,
            None,
            ReorgConfig {
                max_reorg_resequence_depth: 1,
            },
        );

        let outcome = reorg
            .reorg(&store, 5, vec![msg(5)], None)
            .await
            .expect("reorg");

        assert_eq!(outcome.dropped_by_depth_cap, 4);
        let calls = engine.reorg_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(5, 1, 1)]);
    }

    #[derive(Debug, Default)]
    struct FakeInboxReader {
        accs: std::collections::HashMap<u64, [u8; 32]>,
        lookups: std::collections::HashMap<(u64, u64), Vec<crate::collaborators::DelayedLookup>>,
    }

    #[async_trait]
    impl InboxReader for FakeInboxReader {
        async fn get_delayed_acc(&self, seq: u64) -> Result<[u8; 32], StreamerError> {
            self.accs
                .get(&seq)
                .copied()
                .ok_or_else(|| StreamerError::Custom("no accumulator for seq".to_string()))
        }

        async fn lookup_messages_in_range(
            &self,
            block_lo: u64,
            block_hi: u64,
        ) -> Result<Vec<crate::collaborators::DelayedLookup>, StreamerError> {
            Ok(self
                .lookups
                .get(&(block_lo, block_hi))
                .cloned()
                .unwrap_or_default())
        }

        async fn populate_feed_backlog(&self, _broadcaster: &dyn BroadcastServer) {}
    }

    fn delayed_msg(request_id: u64, delayed_messages_read: u64, origin_block: u64, body: &[u8]) -> Message {
        Message::new(Some(request_id), delayed_messages_read, Bytes::copy_from_slice(body))
            .with_origin_block(origin_block)
    }

    #[tokio::test]
    async fn displaced_delayed_message_resequences_when_l1_reverification_matches() {
        let store = Store::new_in_memory();
        let delayed = delayed_msg(0, 1, 100, b"d0");
        let pairs = vec![(msg(0), None), (delayed.clone(), None)];
        store.write(move |batch| batch.append_messages(0, &pairs)).await.unwrap();

        let engine = Arc::new(FakeExecutionEngine::default());
        let inbox = Arc::new(FakeInboxReader {
            accs: std::collections::HashMap::from([(0, [7u8; 32])]),
            lookups: std::collections::HashMap::from([(
                (100, 100),
                vec![crate::collaborators::DelayedLookup {
                    after_inbox_acc: [7u8; 32],
                    message: delayed.clone(),
                }],
            )]),
        });
        let reorg = ReorgEngine::new(
            engine.clone(),
            Arc::new(FakeBroadcaster),
            None,
            Some(inbox),
            ReorgConfig::default(),
        );

        reorg.reorg(&store, 1, vec![], None).await.expect("reorg");

        let calls = engine.reorg_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(1, 0, 1)], "delayed message was resequenced");
    }

    #[tokio::test]
    async fn displaced_delayed_message_is_dropped_when_l1_body_no_longer_matches() {
        let store = Store::new_in_memory();
        let delayed = delayed_msg(0, 1, 100, b"d0");
        let pairs = vec![(msg(0), None), (delayed.clone(), None)];
        store.write(move |batch| batch.append_messages(0, &pairs)).await.unwrap();

        let engine = Arc::new(FakeExecutionEngine::default());
        let inbox = Arc::new(FakeInboxReader {
            accs: std::collections::HashMap::from([(0, [7u8; 32])]),
            lookups: std::collections::HashMap::from([(
                (100, 100),
                vec![crate::collaborators::DelayedLookup {
                    after_inbox_acc: [7u8; 32],
                    message: delayed_msg(0, 1, 100, b"different-on-l1-now"),
                }],
            )]),
        });
        let reorg = ReorgEngine::new(
            engine.clone(),
            Arc::new(FakeBroadcaster),
            None,
            Some(inbox),
            ReorgConfig::default(),
        );

        reorg.reorg(&store, 1, vec![], None).await.expect("reorg");

        let calls = engine.reorg_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(1, 0, 0)], "mismatched body must not be resequenced");
    }

    #[tokio::test]
    async fn rejects_reorg_to_count_zero() {
        let store = populated_store(3).await;
        let engine = Arc::new(FakeExecutionEngine::default());
        let reorg = ReorgEngine::new(
            engine,
            Arc::new(FakeBroadcaster),
            None,
            None,
            ReorgConfig::default(),
        );

        let result = reorg.reorg(&store, 0, vec![], None).await;
        assert!(matches!(result, Err(StreamerError::InvariantViolation(_))));
    }
}

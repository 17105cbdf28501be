//! Ingestion controller (§4.4): the three entry points producers call —
//! `add_confirmed` (L1 inbox), `add_feed` (untrusted broadcast), and
//! `write_from_sequencer` (local sequencing) — and the orchestration that ties the
//! detector, feed cache, and reorg engine into one append pipeline.
//!
//! `add_confirmed` and the fall-through from `add_feed` share a single locked append
//! routine (`append_locked`): feed messages are, per §4.4.2 step 6, spliced into the log
//! exactly the way a confirmed run would be, once they're known not to diverge from
//! whatever is already stored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use streamer_storage::Store;
use streamer_types::{BlockHash, FeedCacheConfig, Message};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::warn;

use crate::collaborators::{BroadcastServer, Coordinator, DigestResult, ExecutionEngine};
use crate::detector::{self, DetectorOutcome};
use crate::errors::StreamerError;
use crate::feed_cache::FeedCache;
use crate::message_log::MessageLog;
use crate::notarizer::NotarizerBridge;
use crate::reorg::ReorgEngine;

pub struct IngestionController {
    log: MessageLog,
    reorg_engine: ReorgEngine,
    execution_engine: Arc<dyn ExecutionEngine>,
    broadcaster: Arc<dyn BroadcastServer>,
    coordinator: Arc<dyn Coordinator>,
    notarizer: Option<Arc<NotarizerBridge>>,
    insertion_mutex: Mutex<()>,
    reorg_mutex: Arc<RwLock<()>>,
    feed_cache: Mutex<FeedCache>,
    /// Published without the insertion lock so `feed_pending_count` has a lock-free fast
    /// path; re-checked under `feed_cache` whenever it reads nonzero (§4.5).
    feed_cache_len: AtomicU64,
    pump_notify: Arc<Notify>,
    feed_cache_config: FeedCacheConfig,
}

impl IngestionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        log: MessageLog,
        reorg_engine: ReorgEngine,
        execution_engine: Arc<dyn ExecutionEngine>,
        broadcaster: Arc<dyn BroadcastServer>,
        coordinator: Arc<dyn Coordinator>,
        notarizer: Option<Arc<NotarizerBridge>>,
        reorg_mutex: Arc<RwLock<()>>,
        pump_notify: Arc<Notify>,
        feed_cache_config: FeedCacheConfig,
    ) -> Self {
        Self {
            log,
            reorg_engine,
            execution_engine,
            broadcaster,
            coordinator,
            notarizer,
            insertion_mutex: Mutex::new(()),
            reorg_mutex,
            feed_cache: Mutex::new(FeedCache::default()),
            feed_cache_len: AtomicU64::new(0),
            pump_notify,
            feed_cache_config,
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Lock-free fast path per §4.5; re-checks under the feed-cache lock whenever the
    /// fast path reads nonzero, since the atomic is a hint, not a source of truth.
    pub async fn feed_pending_count(&self) -> u64 {
        if self.feed_cache_len.load(Ordering::Acquire) == 0 {
            return 0;
        }
        self.feed_cache.lock().await.len() as u64
    }

    async fn detect(&self, start_pos: u64, msgs: &[Message]) -> Result<DetectorOutcome, StreamerError> {
        let store = self.log.store().clone();
        let msgs = msgs.to_vec();
        Ok(store
            .read(move |txn| detector::count_duplicates(txn, start_pos, &msgs))
            .await?)
    }

    async fn apply_upgrades(&self, upgrades: Vec<(u64, Message)>) -> Result<(), StreamerError> {
        if upgrades.is_empty() {
            return Ok(());
        }
        self.log
            .store()
            .write(move |batch| {
                for (index, message) in &upgrades {
                    batch.upgrade_message(*index, message)?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Checks `[startPos - 1, …, startPos)` worth of delayed-message monotonicity and the
    /// `RequestId` / `DelayedMessagesRead` relationship across `pos`'s baseline and the
    /// run about to be appended (§4.4.1 step 6 / invariant in §3).
    async fn validate_run(&self, pos: u64, run: &[Message]) -> Result<(), StreamerError> {
        let mut prev_delayed = if pos > 0 {
            self.log.get(pos - 1).await?.delayed_messages_read
        } else {
            0
        };

        for message in run {
            if message.delayed_messages_read < prev_delayed
                || message.delayed_messages_read - prev_delayed > 1
            {
                return Err(StreamerError::InvariantViolation(format!(
                    "delayed-messages-read jumped from {prev_delayed} to {}",
                    message.delayed_messages_read
                )));
            }
            if let Some(request_id) = message.request_id {
                if request_id + 1 != message.delayed_messages_read {
                    return Err(StreamerError::InvariantViolation(format!(
                        "delayed message with request_id {request_id} must have delayed_messages_read = {}",
                        request_id + 1
                    )));
                }
            }
            prev_delayed = message.delayed_messages_read;
        }
        Ok(())
    }

    /// Confirmed L1 messages (§4.4.1).
    pub async fn add_confirmed(&self, start_pos: u64, msgs: Vec<Message>) -> Result<(), StreamerError> {
        if msgs.is_empty() {
            return Ok(());
        }

        // Step 1-2: fast dedup path under a shared reorg-lock hold. Compatible upgrades
        // are persisted even when the whole run turns out to already be present.
        {
            let _reorg_guard = self.reorg_mutex.read().await;
            let outcome = self.detect(start_pos, &msgs).await?;
            if !outcome.diverged && outcome.dup_count == msgs.len() {
                self.apply_upgrades(outcome.upgrades).await?;
                return Ok(());
            }
        }

        let _insertion_guard = self.insertion_mutex.lock().await;
        self.append_locked(start_pos, msgs).await
    }

    /// The shared append path (steps 3-10 of §4.4.1), reached directly by
    /// `add_confirmed` after taking the insertion lock, and by `add_feed`'s fall-through
    /// (§4.4.2 step 6) once a cached run is known not to diverge.
    ///
    /// Precondition: caller holds `insertion_mutex`.
    async fn append_locked(&self, start_pos: u64, msgs: Vec<Message>) -> Result<(), StreamerError> {
        let outcome = self.detect(start_pos, &msgs).await?;
        let mut upgrades = outcome.upgrades;
        let pos = start_pos + outcome.dup_count as u64;
        let mut remaining: Vec<Message> = msgs[outcome.dup_count..].to_vec();
        let confirmed_reorg = outcome.diverged;
        let confirmed_len = remaining.len();

        // Step 4: feed-cache integration. Only attempted when the confirmed run itself
        // didn't diverge — a divergence already needs its own reorg and must not be
        // muddied by speculative feed content.
        let mut cache_clear_len = 0usize;
        if !confirmed_reorg && confirmed_len > 0 {
            let append_end = pos + remaining.len() as u64;
            let cache = self.feed_cache.lock().await;
            if !cache.is_empty() && cache.start_pos() <= append_end && append_end <= cache.end_pos() {
                let tail = cache.tail_from(append_end);
                cache_clear_len = cache.len();
                drop(cache);
                remaining.extend(tail);
            }
        }

        // Step 5: classify the spliced tail (if any) against the stored log, without
        // write-back. A divergence here is feed-sourced and must never become a reorg —
        // abandon the spliced tail and keep the confirmed prefix (§9 open question (b)).
        // Under the cache's own invariant (non-empty runs always start at or after
        // `count`) the store can never already hold a spliced index, so this in
        // practice only fires if that invariant was violated upstream — kept as a
        // guard rather than an `unreachable!`, since the cost of checking is one
        // extra read and the alternative is silently corrupting the log.
        if cache_clear_len > 0 {
            let splice_start = pos + confirmed_len as u64;
            let splice = remaining[confirmed_len..].to_vec();
            let splice_outcome = self.detect(splice_start, &splice).await?;
            if splice_outcome.diverged {
                warn!(
                    splice_start,
                    "feed-sourced splice diverges from the log inside the confirmed path; dropping the spliced tail"
                );
                remaining.truncate(confirmed_len);
                cache_clear_len = 0;
            } else {
                upgrades.extend(splice_outcome.upgrades);
            }
        }

        // Step 6: delayed-message monotonicity / RequestId consistency.
        self.validate_run(pos, &remaining).await?;

        if confirmed_reorg {
            // Steps 4-8 (reorg branch): hold the reorg lock exclusively across the
            // execution-engine call and the combined truncate+append commit, per the
            // design note against splitting a reorg across two batches.
            let _reorg_guard = self.reorg_mutex.write().await;
            let reorg_outcome = self
                .reorg_engine
                .reorg(self.log.store(), pos, remaining, None)
                .await?;
            let pairs: Vec<(Message, Option<BlockHash>)> = reorg_outcome
                .new_messages_with_hash
                .into_iter()
                .map(|(m, h)| (m, Some(h)))
                .collect();
            self.log
                .store()
                .write(move |batch| {
                    batch.truncate(pos)?;
                    batch.append_messages(pos, &pairs)?;
                    for (index, message) in &upgrades {
                        batch.upgrade_message(*index, message)?;
                    }
                    Ok(())
                })
                .await?;
        } else {
            // Step 8: plain append. Block hashes are left unset; the execution pump
            // fills them in once it digests these messages.
            let pairs: Vec<(Message, Option<BlockHash>)> =
                remaining.into_iter().map(|m| (m, None)).collect();
            if !pairs.is_empty() || !upgrades.is_empty() {
                self.log
                    .store()
                    .write(move |batch| {
                        if !pairs.is_empty() {
                            batch.append_messages(pos, &pairs)?;
                        }
                        for (index, message) in &upgrades {
                            batch.upgrade_message(*index, message)?;
                        }
                        Ok(())
                    })
                    .await?;
            }
        }

        // Step 9: drop the consumed feed-cache prefix.
        if cache_clear_len > 0 {
            let mut cache = self.feed_cache.lock().await;
            cache.drop_prefix(cache_clear_len);
            self.feed_cache_len.store(cache.len() as u64, Ordering::Release);
        }

        // Step 10: wake the execution pump (coalescing, non-blocking).
        self.pump_notify.notify_one();
        Ok(())
    }

    /// Untrusted broadcast feed messages (§4.4.2). `start_pos` is `feed_msgs[0]`'s
    /// position; the caller is responsible for the feed source itself only ever handing
    /// over a contiguous, strictly-sequential run (a non-contiguous resumption surfaces
    /// as a `FeedSequenceGap` from the feed-cache merge below).
    pub async fn add_feed(&self, start_pos: u64, feed_msgs: Vec<Message>) -> Result<(), StreamerError> {
        if feed_msgs.is_empty() {
            return Ok(());
        }

        let _insertion_guard = self.insertion_mutex.lock().await;

        // Step 2: skip leading duplicates; a divergence is recorded but never mutates
        // the log directly.
        let outcome = self.detect(start_pos, &feed_msgs).await?;
        let feed_reorg = outcome.diverged;
        let pos = start_pos + outcome.dup_count as u64;
        let remaining = feed_msgs[outcome.dup_count..].to_vec();

        if remaining.is_empty() && !feed_reorg {
            return Ok(());
        }

        // Step 3: merge into the feed cache by the four position-based cases.
        let (active_reorg, cache_is_empty, cache_start, cache_messages) = {
            let mut cache = self.feed_cache.lock().await;
            let before_len = cache.len();
            let incoming_len = remaining.len();
            let accepted = cache.merge(
                pos,
                remaining,
                feed_reorg,
                self.feed_cache_config.max_broadcaster_queue_size,
            );
            self.feed_cache_len.store(cache.len() as u64, Ordering::Release);
            if !accepted {
                // `merge` only ever rejects a contiguous append that would exceed the
                // queue's capacity; it always succeeds (by replacing wholesale) on a
                // gap or jump. Distinct from `FeedSequenceGap`, which means a
                // non-contiguous run.
                return Err(StreamerError::FeedQueueFull {
                    capacity: self.feed_cache_config.max_broadcaster_queue_size,
                    len: before_len + incoming_len,
                });
            }
            (
                cache.active_reorg(),
                cache.is_empty(),
                cache.start_pos(),
                cache.messages().to_vec(),
            )
        };

        // Step 4: a reorg-tainted or empty cache waits for L1 to catch up.
        if active_reorg || cache_is_empty {
            return Ok(());
        }

        // Step 5: never append an isolated feed run the log can't anchor to.
        if cache_start > 0 && self.log.try_get(cache_start - 1).await?.is_none() {
            return Ok(());
        }

        // Step 6: fall through to the confirmed-append path with the cache's own
        // contents, letting it splice (and then clear) the whole cache into the log.
        self.append_locked(cache_start, cache_messages).await
    }

    /// Sequencer-local messages (§4.4.3).
    pub async fn write_from_sequencer(
        &self,
        pos: u64,
        msg: Message,
        result: DigestResult,
    ) -> Result<(), StreamerError> {
        if !self.coordinator.currently_chosen().await {
            return Err(StreamerError::RetrySequencer);
        }

        let Ok(_insertion_guard) = self.insertion_mutex.try_lock() else {
            return Err(StreamerError::SequencerInsertLockTaken);
        };

        let count = self.log.count().await?;
        if pos != count {
            return Err(StreamerError::InvariantViolation(format!(
                "writeFromSequencer pos {pos} != count {count}"
            )));
        }

        self.coordinator.sequencing_message(pos, &msg).await?;

        let pairs = vec![(msg.clone(), Some(result.block_hash))];
        self.log
            .store()
            .write(move |batch| batch.append_messages(pos, &pairs))
            .await?;

        self.broadcaster
            .broadcast(pos, &[(msg.clone(), result.block_hash)])
            .await;

        if let Some(notarizer) = self.notarizer.as_ref().filter(|n| n.enabled()) {
            notarizer.enqueue(pos).await?;
        }

        self.pump_notify.notify_one();
        Ok(())
    }

    /// Exposed so the execution pump and the process entry point can hint the engine
    /// about confirmed-region boundaries (§6: `markFeedStart`) without the ingestion
    /// controller otherwise depending on the pump's scheduling.
    pub fn execution_engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.execution_engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicBool;
    use streamer_storage::KvBatch;
    use streamer_types::{BlockMerkleJustification, ReorgConfig};

    #[derive(Debug, Default)]
    struct NullEngine;

    #[async_trait]
    impl ExecutionEngine for NullEngine {
        async fn head_message_number(&self) -> Result<u64, StreamerError> {
            Ok(0)
        }
        async fn digest(
            &self,
            _pos: u64,
            _message: &Message,
            _prefetch_next: Option<&Message>,
        ) -> Result<DigestResult, StreamerError> {
            Ok(DigestResult { block_hash: BlockHash::zero() })
        }
        async fn reorg(
            &self,
            _new_count: u64,
            new_messages: &[Message],
            _old_messages: &[Message],
        ) -> Result<Vec<DigestResult>, StreamerError> {
            Ok(new_messages.iter().map(|_| DigestResult { block_hash: BlockHash::zero() }).collect())
        }
        async fn result_at_pos(&self, _pos: u64) -> Result<DigestResult, StreamerError> {
            Ok(DigestResult { block_hash: BlockHash::zero() })
        }
        async fn mark_feed_start(&self, _pos: u64) {}
    }

    #[derive(Debug, Default)]
    struct NullBroadcaster;

    #[async_trait]
    impl BroadcastServer for NullBroadcaster {
        async fn broadcast(&self, _start_pos: u64, _items: &[(Message, BlockHash)]) {}
    }

    #[derive(Debug)]
    struct AlwaysChosenCoordinator {
        chosen: AtomicBool,
    }

    impl Default for AlwaysChosenCoordinator {
        fn default() -> Self {
            Self { chosen: AtomicBool::new(true) }
        }
    }

    #[async_trait]
    impl Coordinator for AlwaysChosenCoordinator {
        async fn currently_chosen(&self) -> bool {
            self.chosen.load(Ordering::Acquire)
        }
        async fn sequencing_message(&self, _pos: u64, _message: &Message) -> Result<(), StreamerError> {
            Ok(())
        }
    }

    fn msg(delayed: u64, body: &[u8]) -> Message {
        Message::new(None, delayed, Bytes::copy_from_slice(body))
    }

    fn controller() -> IngestionController {
        let store = Store::new_in_memory();
        let log = MessageLog::new(store);
        let execution_engine = Arc::new(NullEngine) as Arc<dyn ExecutionEngine>;
        let reorg_mutex = Arc::new(RwLock::new(()));
        let reorg_engine = ReorgEngine::new(
            execution_engine.clone(),
            Arc::new(NullBroadcaster),
            None,
            None,
            ReorgConfig::default(),
        );
        IngestionController::new(
            log,
            reorg_engine,
            execution_engine,
            Arc::new(NullBroadcaster),
            Arc::new(AlwaysChosenCoordinator::default()),
            None,
            reorg_mutex,
            Arc::new(Notify::new()),
            FeedCacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn fresh_init_then_append_three() {
        let controller = controller();
        let init = msg(0, b"init");
        let m1 = msg(1, b"m1");
        controller
            .add_confirmed(0, vec![init.clone(), m1.clone(), m1.clone()])
            .await
            .expect("append");

        assert_eq!(controller.log.count().await.unwrap(), 3);
        assert_eq!(controller.log.get(0).await.unwrap(), init);
        assert_eq!(controller.log.get(2).await.unwrap().delayed_messages_read, 1);
    }

    #[tokio::test]
    async fn dedup_on_replay_only_appends_new_tail() {
        let controller = controller();
        let init = msg(0, b"init");
        let m1 = msg(1, b"m1");
        let m2 = msg(2, b"m2");
        controller
            .add_confirmed(0, vec![init.clone(), m1.clone(), m1.clone()])
            .await
            .unwrap();

        controller
            .add_confirmed(0, vec![init, m1.clone(), m1, m2.clone()])
            .await
            .unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 4);
        assert_eq!(controller.log.get(3).await.unwrap(), m2);
    }

    #[tokio::test]
    async fn confirmed_reorg_truncates_then_appends() {
        let controller = controller();
        let init = msg(0, b"init");
        let m1 = msg(1, b"m1");
        let m2 = msg(2, b"m2");
        controller
            .add_confirmed(0, vec![init.clone(), m1.clone(), m1.clone(), m2.clone()])
            .await
            .unwrap();

        let m1_prime = msg(1, b"m1-prime");
        controller
            .add_confirmed(2, vec![m1_prime.clone(), m1_prime.clone()])
            .await
            .unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 4);
        assert_eq!(controller.log.get(2).await.unwrap(), m1_prime);
    }

    #[tokio::test]
    async fn delayed_jump_is_rejected() {
        let controller = controller();
        controller
            .add_confirmed(0, vec![msg(0, b"init")])
            .await
            .unwrap();

        let mut jump = msg(5, b"m5");
        jump.request_id = None;
        let result = controller.add_confirmed(1, vec![jump]).await;
        assert!(matches!(result, Err(StreamerError::InvariantViolation(_))));
        assert_eq!(controller.log.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn feed_ahead_of_l1_then_confirmed_splices_cache() {
        let controller = controller();
        controller
            .add_confirmed(0, vec![msg(0, b"init"), msg(1, b"m1"), msg(1, b"m1")])
            .await
            .unwrap();

        let feed_m2a = msg(2, b"m2a");
        let feed_m2b = msg(2, b"m2b");
        controller
            .add_feed(3, vec![feed_m2a.clone(), feed_m2b.clone()])
            .await
            .unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 3, "feed alone must not extend the confirmed log");
        assert_eq!(controller.feed_pending_count().await, 2);

        controller
            .add_confirmed(3, vec![feed_m2a.clone()])
            .await
            .unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 5, "confirming the first feed entry should splice in the rest of the cache");
        assert_eq!(controller.log.get(4).await.unwrap(), feed_m2b);
        assert_eq!(controller.feed_pending_count().await, 0);
    }

    #[tokio::test]
    async fn confirmed_data_wins_over_previously_committed_feed_data() {
        let controller = controller();
        controller
            .add_confirmed(0, vec![msg(0, b"init"), msg(1, b"m1")])
            .await
            .unwrap();

        let feed_wrong = msg(2, b"feed-wrong");
        controller.add_feed(2, vec![feed_wrong]).await.unwrap();
        assert_eq!(controller.feed_pending_count().await, 1);

        let confirmed_right = msg(2, b"confirmed-right");
        controller
            .add_confirmed(2, vec![confirmed_right.clone()])
            .await
            .unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 3);
        assert_eq!(controller.log.get(2).await.unwrap(), confirmed_right);
    }

    #[tokio::test]
    async fn resequence_depth_cap_scenario_six() {
        let store = Store::new_in_memory();
        let pairs: Vec<_> = (0..10u64).map(|i| (msg(i, format!("b{i}").as_bytes()), None)).collect();
        store.write(move |batch| batch.append_messages(0, &pairs)).await.unwrap();

        let log = MessageLog::new(store);
        let execution_engine = Arc::new(NullEngine) as Arc<dyn ExecutionEngine>;
        let reorg_mutex = Arc::new(RwLock::new(()));
        let reorg_engine = ReorgEngine::new(
            execution_engine.clone(),
            Arc::new(NullBroadcaster),
            None,
            None,
            ReorgConfig { max_reorg_resequence_depth: 1 },
        );
        let controller = IngestionController::new(
            log,
            reorg_engine,
            execution_engine,
            Arc::new(NullBroadcaster),
            Arc::new(AlwaysChosenCoordinator::default()),
            None,
            reorg_mutex,
            Arc::new(Notify::new()),
            FeedCacheConfig::default(),
        );

        let m_new = msg(5, b"m-new");
        controller.add_confirmed(5, vec![m_new.clone()]).await.unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 6);
        assert_eq!(controller.log.get(5).await.unwrap(), m_new);
    }

    #[tokio::test]
    async fn cache_upgrade_preserves_equality_with_no_reorg() {
        let controller = controller();
        let plain = msg(0, b"init");
        controller.add_confirmed(0, vec![plain.clone()]).await.unwrap();

        let mut justified = plain.clone();
        justified.block_merkle_justification = Some(BlockMerkleJustification {
            header: Bytes::from_static(b"h"),
            proof: Bytes::from_static(b"p"),
            vid_common: Bytes::from_static(b"v"),
        });

        controller.add_confirmed(0, vec![justified.clone()]).await.unwrap();

        assert_eq!(controller.log.count().await.unwrap(), 1, "upgrade must not append a new entry");
        assert_eq!(controller.log.get(0).await.unwrap(), justified);
    }

    #[tokio::test]
    async fn write_from_sequencer_requires_chosen_and_exact_position() {
        let controller = controller();
        let msg0 = msg(0, b"init");
        controller
            .write_from_sequencer(0, msg0.clone(), DigestResult { block_hash: BlockHash::zero() })
            .await
            .unwrap();

        let wrong_pos = controller
            .write_from_sequencer(5, msg(1, b"m5"), DigestResult { block_hash: BlockHash::zero() })
            .await;
        assert!(matches!(wrong_pos, Err(StreamerError::InvariantViolation(_))));
    }
}

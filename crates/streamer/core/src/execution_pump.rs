//! Execution pump (§4.6): the cooperative loop that feeds stored messages to the
//! execution engine one at a time, with one-message-ahead prefetch, and rebroadcasts
//! the computed block hash. Driven by a coalescing notifier (`tokio::sync::Notify`) plus
//! an idle delay, the same producer/consumer shape as the teacher's polling loops, just
//! without the `spawned_concurrency::GenServer` machinery this crate has no use for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use streamer_storage::Store;
use streamer_types::ExecutionPumpConfig;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collaborators::{BroadcastServer, ExecutionEngine};
use crate::errors::{FatalSender, StreamerError};
use crate::message_log::MessageLog;

pub struct ExecutionPump {
    log: MessageLog,
    execution_engine: Arc<dyn ExecutionEngine>,
    broadcaster: Arc<dyn BroadcastServer>,
    reorg_mutex: Arc<tokio::sync::RwLock<()>>,
    notify: Arc<Notify>,
    config: ExecutionPumpConfig,
    /// Count observed at the last failed digest attempt, so repeated failures while the
    /// log genuinely isn't advancing log at `debug` instead of spamming `warn`.
    last_failure_count: AtomicU64,
}

impl ExecutionPump {
    pub fn new(
        log: MessageLog,
        execution_engine: Arc<dyn ExecutionEngine>,
        broadcaster: Arc<dyn BroadcastServer>,
        reorg_mutex: Arc<tokio::sync::RwLock<()>>,
        notify: Arc<Notify>,
        config: ExecutionPumpConfig,
    ) -> Self {
        Self {
            log,
            execution_engine,
            broadcaster,
            reorg_mutex,
            notify,
            config,
            last_failure_count: AtomicU64::new(u64::MAX),
        }
    }

    /// Runs until `cancel` fires. Digest failures are logged inside `tick` and never
    /// stop the loop (§7: execution-digest failures are logged, never propagated); a
    /// failure to even read the log (`StreamerError::Store`) is a `Fatal`-kind
    /// condition and is reported on `fatal` instead, since it means the KV layer itself
    /// is unhealthy.
    pub async fn run(&self, cancel: CancellationToken, fatal: FatalSender) {
        let idle = Duration::from_millis(self.config.execute_message_loop_delay_ms);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(idle) => {}
            }

            loop {
                if cancel.is_cancelled() {
                    return;
                }
                match self.tick().await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err @ StreamerError::Store(_)) => {
                        let _ = fatal.send(err);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }
    }

    /// One iteration: digest exactly one message, if there is one ready. Returns
    /// `Ok(true)` when the caller should immediately call `tick` again (more messages
    /// are waiting), `Ok(false)` when there is nothing to do right now.
    pub async fn tick(&self) -> Result<bool, StreamerError> {
        let Ok(_reorg_guard) = self.reorg_mutex.try_read() else {
            // A reorg is in flight; give up this tick rather than block the loop.
            return Ok(false);
        };

        let count = self.log.count().await?;
        let head = self.execution_engine.head_message_number().await?;
        let pos = head + 1;

        if pos >= count {
            return Ok(false);
        }

        let (message, expected_hash) = self.log.get_with_hash(pos).await?;
        let prefetch_next = if pos + 1 < count {
            Some(self.log.get(pos + 1).await?)
        } else {
            None
        };

        let result = match self
            .execution_engine
            .digest(pos, &message, prefetch_next.as_ref())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                let last = self.last_failure_count.swap(count, Ordering::AcqRel);
                if last == count {
                    debug!(pos, %err, "execution digest failed, log hasn't advanced since last attempt");
                } else {
                    warn!(pos, %err, "execution digest failed");
                }
                return Err(err);
            }
        };

        if let Some(expected) = expected_hash {
            if expected != result.block_hash {
                warn!(
                    pos,
                    ?expected,
                    computed = ?result.block_hash,
                    "block hash mismatch between feed and execution engine"
                );
            }
        }

        self.broadcaster
            .broadcast(pos, &[(message, result.block_hash)])
            .await;

        Ok(pos + 1 < count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DigestResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicU64 as StdAtomicU64;
    use streamer_storage::KvBatch;

    #[derive(Debug, Default)]
    struct CountingEngine {
        head: StdAtomicU64,
        digests: StdAtomicU64,
    }

    #[async_trait]
    impl ExecutionEngine for CountingEngine {
        async fn head_message_number(&self) -> Result<u64, StreamerError> {
            Ok(self.head.load(Ordering::Acquire))
        }

        async fn digest(
            &self,
            pos: u64,
            _message: &streamer_types::Message,
            _prefetch_next: Option<&streamer_types::Message>,
        ) -> Result<crate::collaborators::DigestResult, StreamerError> {
            self.digests.fetch_add(1, Ordering::AcqRel);
            self.head.store(pos, Ordering::Release);
            Ok(DigestResult {
                block_hash: streamer_types::BlockHash::zero(),
            })
        }

        async fn reorg(
            &self,
            _new_count: u64,
            new_messages: &[streamer_types::Message],
            _old_messages: &[streamer_types::Message],
        ) -> Result<Vec<DigestResult>, StreamerError> {
            Ok(new_messages
                .iter()
                .map(|_| DigestResult {
                    block_hash: streamer_types::BlockHash::zero(),
                })
                .collect())
        }

        async fn result_at_pos(&self, _pos: u64) -> Result<DigestResult, StreamerError> {
            Ok(DigestResult {
                block_hash: streamer_types::BlockHash::zero(),
            })
        }

        async fn mark_feed_start(&self, _pos: u64) {}
    }

    #[derive(Debug, Default)]
    struct NullBroadcaster;

    #[async_trait]
    impl BroadcastServer for NullBroadcaster {
        async fn broadcast(&self, _start_pos: u64, _items: &[(streamer_types::Message, streamer_types::BlockHash)]) {}
    }

    fn msg() -> streamer_types::Message {
        streamer_types::Message::new(None, 0, Bytes::from_static(b"x"))
    }

    async fn pump_with(count: u64) -> (ExecutionPump, Arc<CountingEngine>) {
        let store = Store::new_in_memory();
        let pairs: Vec<_> = (0..count).map(|_| (msg(), None)).collect();
        store
            .write(move |batch| batch.append_messages(0, &pairs))
            .await
            .unwrap();

        let engine = Arc::new(CountingEngine::default());
        let pump = ExecutionPump::new(
            MessageLog::new(store),
            engine.clone(),
            Arc::new(NullBroadcaster),
            Arc::new(tokio::sync::RwLock::new(())),
            Arc::new(Notify::new()),
            ExecutionPumpConfig {
                execute_message_loop_delay_ms: 1,
            },
        );
        (pump, engine)
    }

    #[tokio::test]
    async fn ticks_through_every_pending_message_then_idles() {
        let (pump, engine) = pump_with(3).await;

        assert!(pump.tick().await.unwrap(), "messages 1,2 still pending");
        assert!(!pump.tick().await.unwrap(), "message 2 was the last one");
        assert_eq!(engine.digests.load(Ordering::Acquire), 2);
        assert!(!pump.tick().await.unwrap(), "nothing left, idles");
    }

    #[tokio::test]
    async fn yields_when_reorg_lock_is_held_exclusively() {
        let (pump, _engine) = pump_with(2).await;
        let _write_guard = pump.reorg_mutex.write().await;
        assert!(!pump.tick().await.unwrap());
    }
}

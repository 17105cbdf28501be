//! Notarizer bridge (§4.7, optional): submits sequencer-originated messages to an
//! external notarization service and later back-fills their finality proof as a
//! block-merkle justification. Two cooperative loops share `notarizer_state_mutex` and
//! exactly three persisted scalars — `submittedPos`, `submittedHash`,
//! `pendingPositions` — so a crash mid-cycle always resumes into either the old or the
//! new consistent state.
//!
//! The external handle is persisted RLP-encoded as a `String` (§9 open question (c)).
//! We keep that as-is: changing the wire/storage format here is exactly the kind of
//! incompatible drift the design doc warns reimplementers away from (see DESIGN.md).

use std::sync::Arc;

use streamer_storage::Store;
use streamer_types::{BlockMerkleJustification, NotarizerConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::NotarizerClient;
use crate::errors::StreamerError;
use crate::message_log::MessageLog;

pub struct NotarizerBridge {
    log: MessageLog,
    store: Store,
    client: Arc<dyn NotarizerClient>,
    state_mutex: Arc<Mutex<()>>,
    config: NotarizerConfig,
}

impl NotarizerBridge {
    pub fn new(
        log: MessageLog,
        store: Store,
        client: Arc<dyn NotarizerClient>,
        state_mutex: Arc<Mutex<()>>,
        config: NotarizerConfig,
    ) -> Self {
        Self {
            log,
            store,
            client,
            state_mutex,
            config,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.sovereign_sequencer_enabled
    }

    /// Enqueues `pos` for submission. Called by the ingestion controller right after a
    /// sequencer-local append of a notarizer-eligible message.
    pub async fn enqueue(&self, pos: u64) -> Result<(), StreamerError> {
        let _guard = self.state_mutex.lock().await;
        let mut pending = self.store.read(|txn| txn.notarizer_pending_positions()).await?;
        pending.push(pos);
        let submitted_pos = self.store.read(|txn| txn.notarizer_submitted_pos()).await?;
        let submitted_hash = self.store.read(|txn| txn.notarizer_submitted_hash()).await?;
        self.store
            .write(move |batch| {
                batch.set_notarizer_state(submitted_pos, submitted_hash, &pending)
            })
            .await?;
        Ok(())
    }

    /// Submit loop (`submitOne`): finalizes any outstanding submission first, then pops
    /// the next pending position and submits it. Returns `Ok(true)` if it submitted (or
    /// finalized) something and should be called again immediately.
    pub async fn submit_one(&self) -> Result<bool, StreamerError> {
        let _guard = self.state_mutex.lock().await;

        let submitted_pos = self.store.read(|txn| txn.notarizer_submitted_pos()).await?;
        if submitted_pos.is_some() {
            return self.finalize_locked().await;
        }

        let mut pending = self.store.read(|txn| txn.notarizer_pending_positions()).await?;
        let Some(head) = pending.first().copied() else {
            return Ok(false);
        };

        let message = self.log.get(head).await?;
        let handle = self
            .client
            .submit_transaction(message.body.clone(), self.config.espresso_namespace)
            .await?;

        pending.remove(0);
        let pending_clone = pending.clone();
        let handle_clone = handle.clone();
        self.store
            .write(move |batch| {
                batch.set_notarizer_state(Some(head), Some(handle_clone.clone()), &pending_clone)
            })
            .await?;

        info!(pos = head, %handle, "submitted message to notarizer");
        Ok(true)
    }

    /// Finalize step (`pollForFinality`): polls the notarizer for the outstanding
    /// submission's finality proof; once available, rewrites the stored message with
    /// the justification and clears the outstanding-submission scalars in the same
    /// batch. Returns `Ok(true)` ("done") once finalized, `Ok(false)` while still
    /// pending.
    async fn finalize_locked(&self) -> Result<bool, StreamerError> {
        let Some(pos) = self.store.read(|txn| txn.notarizer_submitted_pos()).await? else {
            return Ok(true);
        };
        let Some(handle) = self.store.read(|txn| txn.notarizer_submitted_hash()).await? else {
            return Ok(true);
        };

        let block_height = match self.client.fetch_transaction_by_hash(&handle).await {
            Ok(height) => height,
            Err(err) => {
                warn!(pos, %handle, %err, "notarizer transaction not yet final");
                return Ok(false);
            }
        };

        let header = self.client.fetch_header_by_height(block_height).await?;
        let (proof, vid_common) = self
            .client
            .fetch_transactions_in_block(block_height, self.config.espresso_namespace)
            .await?;

        let mut message = self.log.get(pos).await?;
        message.block_merkle_justification = Some(BlockMerkleJustification {
            header,
            proof,
            vid_common,
        });

        let pending = self.store.read(|txn| txn.notarizer_pending_positions()).await?;
        self.store
            .write(move |batch| {
                batch.upgrade_message(pos, &message)?;
                batch.set_notarizer_state(None, None, &pending)
            })
            .await?;

        info!(pos, "notarizer submission finalized");
        Ok(true)
    }

    /// Runs the submit loop until `cancel` fires, idling for
    /// `espresso_txns_polling_interval_ms` between empty iterations.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.config.sovereign_sequencer_enabled {
            return;
        }
        let idle = std::time::Duration::from_millis(self.config.espresso_txns_polling_interval_ms);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(idle) => {}
            }

            loop {
                if cancel.is_cancelled() {
                    return;
                }
                match self.submit_one().await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) => {
                        warn!(%err, "notarizer loop iteration failed");
                        break;
                    }
                }
            }
        }
    }
}

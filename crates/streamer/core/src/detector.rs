//! Duplicate/divergence detector (§4.2): walks an incoming run against the stored log
//! starting at `start_pos` and reports how much of it is already present, whether the
//! first differing message is a genuine divergence, and which stored entries should be
//! upgraded in place because the difference was only a compatible-upgrade cache field.
//!
//! The detector only reads (`KvRead`); it never acquires locks and never writes. The
//! two compatible-upgrade cases are enumerated explicitly rather than folded into one
//! generic "close enough" comparison, per the design doc's insistence that these are the
//! *only* permitted in-place mutations of a stored message.

use streamer_storage::{KvRead, StoreError};
use streamer_types::Message;

#[derive(Debug, Clone, Default)]
pub struct DetectorOutcome {
    /// How many leading messages of the incoming run are already present (byte-identical
    /// or compatible-upgrade equal) in the log.
    pub dup_count: usize,
    /// Whether the first non-duplicate message is a true divergence (as opposed to the
    /// incoming run simply running past the end of the stored log).
    pub diverged: bool,
    /// The stored message at the first differing index, when `diverged` is true.
    pub first_stored_differing: Option<Message>,
    /// `(index, message)` pairs the caller should persist via `KvBatch::upgrade_message`
    /// to back-fill a compatible-upgrade cache field. Populated regardless of whether
    /// the caller asked for write-back; it is the caller's choice whether to apply them.
    pub upgrades: Vec<(u64, Message)>,
}

/// Two messages agree on everything except the batch-gas-cost cache.
fn eq_ignoring_batch_gas_cost(stored: &Message, incoming: &Message) -> bool {
    let mut stored = stored.clone();
    let mut incoming = incoming.clone();
    stored.clear_batch_gas_cost();
    incoming.clear_batch_gas_cost();
    stored == incoming
}

/// Two messages agree on everything except the block-merkle justification.
fn eq_ignoring_justification(stored: &Message, incoming: &Message) -> bool {
    stored.request_id == incoming.request_id
        && stored.delayed_messages_read == incoming.delayed_messages_read
        && stored.body == incoming.body
        && stored.origin_block == incoming.origin_block
        && stored.batch_gas_cost == incoming.batch_gas_cost
}

pub fn count_duplicates(
    read: &dyn KvRead,
    start_pos: u64,
    incoming: &[Message],
) -> Result<DetectorOutcome, StoreError> {
    let mut upgrades = Vec::new();

    for (offset, incoming_msg) in incoming.iter().enumerate() {
        let index = start_pos + offset as u64;

        let Some(stored) = read.get_message(index)? else {
            return Ok(DetectorOutcome {
                dup_count: offset,
                diverged: false,
                first_stored_differing: None,
                upgrades,
            });
        };

        if stored == *incoming_msg {
            continue;
        }

        // Batch-gas-cost back-fill: equal once the cache is cleared on both sides.
        if eq_ignoring_batch_gas_cost(&stored, incoming_msg) {
            if incoming_msg.batch_gas_cost.is_some() {
                upgrades.push((index, incoming_msg.clone()));
            }
            continue;
        }

        // Block-merkle justification back-fill: stored lacks it, incoming carries it.
        if stored.block_merkle_justification.is_none()
            && incoming_msg.block_merkle_justification.is_some()
            && eq_ignoring_justification(&stored, incoming_msg)
        {
            upgrades.push((index, incoming_msg.clone()));
            continue;
        }

        return Ok(DetectorOutcome {
            dup_count: offset,
            diverged: true,
            first_stored_differing: Some(stored),
            upgrades,
        });
    }

    Ok(DetectorOutcome {
        dup_count: incoming.len(),
        diverged: false,
        first_stored_differing: None,
        upgrades,
    })
}

use bytes::Bytes;
use streamer_rlp::decode::RLPDecode;
use streamer_rlp::encode::RLPEncode;
use streamer_rlp::error::RLPDecodeError;
use streamer_rlp::structs::{Decoder, Encoder};

/// 32-byte digest computed by the execution engine for a single message, recorded
/// separately from the message body so that `get` and `getWithHash` can differ.
pub type BlockHash = ethereum_types::H256;

/// Proof bundle attached to a notarizer-routed message once finality is confirmed.
/// Back-filled in place by the notarizer bridge; its presence never changes a message's
/// semantic equality (see [`Message::semantically_eq`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockMerkleJustification {
    pub header: Bytes,
    pub proof: Bytes,
    pub vid_common: Bytes,
}

impl RLPEncode for BlockMerkleJustification {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.header)
            .encode_field(&self.proof)
            .encode_field(&self.vid_common)
            .finish();
    }
}

impl RLPDecode for BlockMerkleJustification {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (header, decoder) = decoder.decode_field("header")?;
        let (proof, decoder) = decoder.decode_field("proof")?;
        let (vid_common, decoder) = decoder.decode_field("vid_common")?;
        let rest = decoder.finish()?;
        Ok((
            Self {
                header,
                proof,
                vid_common,
            },
            rest,
        ))
    }
}

/// A single L2 message as stored in the message log.
///
/// `batch_gas_cost` and `block_merkle_justification` are cache fields: their presence or
/// absence does not by itself make two messages semantically different. Everything else
/// must match byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Delayed-inbox sequence number, if this message originated from the L1 delayed inbox.
    pub request_id: Option<u64>,
    /// Cumulative count of delayed-inbox messages consumed up to and including this one.
    pub delayed_messages_read: u64,
    /// Opaque L1/L2 payload body.
    pub body: Bytes,
    /// L1 block this message was read from, set for delayed-inbox messages; the reorg
    /// engine uses it to bound the `InboxReader::lookup_messages_in_range` query that
    /// re-verifies a displaced delayed message before resequencing it.
    pub origin_block: Option<u64>,
    /// Cached derived field; safe to drop and recompute.
    pub batch_gas_cost: Option<u64>,
    /// Back-filled once the notarizer finalizes this message.
    pub block_merkle_justification: Option<BlockMerkleJustification>,
}

impl Message {
    pub fn new(request_id: Option<u64>, delayed_messages_read: u64, body: Bytes) -> Self {
        Self {
            request_id,
            delayed_messages_read,
            body,
            origin_block: None,
            batch_gas_cost: None,
            block_merkle_justification: None,
        }
    }

    /// Records which L1 block this delayed message was read from, for later
    /// re-verification by the reorg engine.
    pub fn with_origin_block(mut self, origin_block: u64) -> Self {
        self.origin_block = Some(origin_block);
        self
    }

    /// Two messages are semantically equal iff they are byte-identical once the
    /// batch-gas-cost cache is cleared on both sides and, for notarized messages, an
    /// absent justification is treated as compatible with a present one. Only
    /// absent-on-stored/present-on-incoming is a compatible upgrade; the reverse (stored
    /// has it, incoming doesn't) is a true divergence, since it would mean losing
    /// already-confirmed finality evidence.
    pub fn semantically_eq(&self, other: &Self) -> bool {
        if self.request_id != other.request_id
            || self.delayed_messages_read != other.delayed_messages_read
            || self.body != other.body
            || self.origin_block != other.origin_block
        {
            return false;
        }

        match (&self.block_merkle_justification, &other.block_merkle_justification) {
            (Some(a), Some(b)) if a != b => false,
            (Some(_), None) => false,
            _ => true,
        }
    }

    /// Clears the batch-gas-cost cache, as done before comparing two stored forms or
    /// before persisting a record that must not carry a stale cache.
    pub fn clear_batch_gas_cost(&mut self) {
        self.batch_gas_cost = None;
    }

    pub fn has_richer_justification_than(&self, stored: &Self) -> bool {
        self.block_merkle_justification.is_some() && stored.block_merkle_justification.is_none()
    }
}

impl RLPEncode for Message {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.request_id)
            .encode_field(&self.delayed_messages_read)
            .encode_field(&self.body)
            .encode_field(&self.origin_block)
            .encode_field(&self.batch_gas_cost)
            .encode_field(&self.block_merkle_justification)
            .finish();
    }
}

impl RLPDecode for Message {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (request_id, decoder) = decoder.decode_field("request_id")?;
        let (delayed_messages_read, decoder) = decoder.decode_field("delayed_messages_read")?;
        let (body, decoder) = decoder.decode_field("body")?;
        let (origin_block, decoder) = decoder.decode_field("origin_block")?;
        let (batch_gas_cost, decoder) = decoder.decode_field("batch_gas_cost")?;
        let (block_merkle_justification, decoder) =
            decoder.decode_field("block_merkle_justification")?;
        let rest = decoder.finish()?;
        Ok((
            Self {
                request_id,
                delayed_messages_read,
                body,
                origin_block,
                batch_gas_cost,
                block_merkle_justification,
            },
            rest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(delayed: u64, body: &[u8]) -> Message {
        Message::new(None, delayed, Bytes::copy_from_slice(body))
    }

    #[test]
    fn round_trips_through_rlp() {
        let mut original = msg(1, b"hello");
        original.batch_gas_cost = Some(42);
        original.request_id = Some(7);

        let encoded = original.encode_to_vec();
        let decoded = Message::decode(&encoded).expect("decodes");

        assert_eq!(decoded, original);
    }

    #[test]
    fn batch_gas_cost_presence_does_not_affect_semantic_equality() {
        let plain = msg(1, b"hello");
        let mut cached = plain.clone();
        cached.batch_gas_cost = Some(123);

        assert!(plain.semantically_eq(&cached));
        assert!(cached.semantically_eq(&plain));
    }

    #[test]
    fn justification_backfill_is_compatible_but_not_reverse() {
        let bare = msg(1, b"hello");
        let mut justified = bare.clone();
        justified.block_merkle_justification = Some(BlockMerkleJustification {
            header: Bytes::from_static(b"h"),
            proof: Bytes::from_static(b"p"),
            vid_common: Bytes::from_static(b"v"),
        });

        assert!(bare.semantically_eq(&justified), "absent->present is compatible");
        assert!(
            !justified.semantically_eq(&bare),
            "present->absent must be a true divergence"
        );
    }

    #[test]
    fn differing_bodies_are_not_semantically_equal() {
        let a = msg(1, b"hello");
        let b = msg(1, b"world");
        assert!(!a.semantically_eq(&b));
    }
}

//! Feed cache (§4.5): the in-memory, unconfirmed run of broadcast messages sitting
//! ahead of the confirmed tip. Never persisted — it is pure input to the ingestion
//! controller, which is also the only thing that locks around it.

use streamer_types::Message;
use tracing::warn;

#[derive(Debug, Default, Clone)]
pub struct FeedCache {
    start_pos: u64,
    messages: Vec<Message>,
    active_reorg: bool,
}

impl FeedCache {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// One past the last cached index; equal to `start_pos` when empty.
    pub fn end_pos(&self) -> u64 {
        self.start_pos + self.messages.len() as u64
    }

    pub fn active_reorg(&self) -> bool {
        self.active_reorg
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages starting at or after `pos` (used when splicing the cache's tail onto a
    /// confirmed run that already covers `[start_pos, pos)`).
    pub fn tail_from(&self, pos: u64) -> Vec<Message> {
        if pos < self.start_pos {
            return self.messages.clone();
        }
        let skip = (pos - self.start_pos) as usize;
        self.messages.get(skip..).map(<[Message]>::to_vec).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.start_pos = 0;
        self.messages.clear();
        self.active_reorg = false;
    }

    pub fn replace(&mut self, start_pos: u64, messages: Vec<Message>, active_reorg: bool) {
        self.start_pos = start_pos;
        self.messages = messages;
        self.active_reorg = active_reorg;
    }

    /// Drops the first `n` cached messages (they have been consumed into the confirmed
    /// log). Clears the cache entirely if that consumes everything.
    pub fn drop_prefix(&mut self, n: usize) {
        if n >= self.messages.len() {
            self.clear();
            return;
        }
        self.messages.drain(..n);
        self.start_pos += n as u64;
    }

    /// Merges an incoming contiguous run into the cache per the four cases of §4.4.2
    /// step 3. Returns `true` if the incoming run was accepted (appended, replaced, or
    /// adopted), `false` if it was rejected outright (would exceed `max_size` on
    /// append).
    pub fn merge(
        &mut self,
        incoming_start: u64,
        incoming: Vec<Message>,
        feed_reorg_rising_edge: bool,
        max_size: usize,
    ) -> bool {
        if self.is_empty() || feed_reorg_rising_edge {
            self.replace(incoming_start, incoming, feed_reorg_rising_edge);
            return true;
        }

        if incoming_start <= self.start_pos {
            // Older-or-equal wins: an incoming run starting no later than what's cached
            // supersedes it outright.
            self.replace(incoming_start, incoming, self.active_reorg);
            return true;
        }

        if incoming_start == self.end_pos() {
            if max_size != 0 && self.messages.len() + incoming.len() > max_size {
                return false;
            }
            self.messages.extend(incoming);
            return true;
        }

        // Gap or jump: cached run and incoming run don't line up. Replace wholesale —
        // the cache would otherwise carry a silent hole.
        warn!(
            cached_start = self.start_pos,
            cached_end = self.end_pos(),
            incoming_start,
            "feed cache gap or jump, replacing cached run wholesale"
        );
        self.replace(incoming_start, incoming, self.active_reorg);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn msg(n: u64) -> Message {
        Message::new(None, 0, Bytes::from(vec![n as u8]))
    }

    #[test]
    fn append_extends_contiguous_run() {
        let mut cache = FeedCache::default();
        cache.replace(3, vec![msg(3), msg(4)], false);
        assert!(cache.merge(5, vec![msg(5)], false, 0));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.end_pos(), 6);
    }

    #[test]
    fn append_respects_max_size() {
        let mut cache = FeedCache::default();
        cache.replace(0, vec![msg(0)], false);
        assert!(!cache.merge(1, vec![msg(1), msg(2)], false, 2));
        assert_eq!(cache.len(), 1, "rejected append must not mutate the cache");
    }

    #[test]
    fn older_or_equal_start_replaces_cache() {
        let mut cache = FeedCache::default();
        cache.replace(5, vec![msg(5)], false);
        assert!(cache.merge(2, vec![msg(2), msg(3)], false, 0));
        assert_eq!(cache.start_pos(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn gap_replaces_cache_wholesale() {
        let mut cache = FeedCache::default();
        cache.replace(0, vec![msg(0)], false);
        assert!(cache.merge(10, vec![msg(10)], false, 0));
        assert_eq!(cache.start_pos(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drop_prefix_advances_start_pos() {
        let mut cache = FeedCache::default();
        cache.replace(0, vec![msg(0), msg(1), msg(2)], false);
        cache.drop_prefix(2);
        assert_eq!(cache.start_pos(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drop_prefix_past_end_clears() {
        let mut cache = FeedCache::default();
        cache.replace(0, vec![msg(0)], true);
        cache.drop_prefix(5);
        assert!(cache.is_empty());
        assert!(!cache.active_reorg());
    }
}

//! The canonical message log (§4.1): a thin, invariant-aware layer over
//! `streamer_storage::Store`. The KV adapter underneath already knows how to encode and
//! range-delete; this module is where the log's own preconditions live — `append` only
//! ever being called with a `start_pos` that is the current count (or a count a reorg
//! just produced), and `count` always being the source of truth for contiguity.

use streamer_storage::Store;
use streamer_types::{BlockHash, Message};

use crate::errors::StreamerError;

/// Handle to the durable message log. Cheap to clone (wraps a `Store`, itself
/// `Arc`-backed).
#[derive(Clone, Debug)]
pub struct MessageLog {
    store: Store,
}

impl MessageLog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn count(&self) -> Result<u64, StreamerError> {
        Ok(self.store.message_count().await?)
    }

    pub async fn get(&self, index: u64) -> Result<Message, StreamerError> {
        Ok(self.store.get_message(index).await?)
    }

    pub async fn get_with_hash(
        &self,
        index: u64,
    ) -> Result<(Message, Option<BlockHash>), StreamerError> {
        Ok(self.store.get_message_with_hash(index).await?)
    }

    pub async fn try_get(&self, index: u64) -> Result<Option<Message>, StreamerError> {
        match self.get(index).await {
            Ok(m) => Ok(Some(m)),
            Err(StreamerError::Store(streamer_storage::StoreError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

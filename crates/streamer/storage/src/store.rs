use std::path::Path;
use std::sync::Arc;

use streamer_types::{BlockHash, Message};
use tracing::info;

use crate::api::{KvBatch, KvRead, KvStore};
use crate::error::StoreError;
use crate::store_db::in_memory::Store as InMemoryStore;
use crate::store_db::libmdbx::Store as LibmdbxStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    Libmdbx,
}

/// Handle to the message log and notarizer state, backed by one of the engines in
/// `store_db`. Cloning is cheap; all engines are internally `Arc`-shared.
#[derive(Clone)]
pub struct Store {
    engine: Arc<dyn KvStore>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("engine", &self.engine).finish()
    }
}

impl Store {
    pub fn new_in_memory() -> Self {
        Self {
            engine: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn open(path: impl AsRef<Path>, engine_type: EngineType) -> Result<Self, StoreError> {
        info!(?engine_type, "opening streamer store");
        let engine: Arc<dyn KvStore> = match engine_type {
            EngineType::InMemory => Arc::new(InMemoryStore::new()),
            EngineType::Libmdbx => Arc::new(LibmdbxStore::new(path)?),
        };
        Ok(Self { engine })
    }

    /// Runs `f` against a read-only snapshot on a blocking thread.
    pub async fn read<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn KvRead) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || {
            let txn = engine.begin_read()?;
            f(txn.as_ref())
        })
        .await
        .map_err(|e| StoreError::Custom(format!("task panicked: {e}")))?
    }

    /// Runs `f` inside a single read-write batch on a blocking thread, committing only
    /// if `f` succeeds. Several logical steps (truncate, append, notarizer-state
    /// rewrite) land in one commit or none at all.
    pub async fn write<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn KvBatch) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || {
            let mut batch = engine.begin_batch()?;
            let result = f(batch.as_mut())?;
            batch.commit()?;
            Ok(result)
        })
        .await
        .map_err(|e| StoreError::Custom(format!("task panicked: {e}")))?
    }

    /// Opens a read-only snapshot directly on the calling thread, bypassing the
    /// `spawn_blocking` hop `read` uses. Handy for synchronous call sites (the detector
    /// takes a `&dyn KvRead` directly) and for tests.
    pub fn begin_read(&self) -> Result<Box<dyn KvRead>, StoreError> {
        self.engine.begin_read()
    }

    pub async fn message_count(&self) -> Result<u64, StoreError> {
        self.read(|txn| txn.message_count()).await
    }

    pub async fn get_message(&self, index: u64) -> Result<Message, StoreError> {
        self.read(move |txn| txn.get_message(index)?.ok_or(StoreError::NotFound))
            .await
    }

    pub async fn get_message_with_hash(
        &self,
        index: u64,
    ) -> Result<(Message, Option<BlockHash>), StoreError> {
        self.read(move |txn| {
            let message = txn.get_message(index)?.ok_or(StoreError::NotFound)?;
            let hash = txn.get_block_hash(index)?;
            Ok((message, hash))
        })
        .await
    }
}

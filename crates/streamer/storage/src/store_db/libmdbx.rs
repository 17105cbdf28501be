use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use libmdbx::orm::{Database, Table, Transaction};
use libmdbx::{DatabaseOptions, Mode, PageSize, RO, ReadWriteOptions, RW, table, table_info};
use streamer_types::{BlockHash, Message};

use crate::api::{KvBatch, KvRead, KvStore};
use crate::error::StoreError;
use crate::value::RlpValue;

type MessageRLP = RlpValue<Message>;
type BlockHashRLP = RlpValue<BlockHash>;
type PendingPositionsRLP = RlpValue<Vec<u64>>;
type HandleRLP = RlpValue<String>;

/// Fixed key under which the scalar notarizer fields and the message count are stored;
/// these tables only ever hold a single row.
const SCALAR_KEY: u64 = 0;

table!(
    /// message index -> RLP(message)
    ( Messages ) u64 => MessageRLP
);

table!(
    /// message index -> RLP(block hash), absent entries mean "not computed yet"
    ( BlockHashes ) u64 => BlockHashRLP
);

table!(
    /// single row holding the message count
    ( MessageCount ) u64 => u64
);

table!(
    /// single row: index of the currently outstanding notarized submission
    ( NotarizerSubmittedPos ) u64 => u64
);

table!(
    /// single row: opaque external transaction handle, RLP-encoded as a string
    ( NotarizerSubmittedHash ) u64 => HandleRLP
);

table!(
    /// single row: ordered indices awaiting notarizer submission
    ( NotarizerPendingPositions ) u64 => PendingPositionsRLP
);

/// libmdbx-backed store, the production engine for `cmd/streamer`.
pub struct Store {
    db: Arc<Database>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Libmdbx streamer store").finish()
    }
}

/// Default page size recommended by libmdbx.
const DB_PAGE_SIZE: usize = 4096;

impl Store {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let tables = [
            table_info!(Messages),
            table_info!(BlockHashes),
            table_info!(MessageCount),
            table_info!(NotarizerSubmittedPos),
            table_info!(NotarizerSubmittedHash),
            table_info!(NotarizerPendingPositions),
        ]
        .into_iter()
        .collect();

        let options = DatabaseOptions {
            page_size: Some(PageSize::Set(DB_PAGE_SIZE)),
            mode: Mode::ReadWrite(ReadWriteOptions {
                max_size: Some(1024_isize.pow(4)),
                ..Default::default()
            }),
            ..Default::default()
        };

        let db = Database::create_with_options(Some(path.as_ref().to_path_buf()), options, &tables)
            .map_err(StoreError::LibmdbxError)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for Store {
    fn begin_read(&self) -> Result<Box<dyn KvRead>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::LibmdbxError)?;
        Ok(Box::new(ReadTxn(txn)))
    }

    fn begin_batch(&self) -> Result<Box<dyn KvBatch>, StoreError> {
        let txn = self.db.begin_readwrite().map_err(StoreError::LibmdbxError)?;
        Ok(Box::new(WriteTxn(Some(txn))))
    }
}

fn read_message_count(txn: &Transaction<RO>) -> Result<u64, StoreError> {
    Ok(txn
        .get::<MessageCount>(SCALAR_KEY)
        .map_err(StoreError::LibmdbxError)?
        .unwrap_or(0))
}

fn read_message(txn: &Transaction<RO>, index: u64) -> Result<Option<Message>, StoreError> {
    txn.get::<Messages>(index)
        .map_err(StoreError::LibmdbxError)?
        .map(|rlp| rlp.decode())
        .transpose()
}

fn read_block_hash(txn: &Transaction<RO>, index: u64) -> Result<Option<BlockHash>, StoreError> {
    txn.get::<BlockHashes>(index)
        .map_err(StoreError::LibmdbxError)?
        .map(|rlp| rlp.decode())
        .transpose()
}

fn read_submitted_pos(txn: &Transaction<RO>) -> Result<Option<u64>, StoreError> {
    txn.get::<NotarizerSubmittedPos>(SCALAR_KEY)
        .map_err(StoreError::LibmdbxError)
}

fn read_submitted_hash(txn: &Transaction<RO>) -> Result<Option<String>, StoreError> {
    txn.get::<NotarizerSubmittedHash>(SCALAR_KEY)
        .map_err(StoreError::LibmdbxError)?
        .map(|rlp| rlp.decode())
        .transpose()
}

fn read_pending_positions(txn: &Transaction<RO>) -> Result<Vec<u64>, StoreError> {
    Ok(txn
        .get::<NotarizerPendingPositions>(SCALAR_KEY)
        .map_err(StoreError::LibmdbxError)?
        .map(|rlp| rlp.decode())
        .transpose()?
        .unwrap_or_default())
}

/// Deletes keys `>= key` assuming they are contiguous, mirroring the rollup store's
/// `delete_starting_at` range-deletion helper used for batch reverts.
fn delete_starting_at<T: Table<Key = u64>>(
    txn: &Transaction<RW>,
    mut key: u64,
) -> Result<(), StoreError> {
    while let Some(val) = txn.get::<T>(key).map_err(StoreError::LibmdbxError)? {
        txn.delete::<T>(key, Some(val))
            .map_err(StoreError::LibmdbxError)?;
        key += 1;
    }
    Ok(())
}

/// Deletes every present key in `[from, to)`, tolerating gaps. Unlike
/// `delete_starting_at`, this never stops at the first missing key — needed for the
/// block-hash space, which is sparse by design (absent means "not computed yet").
fn delete_range<T: Table<Key = u64>>(
    txn: &Transaction<RW>,
    from: u64,
    to: u64,
) -> Result<(), StoreError> {
    for key in from..to {
        if let Some(val) = txn.get::<T>(key).map_err(StoreError::LibmdbxError)? {
            txn.delete::<T>(key, Some(val))
                .map_err(StoreError::LibmdbxError)?;
        }
    }
    Ok(())
}

struct ReadTxn(Transaction<RO>);

impl Debug for ReadTxn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTxn").finish()
    }
}

impl KvRead for ReadTxn {
    fn message_count(&self) -> Result<u64, StoreError> {
        read_message_count(&self.0)
    }

    fn get_message(&self, index: u64) -> Result<Option<Message>, StoreError> {
        read_message(&self.0, index)
    }

    fn get_block_hash(&self, index: u64) -> Result<Option<BlockHash>, StoreError> {
        read_block_hash(&self.0, index)
    }

    fn notarizer_submitted_pos(&self) -> Result<Option<u64>, StoreError> {
        read_submitted_pos(&self.0)
    }

    fn notarizer_submitted_hash(&self) -> Result<Option<String>, StoreError> {
        read_submitted_hash(&self.0)
    }

    fn notarizer_pending_positions(&self) -> Result<Vec<u64>, StoreError> {
        read_pending_positions(&self.0)
    }
}

/// Wraps the transaction in an `Option` only so `commit` (which takes `Transaction<RW>`
/// by value) can move it out of a `Box<dyn KvBatch>` received by mutable reference.
struct WriteTxn(Option<Transaction<RW>>);

impl WriteTxn {
    fn txn(&self) -> &Transaction<RW> {
        self.0.as_ref().expect("write batch used after commit")
    }
}

impl Debug for WriteTxn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTxn").finish()
    }
}

impl KvRead for WriteTxn {
    fn message_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .txn()
            .get::<MessageCount>(SCALAR_KEY)
            .map_err(StoreError::LibmdbxError)?
            .unwrap_or(0))
    }

    fn get_message(&self, index: u64) -> Result<Option<Message>, StoreError> {
        self.txn()
            .get::<Messages>(index)
            .map_err(StoreError::LibmdbxError)?
            .map(|rlp| rlp.decode())
            .transpose()
    }

    fn get_block_hash(&self, index: u64) -> Result<Option<BlockHash>, StoreError> {
        self.txn()
            .get::<BlockHashes>(index)
            .map_err(StoreError::LibmdbxError)?
            .map(|rlp| rlp.decode())
            .transpose()
    }

    fn notarizer_submitted_pos(&self) -> Result<Option<u64>, StoreError> {
        self.txn()
            .get::<NotarizerSubmittedPos>(SCALAR_KEY)
            .map_err(StoreError::LibmdbxError)
    }

    fn notarizer_submitted_hash(&self) -> Result<Option<String>, StoreError> {
        self.txn()
            .get::<NotarizerSubmittedHash>(SCALAR_KEY)
            .map_err(StoreError::LibmdbxError)?
            .map(|rlp| rlp.decode())
            .transpose()
    }

    fn notarizer_pending_positions(&self) -> Result<Vec<u64>, StoreError> {
        Ok(self
            .txn()
            .get::<NotarizerPendingPositions>(SCALAR_KEY)
            .map_err(StoreError::LibmdbxError)?
            .map(|rlp| rlp.decode())
            .transpose()?
            .unwrap_or_default())
    }
}

impl KvBatch for WriteTxn {
    fn append_messages(
        &mut self,
        start_pos: u64,
        messages: &[(Message, Option<BlockHash>)],
    ) -> Result<(), StoreError> {
        let txn = self.txn();
        for (offset, (message, hash)) in messages.iter().enumerate() {
            let index = start_pos + offset as u64;
            txn.upsert::<Messages>(index, message.clone().into())
                .map_err(StoreError::LibmdbxError)?;
            match hash {
                Some(hash) => {
                    txn.upsert::<BlockHashes>(index, (*hash).into())
                        .map_err(StoreError::LibmdbxError)?;
                }
                None => {
                    txn.delete::<BlockHashes>(index, None)
                        .map_err(StoreError::LibmdbxError)?;
                }
            }
        }
        txn.upsert::<MessageCount>(SCALAR_KEY, start_pos + messages.len() as u64)
            .map_err(StoreError::LibmdbxError)?;
        Ok(())
    }

    fn truncate(&mut self, new_count: u64) -> Result<(), StoreError> {
        let old_count = self.message_count()?;
        let txn = self.txn();
        delete_starting_at::<Messages>(txn, new_count)?;
        // BlockHashes is sparse (an absent entry means "not computed yet"), so a
        // missing key at or above `new_count` must not stop the delete early — walk
        // the whole pre-truncation range instead.
        delete_range::<BlockHashes>(txn, new_count, old_count)?;
        txn.upsert::<MessageCount>(SCALAR_KEY, new_count)
            .map_err(StoreError::LibmdbxError)?;
        Ok(())
    }

    fn upgrade_message(&mut self, index: u64, message: &Message) -> Result<(), StoreError> {
        self.txn()
            .upsert::<Messages>(index, message.clone().into())
            .map_err(StoreError::LibmdbxError)
    }

    fn set_notarizer_state(
        &mut self,
        submitted_pos: Option<u64>,
        submitted_hash: Option<String>,
        pending_positions: &[u64],
    ) -> Result<(), StoreError> {
        let txn = self.txn();
        match submitted_pos {
            Some(pos) => txn
                .upsert::<NotarizerSubmittedPos>(SCALAR_KEY, pos)
                .map_err(StoreError::LibmdbxError)?,
            None => txn
                .delete::<NotarizerSubmittedPos>(SCALAR_KEY, None)
                .map(|_| ())
                .map_err(StoreError::LibmdbxError)?,
        }
        match submitted_hash {
            Some(hash) => txn
                .upsert::<NotarizerSubmittedHash>(SCALAR_KEY, hash.into())
                .map_err(StoreError::LibmdbxError)?,
            None => txn
                .delete::<NotarizerSubmittedHash>(SCALAR_KEY, None)
                .map(|_| ())
                .map_err(StoreError::LibmdbxError)?,
        }
        txn.upsert::<NotarizerPendingPositions>(
            SCALAR_KEY,
            pending_positions.to_vec().into(),
        )
        .map_err(StoreError::LibmdbxError)?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let txn = self.0.take().expect("write batch used after commit");
        txn.commit().map_err(StoreError::LibmdbxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use streamer_types::Message;

    fn msg(delayed: u64) -> Message {
        Message::new(None, delayed, Bytes::from_static(b"x"))
    }

    #[test]
    fn append_and_truncate_persist_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let store = Store::new(dir.path()).expect("open");
            let mut batch = store.begin_batch().expect("batch");
            batch
                .append_messages(0, &[(msg(0), None), (msg(1), None), (msg(1), None)])
                .expect("append");
            batch.commit().expect("commit");
        }

        let store = Store::new(dir.path()).expect("reopen");
        let read = store.begin_read().expect("read");
        assert_eq!(read.message_count().unwrap(), 3);
        assert_eq!(read.get_message(2).unwrap().unwrap().delayed_messages_read, 1);

        let mut batch = store.begin_batch().expect("batch");
        batch.truncate(1).expect("truncate");
        batch.commit().expect("commit");

        let read = store.begin_read().expect("read");
        assert_eq!(read.message_count().unwrap(), 1);
        assert!(read.get_message(1).unwrap().is_none());
    }

    #[test]
    fn truncate_deletes_sparse_block_hashes_past_a_gap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path()).expect("open");

        // Indices 0,1,2 get hashes; 3 is appended with no hash (a real gap); 4 gets a
        // hash again in a later batch, above the gap.
        let mut batch = store.begin_batch().expect("batch");
        batch
            .append_messages(
                0,
                &[
                    (msg(0), Some(BlockHash::zero())),
                    (msg(0), Some(BlockHash::zero())),
                    (msg(0), Some(BlockHash::zero())),
                ],
            )
            .expect("append 0..3");
        batch.commit().expect("commit");

        let mut batch = store.begin_batch().expect("batch");
        batch.append_messages(3, &[(msg(0), None)]).expect("append 3");
        batch.commit().expect("commit");

        let mut batch = store.begin_batch().expect("batch");
        batch
            .append_messages(4, &[(msg(0), Some(BlockHash::zero()))])
            .expect("append 4");
        batch.commit().expect("commit");

        let read = store.begin_read().expect("read");
        assert!(read.get_block_hash(4).unwrap().is_some(), "precondition: hash at 4 exists");

        let mut batch = store.begin_batch().expect("batch");
        batch.truncate(2).expect("truncate");
        batch.commit().expect("commit");

        let read = store.begin_read().expect("read");
        assert!(read.get_block_hash(2).unwrap().is_none());
        assert!(read.get_block_hash(3).unwrap().is_none());
        assert!(
            read.get_block_hash(4).unwrap().is_none(),
            "hash past the gap must not survive truncate"
        );
    }

    #[test]
    fn notarizer_scalars_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path()).expect("open");

        let mut batch = store.begin_batch().expect("batch");
        batch
            .set_notarizer_state(Some(3), Some("0xhandle".to_string()), &[4, 5, 6])
            .expect("set state");
        batch.commit().expect("commit");

        let read = store.begin_read().expect("read");
        assert_eq!(read.notarizer_submitted_pos().unwrap(), Some(3));
        assert_eq!(read.notarizer_submitted_hash().unwrap().as_deref(), Some("0xhandle"));
        assert_eq!(read.notarizer_pending_positions().unwrap(), vec![4, 5, 6]);
    }
}

/// Errors raised by the KV storage adapter, kept separate from `streamer-core`'s
/// `StreamerError` the same way `ethrex_storage_rollup` separates `StoreError` from the
/// sequencer's own error enums.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("entry not found")]
    NotFound,
    #[error("libmdbx error: {0}")]
    LibmdbxError(#[from] libmdbx::Error),
    #[error("rlp decode error: {0}")]
    RlpDecode(#[from] streamer_rlp::error::RLPDecodeError),
    #[error("{0}")]
    Custom(String),
}

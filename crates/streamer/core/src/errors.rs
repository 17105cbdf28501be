use streamer_storage::StoreError;

/// Errors raised by the ingestion controller, reorg engine, and the two pump loops.
/// Mirrors the error-kind table in the streamer's design doc: `NotFound` and
/// `InvariantViolation` travel as variants here, `Divergence` never escapes the detector
/// (it becomes a `ReorgEngine` call internally), and `Fatal` is not its own variant —
/// fatal conditions are reported on a side channel (see [`FatalSender`]) rather than
/// threaded through every caller's `Result`.
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("not currently the chosen sequencer, retry")]
    RetrySequencer,

    #[error("insertion lock is already held, retry")]
    SequencerInsertLockTaken,

    #[error("feed sequence gap: expected {expected}, got {got}")]
    FeedSequenceGap { expected: u64, got: u64 },

    #[error("feed cache queue full: {len} messages at capacity {capacity}")]
    FeedQueueFull { capacity: usize, len: usize },

    #[error("sequencer coordinator rejected this message: {0}")]
    CoordinatorRejected(String),

    #[error("execution engine reorg failed: {0}")]
    ExecutionEngineReorg(String),

    #[error("execution engine digest failed: {0}")]
    ExecutionEngineDigest(String),

    #[error("notarizer error: {0}")]
    Notarizer(String),

    #[error("{0}")]
    Custom(String),
}

/// A `Fatal`-kind error is handed to a dedicated channel rather than returned, the way a
/// crashed loop in the teacher's sequencer is surfaced through `SequencerError` to the
/// process's top-level join rather than retried silently.
pub type FatalSender = tokio::sync::mpsc::UnboundedSender<StreamerError>;
pub type FatalReceiver = tokio::sync::mpsc::UnboundedReceiver<StreamerError>;

pub fn fatal_channel() -> (FatalSender, FatalReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

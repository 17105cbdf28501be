//! Ordered, persistent message ingestion for the transaction streamer: the canonical
//! message log, duplicate/divergence detection, reorg handling, the feed cache, and the
//! two pump loops that drive an execution engine and (optionally) a notarizer. See
//! DESIGN.md at the workspace root for how each module maps onto its source material.

pub mod collaborators;
pub mod detector;
pub mod errors;
pub mod execution_pump;
pub mod feed_cache;
pub mod ingestion;
pub mod message_log;
pub mod notarizer;
pub mod reorg;

pub use collaborators::{
    BroadcastServer, Coordinator, DelayedLookup, DigestResult, ExecutionEngine, InboxReader,
    NotarizerClient, Validator,
};
pub use errors::{fatal_channel, FatalReceiver, FatalSender, StreamerError};
pub use execution_pump::ExecutionPump;
pub use feed_cache::FeedCache;
pub use ingestion::IngestionController;
pub use message_log::MessageLog;
pub use notarizer::NotarizerBridge;
pub use reorg::{ReorgEngine, ReorgOutcome};

pub mod config;
pub mod message;

pub use config::{
    ExecutionPumpConfig, FeedCacheConfig, NotarizerConfig, ReorgConfig, StreamerConfig,
};
pub use message::{BlockHash, BlockMerkleJustification, Message};

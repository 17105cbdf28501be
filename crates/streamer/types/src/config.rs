use serde::Deserialize;

/// Cap on displaced suffix messages collected during a reorg. `-1` means unlimited,
/// `0` means never resequence (reorgs beyond the current tip just drop the suffix).
pub const RESEQUENCE_DEPTH_UNLIMITED: i64 = -1;

fn envy_load<T: for<'de> Deserialize<'de> + Default>(prefix: &str) -> T {
    match envy::prefixed(prefix).from_env::<T>() {
        Ok(config) => config,
        Err(envy::Error::MissingValue(_)) => T::default(),
        Err(err) => {
            tracing::warn!(%prefix, %err, "failed to parse streamer config from environment, using defaults");
            T::default()
        }
    }
}

/// Config knobs for the execution pump's polling loop (`executeMessageLoopDelay`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExecutionPumpConfig {
    /// Idle delay, in milliseconds, when there is no new message to digest.
    pub execute_message_loop_delay_ms: u64,
}

impl Default for ExecutionPumpConfig {
    fn default() -> Self {
        Self {
            execute_message_loop_delay_ms: 100,
        }
    }
}

/// Config knobs for the in-memory feed cache (`maxBroadcasterQueueSize`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeedCacheConfig {
    /// Maximum number of buffered feed messages; 0 means unbounded.
    pub max_broadcaster_queue_size: usize,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            max_broadcaster_queue_size: 0,
        }
    }
}

/// Config knobs for the reorg engine (`maxReorgResequenceDepth`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReorgConfig {
    /// `-1` unlimited, `0` never resequence, otherwise the cap on displaced messages.
    pub max_reorg_resequence_depth: i64,
}

impl Default for ReorgConfig {
    fn default() -> Self {
        Self {
            max_reorg_resequence_depth: RESEQUENCE_DEPTH_UNLIMITED,
        }
    }
}

/// Config knobs for the optional notarizer bridge (`sovereignSequencerEnabled`,
/// `hotshotUrl`, `espressoNamespace`, `espressoTxnsPollingInterval`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotarizerConfig {
    pub sovereign_sequencer_enabled: bool,
    pub hotshot_url: String,
    pub espresso_namespace: u64,
    pub espresso_txns_polling_interval_ms: u64,
}

impl Default for NotarizerConfig {
    fn default() -> Self {
        Self {
            sovereign_sequencer_enabled: false,
            hotshot_url: String::new(),
            espresso_namespace: 0,
            espresso_txns_polling_interval_ms: 1_000,
        }
    }
}

/// Aggregate config for the whole streamer, assembled the way `SequencerConfig` groups its
/// per-component configs.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub execution_pump: ExecutionPumpConfig,
    pub feed_cache: FeedCacheConfig,
    pub reorg: ReorgConfig,
    pub notarizer: NotarizerConfig,
}

impl StreamerConfig {
    /// Loads each component's config from its own prefixed set of environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            execution_pump: envy_load("EXECUTION_PUMP_"),
            feed_cache: envy_load("FEED_CACHE_"),
            reorg: envy_load("REORG_"),
            notarizer: envy_load("NOTARIZER_"),
        }
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            execution_pump: ExecutionPumpConfig::default(),
            feed_cache: FeedCacheConfig::default(),
            reorg: ReorgConfig::default(),
            notarizer: NotarizerConfig::default(),
        }
    }
}

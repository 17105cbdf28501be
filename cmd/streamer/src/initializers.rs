//! Wires the stub collaborators, the store, and the two pump loops into a running
//! process, grounded on `cmd/ethrex/l2/initializers.rs`'s `init_rpc_api` shape (one
//! function per subsystem, taking a `CancellationToken` and handing spawned tasks back
//! to the caller's `TaskTracker`).

use std::path::Path;
use std::sync::Arc;

use streamer_core::{
    ExecutionPump, FatalSender, IngestionController, NotarizerBridge, ReorgEngine,
};
use streamer_storage::{EngineType, Store};
use streamer_types::StreamerConfig;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::collaborators::{
    AlwaysChosenCoordinator, LoggingBroadcaster, LoggingValidator, NoInboxReader,
    StubExecutionEngine, UnavailableNotarizerClient,
};

pub fn open_store(datadir: &str) -> Store {
    if datadir == "memory" {
        return Store::new_in_memory();
    }
    Store::open(Path::new(datadir), EngineType::Libmdbx).expect("failed to open streamer store")
}

/// Builds the ingestion controller and the pump/notarizer loops, spawning the loops on
/// `tracker` and returning the controller so the caller can feed it confirmed/feed/
/// sequencer input (e.g. from an RPC surface not in scope here).
pub fn init_ingestion(
    store: Store,
    config: StreamerConfig,
    cancel_token: CancellationToken,
    tracker: &TaskTracker,
    fatal: FatalSender,
) -> Arc<IngestionController> {
    let log = streamer_core::MessageLog::new(store.clone());
    let execution_engine = Arc::new(StubExecutionEngine::default());
    let broadcaster = Arc::new(LoggingBroadcaster);
    let coordinator = Arc::new(AlwaysChosenCoordinator);
    let validator = Arc::new(LoggingValidator);
    let inbox_reader = Arc::new(NoInboxReader);

    let reorg_engine = ReorgEngine::new(
        execution_engine.clone(),
        broadcaster.clone(),
        Some(validator.clone()),
        Some(inbox_reader),
        config.reorg,
    );

    let reorg_mutex = Arc::new(RwLock::new(()));
    let pump_notify = Arc::new(Notify::new());

    let notarizer = if config.notarizer.sovereign_sequencer_enabled {
        let state_mutex = Arc::new(tokio::sync::Mutex::new(()));
        let bridge = Arc::new(NotarizerBridge::new(
            log.clone(),
            store.clone(),
            Arc::new(UnavailableNotarizerClient),
            state_mutex,
            config.notarizer.clone(),
        ));
        let bridge_for_task = bridge.clone();
        let notarizer_cancel = cancel_token.clone();
        tracker.spawn(async move { bridge_for_task.run(notarizer_cancel).await });
        Some(bridge)
    } else {
        None
    };

    let controller = Arc::new(IngestionController::new(
        log.clone(),
        reorg_engine,
        execution_engine.clone(),
        broadcaster.clone(),
        coordinator,
        notarizer,
        reorg_mutex.clone(),
        pump_notify.clone(),
        config.feed_cache,
    ));

    let pump = ExecutionPump::new(
        log,
        execution_engine,
        broadcaster,
        reorg_mutex,
        pump_notify,
        config.execution_pump,
    );
    let pump_cancel = cancel_token;
    tracker.spawn(async move { pump.run(pump_cancel, fatal).await });

    controller
}

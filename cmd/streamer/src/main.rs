//! Standalone process entry point, grounded on `cmd/ethrex/l2.rs`'s `Command::Init`
//! arm: parse options, open the store, spawn the pump loops on a `TaskTracker`, and
//! wait for either a fatal condition or Ctrl-C before cancelling everything.

mod cli;
mod collaborators;
mod initializers;
mod utils;

use clap::Parser;
use streamer_types::StreamerConfig;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use cli::Options;
use utils::{init_tracing, set_datadir};

#[tokio::main]
async fn main() {
    init_tracing();

    let opts = Options::parse();
    let data_dir = if opts.datadir == "memory" {
        opts.datadir.clone()
    } else {
        set_datadir(&opts.datadir)
    };

    info!(data_dir = %data_dir, "starting streamer");

    let store = initializers::open_store(&data_dir);
    let config = StreamerConfig::from_env();

    let tracker = TaskTracker::new();
    let cancel_token = CancellationToken::new();
    let (fatal_tx, mut fatal_rx) = streamer_core::fatal_channel();

    let _controller =
        initializers::init_ingestion(store, config, cancel_token.clone(), &tracker, fatal_tx);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, stopping loops...");
        }
        Some(err) = fatal_rx.recv() => {
            error!(%err, "fatal error, stopping loops...");
        }
    }

    cancel_token.cancel();
    tracker.close();
    tracker.wait().await;
    info!("streamer shut down");
}

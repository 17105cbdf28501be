//! Command-line options, grounded on `cmd/ethrex`'s `Options` (reduced to what this
//! scope needs: there is no P2P stack, no JWT secret, no sync mode to pick).

use clap::Parser;

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_DATADIR: &str = "streamer";

#[derive(Parser)]
#[command(name = "streamer", author, version = VERSION_STRING, about = "Transaction streamer", long_about = None)]
pub struct Options {
    /// If set to the literal word `memory`, the streamer uses the in-memory engine
    /// instead of opening a libmdbx environment on disk.
    #[arg(
        long = "datadir",
        value_name = "DATABASE_DIRECTORY",
        default_value = DEFAULT_DATADIR,
        help = "If the datadir is the word `memory`, the streamer will use the in-memory engine"
    )]
    pub datadir: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            datadir: DEFAULT_DATADIR.to_string(),
        }
    }
}

//! Small helpers shared by `main`, grounded on `cmd/ethrex/utils.rs`.

use directories::ProjectDirs;
use tracing_subscriber::{EnvFilter, filter::Directive};

pub fn set_datadir(datadir: &str) -> String {
    let project_dir = ProjectDirs::from("", "", datadir).expect("couldn't find home directory");
    project_dir
        .data_local_dir()
        .to_str()
        .expect("invalid data directory")
        .to_owned()
}

pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(tracing::Level::INFO))
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

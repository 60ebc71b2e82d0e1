pub mod cleanup;
pub mod config;
pub mod error;
pub mod snapper;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cleanup::suppress_cleanup;
pub use config::SnapperConfig;
pub use error::{Error, Result};
pub use snapper::{Snapper, SnapperCli};
pub use snapshot::Snapshot;
pub use types::*;

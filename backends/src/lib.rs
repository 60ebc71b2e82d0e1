pub mod backend;
pub mod borg;

pub use backend::{ArchiveBackend, archive_name};
pub use borg::BorgBackend;

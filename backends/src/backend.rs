use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use snapborg_core::{Destination, Result};
use std::path::Path;

/// Somewhere snapshot contents can be archived to.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Destination class this backend records in the snapshot's backup tag.
    fn destination(&self) -> Destination;

    /// Archives the tree below `source` under `name`, stamped with `timestamp`.
    async fn create_archive(
        &self,
        name: &str,
        source: &Path,
        timestamp: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<()>;
}

/// Archive name for a snapshot taken at local time `date` in snapper config `config`.
pub fn archive_name(config: &str, date: NaiveDateTime) -> String {
    format!("{}-{}", config, date.format("%Y-%m-%dT%H:%M:%S"))
}

use crate::snapper::{self, Snapper};
use crate::types::{BACKUP_USERDATA_KEY, BackupTag, Destination, SnapshotRecord};
use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One snapper snapshot together with its backup and cleanup state.
///
/// Instances come from [`SnapperConfig::snapshots`](crate::SnapperConfig::snapshots).
/// Every state change is written to snapper's own metadata store; the
/// in-memory copy follows along so later decisions in the same run see it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    config: String,
    number: u32,
    date: NaiveDateTime,
    path: PathBuf,
    tag: BackupTag,
    cleanup: String,
}

impl Snapshot {
    pub(crate) fn from_record(config: &str, subvolume: &str, record: SnapshotRecord) -> Self {
        let tag = record.backup_tag();
        Self {
            config: config.to_string(),
            number: record.number,
            date: record.date,
            path: snapshot_path(subvolume, record.number),
            tag,
            cleanup: record.cleanup,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn config_name(&self) -> &str {
        &self.config
    }

    /// Local wall-clock time as recorded by snapper.
    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Resolves the recorded wall-clock time in `tz` and converts it to UTC.
    ///
    /// On a DST fold the earlier instant wins. A time that falls into a DST
    /// gap does not exist in `tz` and is rejected.
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<DateTime<Utc>> {
        tz.from_local_datetime(&self.date)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                Error::InvalidTimestamp(format!(
                    "{} does not exist in the local timezone (snapshot {})",
                    self.date, self.number
                ))
            })
    }

    pub fn date_utc(&self) -> Result<DateTime<Utc>> {
        self.date_in(&Local)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_tag(&self) -> &BackupTag {
        &self.tag
    }

    /// Cleanup algorithm as it was when the snapshot was listed.
    pub fn cleanup_algorithm(&self) -> &str {
        &self.cleanup
    }

    pub fn is_backed_up(&self, destination: Destination) -> bool {
        self.tag.contains(destination)
    }

    /// Appends the destination token to the stored tag.
    ///
    /// The token is appended even when already present, so a second call
    /// for the same destination stores it twice.
    pub async fn mark_backed_up(
        &mut self,
        snapper: &dyn Snapper,
        destination: Destination,
        dry_run: bool,
    ) -> Result<()> {
        let tag = self.tag.with_destination(destination);
        snapper::set_userdata(
            snapper,
            &self.config,
            self.number,
            BACKUP_USERDATA_KEY,
            &tag.to_string(),
            dry_run,
        )
        .await?;

        debug!(config = %self.config, snapshot = self.number, tag = %tag, "marked as backed up");
        self.tag = tag;
        Ok(())
    }

    /// Clears the stored tag entirely, unknown tokens included.
    pub async fn purge_backup_tag(&mut self, snapper: &dyn Snapper, dry_run: bool) -> Result<()> {
        snapper::set_userdata(snapper, &self.config, self.number, BACKUP_USERDATA_KEY, "", dry_run)
            .await?;
        self.tag = BackupTag::default();
        Ok(())
    }

    /// Sets an empty cleanup algorithm so snapper's cleanup leaves this snapshot alone.
    pub async fn disable_cleanup(&self, snapper: &dyn Snapper, dry_run: bool) -> Result<()> {
        snapper::set_cleanup_algorithm(snapper, &self.config, self.number, "", dry_run).await
    }

    /// Writes back the cleanup algorithm captured at construction, whatever is stored now.
    pub async fn restore_cleanup(&self, snapper: &dyn Snapper, dry_run: bool) -> Result<()> {
        snapper::set_cleanup_algorithm(snapper, &self.config, self.number, &self.cleanup, dry_run)
            .await
    }
}

/// Location of a snapshot's tree below its subvolume.
pub fn snapshot_path(subvolume: &str, number: u32) -> PathBuf {
    PathBuf::from(format!("{}/.snapshots/{}/snapshot", subvolume, number))
}

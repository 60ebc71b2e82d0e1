use crate::cleanup;
use crate::snapper::{self, Snapper};
use crate::snapshot::{Snapshot, snapshot_path};
use crate::types::{ConfigSettings, Destination};
use crate::Result;
use futures::future::BoxFuture;
use std::path::PathBuf;
use tracing::debug;

/// A snapper configuration and its snapshot catalog.
///
/// The snapshot list is fetched on first use and kept for the lifetime of
/// this value. There is no refresh; load a new `SnapperConfig` to see
/// snapshots created since.
///
/// # Examples
///
/// ```no_run
/// use snapborg_core::{Destination, SnapperCli, SnapperConfig, suppress_cleanup};
///
/// #[tokio::main]
/// async fn main() -> snapborg_core::Result<()> {
///     let snapper = SnapperCli::new();
///     let mut config = SnapperConfig::load(&snapper, "root").await?;
///     let mut pending = config.pending_backups(&snapper, Destination::Remote).await?;
///
///     // Snapper cleanup cannot remove these snapshots until the closure finishes.
///     let archived = suppress_cleanup(&snapper, &mut pending, false, |snapshots| {
///         Box::pin(async move { Ok(snapshots.len()) })
///     })
///     .await?;
///
///     println!("{} snapshots handled", archived);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SnapperConfig {
    name: String,
    settings: ConfigSettings,
    snapshots: Option<Vec<Snapshot>>,
}

impl SnapperConfig {
    pub fn new(name: &str, settings: ConfigSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
            snapshots: None,
        }
    }

    /// Reads the settings of the named configuration. Snapshots are not listed yet.
    pub async fn load(snapper: &dyn Snapper, name: &str) -> Result<Self> {
        let settings = snapper::get_config(snapper, name).await?;
        Ok(Self::new(name, settings))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subvolume(&self) -> &str {
        &self.settings.subvolume
    }

    pub fn is_timeline_enabled(&self) -> bool {
        self.settings.timeline_create == "yes"
    }

    pub fn path_of(&self, snapshot: &Snapshot) -> PathBuf {
        snapshot_path(&self.settings.subvolume, snapshot.number())
    }

    /// All snapshots of this configuration in snapper's order, without the live state (number 0).
    pub async fn snapshots(&mut self, snapper: &dyn Snapper) -> Result<&mut [Snapshot]> {
        let snapshots = match self.snapshots.take() {
            Some(cached) => cached,
            None => {
                let records = snapper::list_snapshots(snapper, &self.name).await?;
                let loaded: Vec<Snapshot> = records
                    .into_iter()
                    .map(|record| Snapshot::from_record(&self.name, &self.settings.subvolume, record))
                    .collect();
                debug!(config = %self.name, count = loaded.len(), "listed snapshots");
                loaded
            }
        };

        Ok(self.snapshots.insert(snapshots).as_mut_slice())
    }

    /// Snapshots that have not been archived to `destination` yet.
    pub async fn pending_backups(
        &mut self,
        snapper: &dyn Snapper,
        destination: Destination,
    ) -> Result<Vec<&mut Snapshot>> {
        Ok(self
            .snapshots(snapper)
            .await?
            .iter_mut()
            .filter(|snapshot| !snapshot.is_backed_up(destination))
            .collect())
    }

    /// [`cleanup::suppress_cleanup`] over every snapshot of this configuration.
    pub async fn suppress_cleanup<T, F>(&mut self, snapper: &dyn Snapper, dry_run: bool, body: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut [Snapshot]) -> BoxFuture<'a, Result<T>>,
    {
        let snapshots = self.snapshots(snapper).await?;
        cleanup::suppress_cleanup(snapper, snapshots, dry_run, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSnapper, record};
    use serde_json::json;

    fn snapper() -> RecordingSnapper {
        RecordingSnapper::new()
            .with_settings("home", json!({ "SUBVOLUME": "/home", "TIMELINE_CREATE": "yes" }))
            .with_settings("var", json!({ "SUBVOLUME": "/var", "TIMELINE_CREATE": "no" }))
            .with_list(
                "home",
                json!([
                    record(0, "", None),
                    record(4, "number", Some("local")),
                    record(9, "timeline", Some("remote")),
                    record(11, "", None),
                ]),
            )
    }

    #[tokio::test]
    async fn test_live_snapshot_is_excluded() {
        let snapper = snapper();
        let mut config = SnapperConfig::load(&snapper, "home").await.unwrap();

        let numbers: Vec<u32> = config
            .snapshots(&snapper)
            .await
            .unwrap()
            .iter()
            .map(|s| s.number())
            .collect();
        assert_eq!(numbers, vec![4, 9, 11]);
    }

    #[tokio::test]
    async fn test_live_snapshot_empty_date_does_not_break_listing() {
        let snapper = RecordingSnapper::new()
            .with_settings("root", json!({ "SUBVOLUME": "/", "TIMELINE_CREATE": "yes" }))
            .with_list(
                "root",
                json!([
                    { "number": 0, "date": "", "userdata": null, "cleanup": "" },
                    record(1, "number", None),
                ]),
            );
        let mut config = SnapperConfig::load(&snapper, "root").await.unwrap();

        let snapshots = config.snapshots(&snapper).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].number(), 1);
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let snapper = snapper();
        let mut config = SnapperConfig::load(&snapper, "home").await.unwrap();

        config.snapshots(&snapper).await.unwrap();
        config.snapshots(&snapper).await.unwrap();
        config.pending_backups(&snapper, Destination::Local).await.unwrap();

        let lists = snapper.calls().iter().filter(|c| c.args[0] == "list").count();
        assert_eq!(lists, 1);
    }

    #[tokio::test]
    async fn test_settings() {
        let snapper = snapper();
        let home = SnapperConfig::load(&snapper, "home").await.unwrap();
        let var = SnapperConfig::load(&snapper, "var").await.unwrap();

        assert!(home.is_timeline_enabled());
        assert!(!var.is_timeline_enabled());
        assert_eq!(var.subvolume(), "/var");
        assert_eq!(snapper.calls()[0].args, vec!["get-config"]);
        assert_eq!(snapper.calls()[0].config.as_deref(), Some("home"));
    }

    #[tokio::test]
    async fn test_path_of() {
        let snapper = snapper();
        let mut config = SnapperConfig::load(&snapper, "home").await.unwrap();
        let snapshots = config.snapshots(&snapper).await.unwrap().to_vec();

        for snapshot in &snapshots {
            let expected = format!("/home/.snapshots/{}/snapshot", snapshot.number());
            assert_eq!(config.path_of(snapshot), PathBuf::from(&expected));
            assert_eq!(snapshot.path(), PathBuf::from(&expected).as_path());
        }
    }

    #[tokio::test]
    async fn test_pending_backups_per_destination() {
        let snapper = snapper();
        let mut config = SnapperConfig::load(&snapper, "home").await.unwrap();

        let local: Vec<u32> = config
            .pending_backups(&snapper, Destination::Local)
            .await
            .unwrap()
            .iter()
            .map(|s| s.number())
            .collect();
        assert_eq!(local, vec![9, 11]);

        let remote: Vec<u32> = config
            .pending_backups(&snapper, Destination::Remote)
            .await
            .unwrap()
            .iter()
            .map(|s| s.number())
            .collect();
        assert_eq!(remote, vec![4, 11]);
    }

    #[tokio::test]
    async fn test_missing_config_fails_to_load() {
        let snapper = snapper();
        let result = SnapperConfig::load(&snapper, "missing").await;
        assert!(matches!(result, Err(crate::Error::MalformedResponse { .. })));
    }
}

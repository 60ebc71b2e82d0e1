use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use snapborg_backends::{ArchiveBackend, BorgBackend, archive_name};
use snapborg_core::{Snapper, SnapperCli, SnapperConfig, suppress_cleanup};
use std::sync::Arc;
use tracing::{info, warn};

use crate::settings::Settings;

#[derive(Args)]
pub struct BackupCommand {
    #[arg(long, help = "Only back up this snapper config")]
    snapper_config: Option<String>,
}

impl BackupCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let settings = Settings::load(cli.config_file.as_deref()).await?;
        let snapper: Arc<dyn Snapper> = Arc::new(SnapperCli::with_binary(&settings.snapper_binary));

        if cli.dry_run {
            println!("DRY RUN - snapper metadata and borg repositories stay untouched");
        }

        let mut total = 0;
        for entry in settings.select(self.snapper_config.as_deref())? {
            let borg = BorgBackend::new(entry.repo.as_str())
                .with_binary(&settings.borg_binary)
                .with_passphrase(entry.passphrase.clone());
            info!(config = %entry.name, repository = borg.repository(), "selected borg repository");
            let backend: Arc<dyn ArchiveBackend> = Arc::new(borg);

            total += backup_config(snapper.clone(), backend, &entry.name, cli.dry_run)
                .await
                .with_context(|| format!("Backup of snapper config '{}' failed", entry.name))?;
        }

        println!("✅ {} snapshot(s) archived", total);
        Ok(())
    }
}

/// Archives every snapshot of `name` that the backend's destination has not seen yet.
async fn backup_config(
    snapper: Arc<dyn Snapper>,
    backend: Arc<dyn ArchiveBackend>,
    name: &str,
    dry_run: bool,
) -> Result<usize> {
    let mut config = SnapperConfig::load(&*snapper, name).await?;
    if !config.is_timeline_enabled() {
        warn!(config = name, "timeline snapshots are disabled for this config");
    }

    let destination = backend.destination();
    let mut pending = config.pending_backups(&*snapper, destination).await?;
    if pending.is_empty() {
        info!(config = name, %destination, "nothing to back up");
        return Ok(0);
    }

    info!(config = name, %destination, count = pending.len(), "backing up snapshots");

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")?);

    let inner_snapper = snapper.clone();
    let inner_progress = progress.clone();
    let archived = suppress_cleanup(&*snapper, &mut pending, dry_run, move |snapshots| {
        Box::pin(async move {
            for snapshot in snapshots.iter_mut() {
                let archive = archive_name(snapshot.config_name(), snapshot.date());
                inner_progress.set_message(format!("Archiving {}", archive));

                let timestamp = snapshot.date_utc()?;
                backend
                    .create_archive(&archive, snapshot.path(), timestamp, dry_run)
                    .await?;
                snapshot
                    .mark_backed_up(&*inner_snapper, destination, dry_run)
                    .await?;
                inner_progress.inc(1);
            }
            Ok::<_, snapborg_core::Error>(snapshots.len())
        })
    })
    .await;
    match &archived {
        Ok(count) => progress.finish_with_message(format!("{} archived", count)),
        Err(_) => progress.abandon_with_message("failed"),
    }

    Ok(archived?)
}

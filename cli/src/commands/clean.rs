use anyhow::{Context, Result};
use clap::Args;
use snapborg_core::{SnapperCli, SnapperConfig};
use tracing::{info, warn};

use crate::settings::Settings;

#[derive(Args)]
pub struct CleanSnapperCommand {
    #[arg(long, help = "Only clean this snapper config")]
    snapper_config: Option<String>,
}

impl CleanSnapperCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let settings = Settings::load(cli.config_file.as_deref()).await?;
        let snapper = SnapperCli::with_binary(&settings.snapper_binary);

        for entry in settings.select(self.snapper_config.as_deref())? {
            let mut config = SnapperConfig::load(&snapper, &entry.name).await?;
            warn!(config = %entry.name, "forgetting all recorded backups");

            let snapshots = config.snapshots(&snapper).await?;
            for snapshot in snapshots.iter_mut() {
                snapshot
                    .purge_backup_tag(&snapper, cli.dry_run)
                    .await
                    .with_context(|| format!("Failed to clean snapshot {} of '{}'", snapshot.number(), entry.name))?;
            }

            info!(config = %entry.name, count = snapshots.len(), "backup tags cleared");
        }

        Ok(())
    }
}

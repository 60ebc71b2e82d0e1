use anyhow::Result;
use clap::Args;
use snapborg_core::{Destination, SnapperCli, SnapperConfig};
use tracing::info;

use crate::settings::Settings;

#[derive(Args)]
pub struct ListCommand {
    #[arg(long, help = "Only list this snapper config")]
    snapper_config: Option<String>,
}

impl ListCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let settings = Settings::load(cli.config_file.as_deref()).await?;
        let snapper = SnapperCli::with_binary(&settings.snapper_binary);

        for entry in settings.select(self.snapper_config.as_deref())? {
            info!(config = %entry.name, "listing snapshots");
            let mut config = SnapperConfig::load(&snapper, &entry.name).await?;
            let snapshots = config.snapshots(&snapper).await?;

            println!("{} ({})", entry.name, entry.repo);
            if snapshots.is_empty() {
                println!("No snapshots found\n");
                continue;
            }

            println!("{:<8} {:<20} {:<16} {:<6} {}", "Number", "Date", "Cleanup", "Local", "Remote");
            println!("{:-<60}", "");

            for snapshot in snapshots.iter() {
                println!(
                    "{:<8} {:<20} {:<16} {:<6} {}",
                    snapshot.number(),
                    snapshot.date().format("%Y-%m-%d %H:%M:%S"),
                    snapshot.cleanup_algorithm(),
                    yes_no(snapshot.is_backed_up(Destination::Local)),
                    yes_no(snapshot.is_backed_up(Destination::Remote)),
                );
            }
            println!();
        }

        Ok(())
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

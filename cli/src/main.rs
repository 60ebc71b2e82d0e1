mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{backup::BackupCommand, clean::CleanSnapperCommand, list::ListCommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "snapborg",
    about = "Back up snapper snapshots with borg",
    long_about = "Snapborg archives snapper snapshots into borg repositories, keeps snapper's cleanup away from them while it works and records finished backups in the snapshot's own metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long = "config", env = "SNAPBORG_CONFIG", global = true, help = "Configuration file")]
    config_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Show what would change without modifying anything")]
    dry_run: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List snapshots and their backup state")]
    List(ListCommand),

    #[command(about = "Archive snapshots that are not backed up yet")]
    Backup(BackupCommand),

    #[command(about = "Forget all recorded backups on snapper's side")]
    CleanSnapper(CleanSnapperCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    debug!(dry_run = cli.dry_run, "starting snapborg");

    match cli.command {
        Commands::List(ref cmd) => cmd.run(&cli).await,
        Commands::Backup(ref cmd) => cmd.run(&cli).await,
        Commands::CleanSnapper(ref cmd) => cmd.run(&cli).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "snapborg={level},snapborg_core={level},snapborg_backends={level}"
        )))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}

use crate::backend::ArchiveBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapborg_core::{Destination, Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Borg repository, driven through the `borg` command line.
pub struct BorgBackend {
    binary: PathBuf,
    repository: String,
    passphrase: Option<String>,
}

impl BorgBackend {
    pub fn new<S: Into<String>>(repository: S) -> Self {
        Self {
            binary: PathBuf::from("borg"),
            repository: repository.into(),
            passphrase: None,
        }
    }

    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase;
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn create_args(&self, name: &str, timestamp: DateTime<Utc>) -> Vec<String> {
        vec![
            "create".to_string(),
            "--timestamp".to_string(),
            timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{}::{}", self.repository, name),
            ".".to_string(),
        ]
    }
}

#[async_trait]
impl ArchiveBackend for BorgBackend {
    fn destination(&self) -> Destination {
        Destination::for_repository(&self.repository)
    }

    async fn create_archive(
        &self,
        name: &str,
        source: &Path,
        timestamp: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<()> {
        let args = self.create_args(name, timestamp);
        let command_text = format!("{} {}", self.binary.display(), args.join(" "));

        if dry_run {
            info!(command = %command_text, source = %source.display(), "dry run, not archiving");
            return Ok(());
        }

        debug!(command = %command_text, source = %source.display(), "running borg");
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).current_dir(source);
        if let Some(passphrase) = &self.passphrase {
            cmd.env("BORG_PASSPHRASE", passphrase);
        }

        let output = cmd.output().await.map_err(|e| Error::CommandLaunch {
            command: command_text.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command_text,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(archive = name, repository = %self.repository, "archive created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_destination_follows_repository_scheme() {
        assert_eq!(BorgBackend::new("ssh://backup@nas/./root").destination(), Destination::Remote);
        assert_eq!(BorgBackend::new("/mnt/usb/borg").destination(), Destination::Local);
    }

    #[test]
    fn test_builder_keeps_repository() {
        let backend = BorgBackend::new("ssh://backup@nas/./root")
            .with_binary("/usr/local/bin/borg")
            .with_passphrase(Some("hunter2".to_string()));
        assert_eq!(backend.repository(), "ssh://backup@nas/./root");
        assert_eq!(backend.binary, PathBuf::from("/usr/local/bin/borg"));
    }

    #[test]
    fn test_create_args() {
        let backend = BorgBackend::new("/mnt/usb/borg");
        assert_eq!(
            backend.create_args("root-2024-05-01T12:30:00", timestamp()),
            vec![
                "create",
                "--timestamp",
                "2024-05-01T10:30:00",
                "/mnt/usb/borg::root-2024-05-01T12:30:00",
                "."
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_does_not_spawn() {
        let backend = BorgBackend::new("/mnt/usb/borg").with_binary("/nonexistent/borg");
        let dir = tempfile::tempdir().unwrap();
        backend
            .create_archive("root-1", dir.path(), timestamp(), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let backend = BorgBackend::new("/mnt/usb/borg").with_binary("/nonexistent/borg");
        let dir = tempfile::tempdir().unwrap();
        let result = backend.create_archive("root-1", dir.path(), timestamp(), false).await;
        assert!(matches!(result, Err(Error::CommandLaunch { .. })));
    }
}

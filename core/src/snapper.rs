use crate::types::{ConfigSettings, SnapshotRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use semver::Version;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Oldest snapper release with `--jsonout` support.
pub const MINIMUM_SNAPPER_VERSION: Version = Version::new(0, 8, 6);

/// Runs snapper commands and hands back their decoded JSON output.
///
/// Implementations must not execute anything when `dry_run` is set; they
/// surface the command instead and return `Ok(None)`. Empty output is also
/// `Ok(None)`.
#[async_trait]
pub trait Snapper: Send + Sync {
    async fn run(&self, config: Option<&str>, args: &[&str], dry_run: bool) -> Result<Option<Value>>;
}

/// [`Snapper`] backed by the real `snapper` binary.
///
/// The version gate result is cached per `SnapperCli` value, not per process.
/// A fresh executor checks again on its first real invocation; the `snapborg`
/// binary builds one executor per run and shares it behind an `Arc`.
pub struct SnapperCli {
    binary: PathBuf,
    version: OnceCell<Version>,
}

impl SnapperCli {
    pub fn new() -> Self {
        Self::with_binary("snapper")
    }

    pub fn with_binary<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
            version: OnceCell::new(),
        }
    }

    /// Checks the installed snapper version once; later calls reuse the first result.
    pub async fn ensure_version(&self) -> Result<&Version> {
        self.version
            .get_or_try_init(|| async {
                let output = Command::new(&self.binary)
                    .arg("--version")
                    .output()
                    .await
                    .map_err(|source| Error::CommandLaunch {
                        command: format!("{} --version", self.binary.display()),
                        source,
                    })?;

                if !output.status.success() {
                    return Err(Error::CommandFailed {
                        command: format!("{} --version", self.binary.display()),
                        status: output.status.to_string(),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    });
                }

                let stdout = String::from_utf8_lossy(&output.stdout);
                let found = parse_snapper_version(&stdout)?;
                check_minimum_version(&found)?;
                debug!(version = %found, "snapper version accepted");
                Ok(found)
            })
            .await
    }

    fn command_line(&self, config: Option<&str>, args: &[&str]) -> Vec<String> {
        let mut line = vec![self.binary.display().to_string()];
        if let Some(config) = config {
            line.push("-c".to_string());
            line.push(config.to_string());
        }
        line.push("--jsonout".to_string());
        line.extend(args.iter().map(|a| a.to_string()));
        line
    }
}

impl Default for SnapperCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Snapper for SnapperCli {
    async fn run(&self, config: Option<&str>, args: &[&str], dry_run: bool) -> Result<Option<Value>> {
        let line = self.command_line(config, args);
        let command_text = line.join(" ");

        if dry_run {
            info!(command = %command_text, "dry run, not executing");
            return Ok(None);
        }

        self.ensure_version().await?;

        debug!(command = %command_text, "running snapper");
        let output = Command::new(&line[0])
            .args(&line[1..])
            .output()
            .await
            .map_err(|source| Error::CommandLaunch {
                command: command_text.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command_text,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        decode_output(&command_text, &stdout)
    }
}

/// Decodes snapper output. Blank output means "no result" and is never parsed.
pub fn decode_output(command: &str, stdout: &str) -> Result<Option<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| Error::MalformedResponse {
            command: command.to_string(),
            reason: e.to_string(),
        })
}

/// Extracts the version from `snapper --version` output.
pub fn parse_snapper_version(output: &str) -> Result<Version> {
    let field = output
        .lines()
        .find(|line| line.starts_with("snapper"))
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| Error::VersionUnreadable(output.trim().to_string()))?;

    normalize_version(field).ok_or_else(|| Error::VersionUnreadable(field.to_string()))
}

pub fn check_minimum_version(found: &Version) -> Result<()> {
    if *found < MINIMUM_SNAPPER_VERSION {
        return Err(Error::SnapperTooOld {
            found: found.to_string(),
            required: MINIMUM_SNAPPER_VERSION.to_string(),
        });
    }
    Ok(())
}

// Snapper reports plain dotted versions, distributions sometimes append a suffix.
fn normalize_version(field: &str) -> Option<Version> {
    let numeric: String = field
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut parts = numeric
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>());

    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

fn decode_as<T: DeserializeOwned>(command: &str, value: Option<Value>) -> Result<T> {
    let value = value.ok_or_else(|| Error::MalformedResponse {
        command: command.to_string(),
        reason: "empty output".to_string(),
    })?;

    serde_json::from_value(value).map_err(|e| Error::MalformedResponse {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// `snapper -c <config> list`, validated into records.
///
/// The live state (number 0) is dropped before validation: snapper reports it
/// with an empty date.
pub async fn list_snapshots(snapper: &dyn Snapper, config: &str) -> Result<Vec<SnapshotRecord>> {
    let value = snapper
        .run(Some(config), &["list", "--disable-used-space"], false)
        .await?;
    let mut listing: HashMap<String, Vec<Value>> = decode_as("list", value)?;

    let entries = listing.remove(config).ok_or_else(|| Error::MalformedResponse {
        command: "list".to_string(),
        reason: format!("no snapshot list for config '{}'", config),
    })?;

    entries
        .into_iter()
        .filter(|entry| entry.get("number").and_then(Value::as_u64) != Some(0))
        .map(|entry| decode_as("list", Some(entry)))
        .collect()
}

/// `snapper -c <config> get-config`, validated into settings.
pub async fn get_config(snapper: &dyn Snapper, config: &str) -> Result<ConfigSettings> {
    let value = snapper.run(Some(config), &["get-config"], false).await?;
    decode_as("get-config", value)
}

pub async fn set_userdata(
    snapper: &dyn Snapper,
    config: &str,
    number: u32,
    key: &str,
    value: &str,
    dry_run: bool,
) -> Result<()> {
    let assignment = format!("{}={}", key, value);
    let number = number.to_string();
    snapper
        .run(Some(config), &["modify", "--userdata", assignment.as_str(), number.as_str()], dry_run)
        .await?;
    Ok(())
}

pub async fn set_cleanup_algorithm(
    snapper: &dyn Snapper,
    config: &str,
    number: u32,
    algorithm: &str,
    dry_run: bool,
) -> Result<()> {
    let number = number.to_string();
    snapper
        .run(Some(config), &["modify", "--cleanup-algorithm", algorithm, number.as_str()], dry_run)
        .await?;
    Ok(())
}

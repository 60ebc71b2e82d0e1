use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SYSTEM_CONFIG: &str = "/etc/snapborg.toml";
const CONFIG_FILE_NAME: &str = "snapborg.toml";

/// Contents of `snapborg.toml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_snapper_binary")]
    pub snapper_binary: PathBuf,
    #[serde(default = "default_borg_binary")]
    pub borg_binary: PathBuf,
    pub configs: Vec<BackupConfig>,
}

/// One snapper configuration and the borg repository it is archived to.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    pub name: String,
    pub repo: String,
    #[serde(default)]
    pub passphrase: Option<String>,
}

fn default_snapper_binary() -> PathBuf {
    PathBuf::from("snapper")
}

fn default_borg_binary() -> PathBuf {
    PathBuf::from("borg")
}

impl Settings {
    /// Loads `explicit` if given, otherwise the first existing default location.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => candidate_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| {
                    anyhow!("No configuration file found (--config, SNAPBORG_CONFIG or {})", SYSTEM_CONFIG)
                })?,
        };

        Self::from_file(&path).await
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading configuration");
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.configs.is_empty() {
            bail!("At least one [[configs]] entry is required");
        }

        let mut seen = HashSet::new();
        for config in &self.configs {
            if config.name.is_empty() {
                bail!("Config entry with empty name");
            }
            if config.repo.is_empty() {
                bail!("Config '{}' has no repo", config.name);
            }
            if !seen.insert(config.name.as_str()) {
                bail!("Config '{}' is listed twice", config.name);
            }
        }
        Ok(())
    }

    /// The named entry, or all entries when no name is given.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&BackupConfig>> {
        match name {
            None => Ok(self.configs.iter().collect()),
            Some(name) => self
                .configs
                .iter()
                .find(|c| c.name == name)
                .map(|c| vec![c])
                .ok_or_else(|| anyhow!("Snapper config '{}' is not configured", name)),
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dirs) = ProjectDirs::from("", "", "snapborg") {
        paths.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    paths
}

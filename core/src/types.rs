use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

/// Userdata key under which backup state is stored on each snapshot.
pub const BACKUP_USERDATA_KEY: &str = "snapborg_backup";

const LEGACY_BACKED_UP: &str = "true";

const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Class of a backup target. Snapshots track local and remote archival separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Local,
    Remote,
}

impl Destination {
    /// Repositories reached over ssh are remote, everything else is local.
    pub fn for_repository(path: &str) -> Self {
        if path.starts_with("ssh://") {
            Destination::Remote
        } else {
            Destination::Local
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Destination::Local => "local",
            Destination::Remote => "remote",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Colon separated token list stored under [`BACKUP_USERDATA_KEY`].
///
/// Tokens this crate does not know about are kept verbatim so that
/// appending a destination never drops them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupTag {
    tokens: Vec<String>,
}

impl BackupTag {
    /// Parses a stored tag. The legacy value `true` predates per-destination
    /// tracking and always meant a local archive.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        let tokens = raw
            .split(':')
            .map(|token| {
                if token == LEGACY_BACKED_UP {
                    Destination::Local.token().to_string()
                } else {
                    token.to_string()
                }
            })
            .collect();

        Self { tokens }
    }

    pub fn contains(&self, destination: Destination) -> bool {
        self.tokens.iter().any(|t| t == destination.token())
    }

    /// Appends the destination token. Existing tokens, duplicates included, are left alone.
    pub fn with_destination(&self, destination: Destination) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(destination.token().to_string());
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for BackupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(":"))
    }
}

/// One entry of `snapper --jsonout list`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRecord {
    pub number: u32,
    #[serde(deserialize_with = "deserialize_local_datetime")]
    pub date: NaiveDateTime,
    #[serde(default)]
    pub userdata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub cleanup: String,
}

impl SnapshotRecord {
    pub fn backup_tag(&self) -> BackupTag {
        self.userdata
            .as_ref()
            .and_then(|data| data.get(BACKUP_USERDATA_KEY))
            .map(|raw| BackupTag::parse(raw))
            .unwrap_or_default()
    }
}

/// Settings returned by `snapper --jsonout get-config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSettings {
    #[serde(rename = "SUBVOLUME")]
    pub subvolume: String,
    #[serde(rename = "TIMELINE_CREATE", default)]
    pub timeline_create: String,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Parses a snapper date. Snapper writes local wall-clock time without an offset.
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn deserialize_local_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_local_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid local datetime '{}'", raw)))
}

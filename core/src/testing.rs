use crate::snapper::Snapper;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config: Option<String>,
    pub args: Vec<String>,
    pub dry_run: bool,
}

type FailPredicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// In-memory [`Snapper`] that records every call and answers `list` / `get-config`
/// from canned JSON.
pub struct RecordingSnapper {
    calls: Mutex<Vec<Invocation>>,
    listings: HashMap<String, Value>,
    settings: HashMap<String, Value>,
    fail_when: Vec<FailPredicate>,
}

impl RecordingSnapper {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            listings: HashMap::new(),
            settings: HashMap::new(),
            fail_when: Vec::new(),
        }
    }

    pub fn with_list(mut self, config: &str, snapshots: Value) -> Self {
        self.listings.insert(config.to_string(), snapshots);
        self
    }

    pub fn with_settings(mut self, config: &str, settings: Value) -> Self {
        self.settings.insert(config.to_string(), settings);
        self
    }

    /// Makes every real or dry-run call whose arguments match fail with `CommandFailed`.
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.fail_when.push(Box::new(predicate));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn modify_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.args.first().map(String::as_str) == Some("modify"))
            .map(|c| c.args)
            .collect()
    }
}

#[async_trait]
impl Snapper for RecordingSnapper {
    async fn run(&self, config: Option<&str>, args: &[&str], dry_run: bool) -> Result<Option<Value>> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.calls.lock().unwrap().push(Invocation {
            config: config.map(str::to_string),
            args: args.clone(),
            dry_run,
        });

        if self.fail_when.iter().any(|predicate| predicate(&args)) {
            return Err(Error::CommandFailed {
                command: args.join(" "),
                status: "exit status: 1".to_string(),
                stderr: "injected failure".to_string(),
            });
        }

        if dry_run {
            return Ok(None);
        }

        let config = config.unwrap_or_default();
        match args.first().map(String::as_str) {
            Some("list") => Ok(self.listings.get(config).map(|snapshots| {
                let mut listing = serde_json::Map::new();
                listing.insert(config.to_string(), snapshots.clone());
                Value::Object(listing)
            })),
            Some("get-config") => Ok(self.settings.get(config).cloned()),
            _ => Ok(None),
        }
    }
}

/// Builds a `list` record. Number 0 gets the empty date snapper reports for the live state.
pub fn record(number: u32, cleanup: &str, tag: Option<&str>) -> Value {
    let date = if number == 0 { "" } else { "2024-05-01 12:30:00" };
    json!({
        "number": number,
        "date": date,
        "userdata": tag.map(|t| json!({ "snapborg_backup": t })),
        "cleanup": cleanup,
    })
}

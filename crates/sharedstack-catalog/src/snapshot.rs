use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sharedstack_core::Tag;

/// The tags one run saw in the remote catalog, cached in the run state
/// directory for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default = "snapshot_version")]
    pub version: u32,
    pub source_url: String,
    pub fetched_at_unix: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CatalogSnapshot {
    pub fn new(source_url: &str, tags: &BTreeSet<Tag>) -> Result<Self> {
        let fetched_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system time is before unix epoch")?
            .as_secs();
        Ok(Self {
            version: snapshot_version(),
            source_url: source_url.to_string(),
            fetched_at_unix,
            tags: tags.iter().map(|tag| tag.as_str().to_string()).collect(),
        })
    }

    pub fn tags(&self) -> Result<BTreeSet<Tag>> {
        self.tags
            .iter()
            .map(|raw| Tag::parse(raw).with_context(|| format!("invalid cached tag '{raw}'")))
            .collect()
    }
}

pub fn write_catalog_snapshot(path: &Path, snapshot: &CatalogSnapshot) -> Result<()> {
    let payload =
        serde_json::to_vec_pretty(snapshot).context("failed to serialize catalog snapshot")?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write catalog snapshot: {}", path.display()))
}

pub fn read_catalog_snapshot(path: &Path) -> Result<CatalogSnapshot> {
    let raw = fs::read(path)
        .with_context(|| format!("failed to read catalog snapshot: {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse catalog snapshot: {}", path.display()))
}

fn snapshot_version() -> u32 {
    1
}

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use sharedstack_core::Tag;

use crate::StackLayout;

pub fn read_retired_tags(layout: &StackLayout) -> Result<BTreeSet<String>> {
    let path = layout.ledger_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read retirement ledger: {}", path.display()));
        }
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect())
}

/// Appends `tag` to the ledger and syncs it to disk before returning.
pub fn append_retired_tag(layout: &StackLayout, tag: &Tag) -> Result<()> {
    let path = layout.ledger_path();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open retirement ledger: {}", path.display()))?;
    file.write_all(format!("{tag}\n").as_bytes())
        .with_context(|| format!("failed to append retirement ledger: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush retirement ledger: {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync retirement ledger: {}", path.display()))?;
    tracing::info!(tag = %tag, "recorded tag in retirement ledger");
    Ok(())
}

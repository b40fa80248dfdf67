use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use sharedstack_core::Tag;

/// Class prefix, digits and underscores, an optional release candidate
/// suffix, then the listing-file extension.
const TAG_LISTING_PATTERN: &str = r"\b([vwd][0-9_]*[0-9](?:_?rc[0-9]+)?)\.list\b";

/// Extracts tag identifiers from a catalog listing page.
///
/// Entries that look like listing files but do not parse as a tag are
/// skipped, as are tags rejected by `filter`.
pub fn parse_catalog_listing(body: &str, filter: Option<&Regex>) -> Result<BTreeSet<Tag>> {
    let pattern = Regex::new(TAG_LISTING_PATTERN).context("invalid catalog listing pattern")?;

    let mut tags = BTreeSet::new();
    for captures in pattern.captures_iter(body) {
        let Some(raw) = captures.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if filter.is_some_and(|filter| !filter.is_match(raw)) {
            continue;
        }
        match Tag::parse(raw) {
            Ok(tag) => {
                tags.insert(tag);
            }
            Err(err) => {
                tracing::debug!(entry = raw, %err, "skipping malformed catalog entry");
            }
        }
    }
    Ok(tags)
}

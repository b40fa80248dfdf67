use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use sharedstack_core::{sort_most_recent_first, Tag, TagClass};

use crate::evict::teardown_packages;
use crate::fs_utils::{process_is_alive, remove_dir_all_if_exists};
use crate::layout::parse_work_dir_name;
use crate::{PackageTeardown, PassContext, ReclaimedWork, StackLayout, WorkDirKind};

pub fn list_installed_tags(layout: &StackLayout) -> Result<Vec<Tag>> {
    let dir = layout.tags_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read tag directory: {}", dir.display()));
        }
    };

    let mut tags = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read tag directory: {}", dir.display()))?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        match Tag::parse(name) {
            Ok(tag) => tags.push(tag),
            Err(err) => tracing::debug!(entry = name, %err, "ignoring non-tag directory"),
        }
    }

    sort_most_recent_first(&mut tags);
    Ok(tags)
}

pub fn group_by_class(tags: &[Tag]) -> BTreeMap<TagClass, Vec<Tag>> {
    let mut grouped: BTreeMap<TagClass, Vec<Tag>> = BTreeMap::new();
    for tag in tags {
        grouped.entry(tag.class()).or_default().push(tag.clone());
    }
    grouped
}

/// Removes staging and rename-aside directories left behind by processes
/// that are no longer running. A rename-aside directory whose loader is
/// still present has its package teardown finished first; the evictor only
/// starts deleting the tree once teardown is done.
pub fn reclaim_abandoned_work(ctx: &PassContext<'_>) -> Result<Vec<ReclaimedWork>> {
    let dir = ctx.layout.tags_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read tag directory: {}", dir.display()));
        }
    };

    let mut reclaimed = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read tag directory: {}", dir.display()))?;
        let name = entry.file_name();
        let Some(work) = name.to_str().and_then(parse_work_dir_name) else {
            continue;
        };
        if process_is_alive(work.pid) {
            continue;
        }

        let path = entry.path();
        let teardown = match work.kind {
            WorkDirKind::Installing => None,
            WorkDirKind::Deleting => finish_abandoned_teardown(ctx, &work.tag, &path),
        };
        let work_item = ReclaimedWork {
            path,
            tag: work.tag,
            teardown,
        };
        if ctx.dry_run {
            reclaimed.push(work_item);
            continue;
        }
        match remove_dir_all_if_exists(&work_item.path) {
            Ok(true) => {
                tracing::info!(
                    tag = %work_item.tag,
                    kind = work.kind.as_str(),
                    pid = work.pid,
                    path = %work_item.path.display(),
                    "reclaimed abandoned work directory"
                );
                reclaimed.push(work_item);
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %work_item.path.display(), %err, "failed to reclaim work directory");
            }
        }
    }

    reclaimed.sort_by(|left, right| left.path.cmp(&right.path));
    Ok(reclaimed)
}

fn finish_abandoned_teardown(
    ctx: &PassContext<'_>,
    tag: &str,
    aside: &Path,
) -> Option<PackageTeardown> {
    let loader = ctx.layout.tag_loader_path(aside);
    if fs::symlink_metadata(&loader).is_err() {
        return None;
    }
    let tag = match Tag::parse(tag) {
        Ok(tag) => tag,
        Err(err) => {
            tracing::warn!(tag, %err, "rename-aside directory names no valid tag");
            return None;
        }
    };
    tracing::info!(tag = %tag, path = %aside.display(), "finishing interrupted eviction");
    Some(teardown_packages(ctx, &tag, &loader))
}

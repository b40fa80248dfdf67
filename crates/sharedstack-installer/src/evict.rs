use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use sharedstack_core::{
    classify_binding, sort_most_recent_first, BindingDisposition, RetentionPolicy, Tag,
};

use crate::fs_utils::remove_dir_all_if_exists;
use crate::ledger::append_retired_tag;
use crate::local_state::group_by_class;
use crate::{EvictionOutcome, EvictionReport, PackageTeardown, PassContext, WorkAttempt};

/// Tags to evict: everything past each class's keep-count, counting only
/// tags not already retired, plus every installed tag the ledger retires.
pub fn select_evictions(
    installed: &[Tag],
    retired: &BTreeSet<String>,
    policy: &RetentionPolicy,
) -> Vec<Tag> {
    let mut ordered = installed.to_vec();
    sort_most_recent_first(&mut ordered);

    let mut selected = Vec::new();
    for (class, tags) in group_by_class(&ordered) {
        let keep = policy.keep_count(class);
        let mut kept = 0;
        for tag in tags {
            if retired.contains(tag.as_str()) {
                selected.push(tag);
                continue;
            }
            match keep {
                Some(limit) if kept >= limit => selected.push(tag),
                _ => kept += 1,
            }
        }
    }
    selected
}

pub fn evict_tags(ctx: &PassContext<'_>, tags: &[Tag]) -> Vec<EvictionReport> {
    tags.iter()
        .map(|tag| EvictionReport {
            tag: tag.clone(),
            outcome: evict_tag(ctx, tag),
        })
        .collect()
}

/// Retires `tag`: ledger first, then the rename aside, then package
/// teardown from the renamed tree, then removal of that tree.
pub fn evict_tag(ctx: &PassContext<'_>, tag: &Tag) -> EvictionOutcome {
    let layout = ctx.layout;
    let canonical = layout.tag_dir(tag);
    let aside = layout.deleting_dir(tag, WorkAttempt::next());

    if ctx.dry_run {
        println!("+ echo {tag} >> {}", layout.ledger_path().display());
        println!("+ mv {} {}", canonical.display(), aside.display());
        let teardown = teardown_packages(ctx, tag, &layout.tag_loader_path(&canonical));
        println!("+ rm -rf {}", aside.display());
        return EvictionOutcome::Planned { teardown };
    }

    if let Err(err) = append_retired_tag(layout, tag) {
        tracing::warn!(tag = %tag, error = %format!("{err:#}"), "ledger append failed; keeping tag");
        return EvictionOutcome::LedgerWriteFailed {
            reason: format!("{err:#}"),
        };
    }

    match fs::rename(&canonical, &aside) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::info!(tag = %tag, "tag already renamed aside by another run");
            return EvictionOutcome::AlreadyEvicted;
        }
        Err(err) => {
            return EvictionOutcome::Failed {
                reason: format!(
                    "failed to rename {} -> {}: {err}",
                    canonical.display(),
                    aside.display()
                ),
            };
        }
    }

    tracing::info!(tag = %tag, "evicting tag");
    let mut teardown = teardown_packages(ctx, tag, &layout.tag_loader_path(&aside));
    if let Err(err) = remove_dir_all_if_exists(&aside) {
        teardown
            .failures
            .push(format!("failed to remove {}: {err}", aside.display()));
    }
    EvictionOutcome::Evicted { teardown }
}

/// Removes packages only `tag` still annotates and strips `tag` from the
/// rest. Best-effort: every failure is recorded and the walk continues.
pub(crate) fn teardown_packages(ctx: &PassContext<'_>, tag: &Tag, loader: &Path) -> PackageTeardown {
    let mut teardown = PackageTeardown::default();
    let session = match ctx.tooling.open_session(loader) {
        Ok(session) => session,
        Err(err) => {
            teardown
                .failures
                .push(format!("failed to load environment for {tag}: {err:#}"));
            return teardown;
        }
    };
    let bindings = match session.tag_bindings(tag.as_str()) {
        Ok(bindings) => bindings,
        Err(err) => {
            teardown
                .failures
                .push(format!("failed to list packages tagged {tag}: {err:#}"));
            return teardown;
        }
    };

    for binding in &bindings {
        let label = format!("{} {}", binding.package, binding.version);
        let disposition = classify_binding(binding, tag.as_str());
        tracing::debug!(package = %label, disposition = disposition.as_str(), "classified binding");
        match disposition {
            BindingDisposition::NotBound => {}
            BindingDisposition::Exclusive => match session.remove_package(binding) {
                Ok(()) => teardown.removed.push(label),
                Err(err) => teardown.failures.push(format!("remove {label}: {err:#}")),
            },
            BindingDisposition::SharedWithCurrent | BindingDisposition::SharedWithTag(_) => {
                match session.undeclare_tag(tag.as_str(), binding) {
                    Ok(()) => teardown.undeclared.push(label),
                    Err(err) => teardown.failures.push(format!("undeclare {label}: {err:#}")),
                }
            }
        }
    }
    teardown
}

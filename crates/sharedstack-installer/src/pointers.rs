use std::fs;
use std::io;

use anyhow::{Context, Result};
use sharedstack_core::{Tag, TagClass, CURRENT_TAG};

use crate::fs_utils::{remove_file_if_exists, replace_symlink, write_file_atomic};
use crate::local_state::group_by_class;
use crate::tooling::{clone_tag_bindings, ensure_global_tag};
use crate::{BindingPointerReport, LoaderMerge, PassContext, PointerChange, PointerReport};

const LOADER_SOURCE_ORDER: [TagClass; 3] = [TagClass::Weekly, TagClass::Daily, TagClass::Release];

pub fn maintain_pointers(ctx: &PassContext<'_>, live: &[Tag]) -> PointerReport {
    let mut report = PointerReport::default();
    let grouped = group_by_class(live);
    let newest = |class: TagClass| grouped.get(&class).and_then(|tags| tags.first());

    for class in TagClass::ALL {
        let (Some(pointer), Some(tag)) = (class.latest_pointer(), newest(class)) else {
            continue;
        };
        match update_latest_pointer(ctx, pointer, tag) {
            Ok(change) => report.symlinks.push((pointer.to_string(), tag.clone(), change)),
            Err(err) => report.failures.push(format!("{pointer}: {err:#}")),
        }
    }

    let loader_source = LOADER_SOURCE_ORDER.into_iter().find_map(newest);
    match merge_shared_loader(ctx, loader_source, live) {
        Ok(merge) => report.loader = merge,
        Err(err) => report.failures.push(format!("{}: {err:#}", ctx.layout.loader_name())),
    }

    let mut binding_pointers = Vec::new();
    if let Some(weekly) = newest(TagClass::Weekly) {
        binding_pointers.push((CURRENT_TAG, weekly));
    }
    for class in TagClass::ALL {
        if let (Some(pointer), Some(tag)) = (class.latest_pointer(), newest(class)) {
            binding_pointers.push((pointer, tag));
        }
    }
    for (pointer, source) in binding_pointers {
        match refresh_binding_pointer(ctx, pointer, source) {
            Ok(declared) => report.bindings.push(BindingPointerReport {
                pointer: pointer.to_string(),
                source: source.clone(),
                declared,
            }),
            Err(err) => report.failures.push(format!("{pointer} bindings: {err:#}")),
        }
    }

    report
}

pub fn update_latest_pointer(
    ctx: &PassContext<'_>,
    pointer: &str,
    newest: &Tag,
) -> Result<PointerChange> {
    let link = ctx.layout.pointer_path(pointer);
    let wanted = ctx.layout.pointer_target(newest);
    let previous = match fs::read_link(&link) {
        Ok(target) => Some(target),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read pointer {}", link.display()));
        }
    };

    if previous
        .as_deref()
        .is_some_and(|target| target == wanted || target == ctx.layout.root().join(&wanted))
    {
        return Ok(PointerChange::Unchanged);
    }

    if ctx.dry_run {
        println!("+ ln -sfn {} {}", wanted.display(), link.display());
    } else {
        replace_symlink(&wanted, &link)
            .with_context(|| format!("failed to repoint {}", link.display()))?;
        tracing::info!(pointer, tag = %newest, "repointed latest pointer");
    }
    Ok(PointerChange::Repointed { previous })
}

/// Publishes `source`'s staged loader as the shared loader when it differs,
/// keeping the replaced copy as `.bak`. Staged copies left in any live tag
/// are dropped whether or not anything was published.
pub fn merge_shared_loader(
    ctx: &PassContext<'_>,
    source: Option<&Tag>,
    live: &[Tag],
) -> Result<LoaderMerge> {
    let Some(source) = source else {
        return Ok(LoaderMerge::NotStaged);
    };
    let layout = ctx.layout;
    let staged = layout.generated_loader_path(&layout.tag_dir(source));
    let generated = match fs::read(&staged) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            drop_staged_loaders(ctx, live);
            return Ok(LoaderMerge::NotStaged);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", staged.display()));
        }
    };

    let shared = layout.shared_loader_path();
    let published = match fs::read(&shared) {
        Ok(contents) => Some(contents),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", shared.display()));
        }
    };

    if ctx.dry_run {
        if published.as_deref() == Some(generated.as_slice()) {
            return Ok(LoaderMerge::Unchanged);
        }
        println!("+ cp {} {}", staged.display(), shared.display());
        return Ok(LoaderMerge::Published {
            backed_up: published.is_some(),
        });
    }

    let merge = if published.as_deref() == Some(generated.as_slice()) {
        LoaderMerge::Unchanged
    } else {
        let backed_up = match &published {
            Some(previous) => {
                let backup = layout.shared_loader_backup_path();
                write_file_atomic(&backup, previous)
                    .with_context(|| format!("failed to back up {}", shared.display()))?;
                true
            }
            None => false,
        };
        write_file_atomic(&shared, &generated)
            .with_context(|| format!("failed to publish {}", shared.display()))?;
        tracing::info!(tag = %source, backed_up, "published shared loader");
        LoaderMerge::Published { backed_up }
    };

    drop_staged_loaders(ctx, live);
    Ok(merge)
}

fn drop_staged_loaders(ctx: &PassContext<'_>, live: &[Tag]) {
    if ctx.dry_run {
        return;
    }
    for tag in live {
        let copy = ctx.layout.generated_loader_path(&ctx.layout.tag_dir(tag));
        if let Err(err) = remove_file_if_exists(&copy) {
            tracing::warn!(path = %copy.display(), %err, "failed to remove staged loader");
        }
    }
}

fn refresh_binding_pointer(ctx: &PassContext<'_>, pointer: &str, source: &Tag) -> Result<usize> {
    let loader = ctx.layout.tag_loader_path(&ctx.layout.tag_dir(source));
    let session = ctx.tooling.open_session(&loader)?;
    if pointer != CURRENT_TAG && ensure_global_tag(session.as_ref(), pointer)? {
        tracing::info!(pointer, "registered global package tag");
    }
    let declared = clone_tag_bindings(session.as_ref(), source.as_str(), pointer)?;
    if declared > 0 {
        tracing::info!(pointer, source = %source, declared, "cloned package tag bindings");
    }
    Ok(declared)
}

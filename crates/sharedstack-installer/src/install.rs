use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sharedstack_core::Tag;

use crate::artifacts::{stage_generated_loader, write_tag_artifacts};
use crate::fs_utils::{is_destination_taken, remove_dir_all_if_exists, rename_no_replace};
use crate::tooling::{declare_published_tag, install_missing_packages};
use crate::{PassContext, TagInstallOutcome, TagInstallReport, WorkAttempt};

pub fn install_candidates(ctx: &PassContext<'_>, candidates: &[Tag]) -> Vec<TagInstallReport> {
    candidates
        .iter()
        .map(|tag| TagInstallReport {
            tag: tag.clone(),
            outcome: install_tag(ctx, tag),
        })
        .collect()
}

/// Builds `tag` in a private staging directory and publishes it under its
/// canonical name only if no other process got there first. The staging
/// directory is gone when this returns, whatever the outcome.
pub fn install_tag(ctx: &PassContext<'_>, tag: &Tag) -> TagInstallOutcome {
    let canonical = ctx.layout.tag_dir(tag);
    let work_dir = ctx.layout.staging_dir(tag, WorkAttempt::next());

    if ctx.dry_run {
        return match ctx.tooling.bootstrap(tag, &work_dir) {
            Ok(()) => TagInstallOutcome::Planned,
            Err(err) => TagInstallOutcome::Failed {
                reason: format!("{err:#}"),
            },
        };
    }

    if fs::symlink_metadata(&canonical).is_ok() {
        tracing::debug!(tag = %tag, "tag already published by another run");
        return TagInstallOutcome::LostRace;
    }

    if let Err(err) = fs::create_dir(&work_dir) {
        tracing::warn!(tag = %tag, path = %work_dir.display(), %err, "failed to create staging directory");
        return TagInstallOutcome::Failed {
            reason: format!("failed to create staging directory {}: {err}", work_dir.display()),
        };
    }

    tracing::info!(tag = %tag, "installing tag");
    let outcome = match build_and_publish(ctx, tag, &work_dir, &canonical) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(tag = %tag, error = %format!("{err:#}"), "tag install failed");
            TagInstallOutcome::Failed {
                reason: format!("{err:#}"),
            }
        }
    };

    if let Err(err) = remove_dir_all_if_exists(&work_dir) {
        tracing::warn!(path = %work_dir.display(), %err, "failed to remove staging directory");
    }
    outcome
}

fn build_and_publish(
    ctx: &PassContext<'_>,
    tag: &Tag,
    work_dir: &Path,
    canonical: &Path,
) -> Result<TagInstallOutcome> {
    ctx.tooling.bootstrap(tag, work_dir)?;
    stage_generated_loader(ctx.layout, work_dir)?;

    let env_name = {
        let session = ctx
            .tooling
            .open_session(&ctx.layout.generated_loader_path(work_dir))?;
        for product in &ctx.config.products {
            session
                .install_product(tag, product)
                .with_context(|| format!("failed to install {product} for {tag}"))?;
        }
        let manifest = ctx.tooling.tag_manifest(tag)?;
        let declared = declare_published_tag(session.as_ref(), tag.as_str(), &manifest)
            .with_context(|| format!("failed to apply package tag {tag}"))?;
        tracing::info!(tag = %tag, declared, "applied package tag");
        let added = install_missing_packages(session.as_ref(), &ctx.config.developer_packages)?;
        if !added.is_empty() {
            tracing::info!(tag = %tag, packages = %added.join(","), "installed developer packages");
        }
        session.env_name().to_string()
    };

    write_tag_artifacts(
        ctx.layout,
        work_dir,
        &ctx.config.env_name_variable,
        &env_name,
        tag,
    )?;

    match rename_no_replace(work_dir, canonical) {
        Ok(()) => {
            tracing::info!(tag = %tag, env = %env_name, "published tag");
            Ok(TagInstallOutcome::Installed { env_name })
        }
        Err(err) if is_destination_taken(&err) => {
            tracing::info!(tag = %tag, "another run published this tag first; discarding ours");
            Ok(TagInstallOutcome::LostRace)
        }
        Err(err) => Err(err).with_context(|| {
            format!(
                "failed to publish {} -> {}",
                work_dir.display(),
                canonical.display()
            )
        }),
    }
}

use std::collections::BTreeSet;

use anyhow::Result;
use sharedstack_core::{StackConfig, Tag};

use crate::evict::{evict_tags, select_evictions};
use crate::install::install_candidates;
use crate::ledger::read_retired_tags;
use crate::local_state::{list_installed_tags, reclaim_abandoned_work};
use crate::pointers::maintain_pointers;
use crate::reconcile::candidate_tags;
use crate::tooling::StackTooling;
use crate::{EvictionReport, PointerReport, ReclaimedWork, StackLayout, TagInstallReport};

#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub config: &'a StackConfig,
    pub layout: &'a StackLayout,
    pub tooling: &'a dyn StackTooling,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub reclaimed: Vec<ReclaimedWork>,
    pub candidates: Vec<Tag>,
    pub installs: Vec<TagInstallReport>,
    pub pointers: PointerReport,
    pub evictions: Vec<EvictionReport>,
}

impl PassReport {
    pub fn has_failures(&self) -> bool {
        self.reclaimed.iter().any(ReclaimedWork::is_failure)
            || self.installs.iter().any(|report| report.outcome.is_failure())
            || !self.pointers.failures.is_empty()
            || self
                .evictions
                .iter()
                .any(|report| report.outcome.is_failure())
    }
}

pub fn run_pass(ctx: &PassContext<'_>, fetched: &BTreeSet<Tag>) -> Result<PassReport> {
    if !ctx.dry_run {
        ctx.layout.ensure_base_dirs()?;
    }

    let reclaimed = reclaim_abandoned_work(ctx)?;
    let retired = read_retired_tags(ctx.layout)?;
    let installed = list_installed_tags(ctx.layout)?;
    let candidates = candidate_tags(fetched, &retired, &installed);
    tracing::info!(
        fetched = fetched.len(),
        retired = retired.len(),
        installed = installed.len(),
        candidates = candidates.len(),
        "reconciled catalog against local state"
    );

    let installs = install_candidates(ctx, &candidates);

    let installed = list_installed_tags(ctx.layout)?;
    let live = installed
        .iter()
        .filter(|tag| !retired.contains(tag.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    let pointers = maintain_pointers(ctx, &live);

    let evictions = evict_tags(
        ctx,
        &select_evictions(&installed, &retired, &ctx.config.retention),
    );

    Ok(PassReport {
        reclaimed,
        candidates,
        installs,
        pointers,
        evictions,
    })
}

mod artifacts;
mod commands;
mod eups;
mod evict;
mod fs_utils;
mod install;
mod layout;
mod ledger;
mod local_state;
mod pass;
mod pointers;
mod reconcile;
mod run_state;
mod tooling;
mod types;

pub use artifacts::{
    read_env_name_record, render_activation_script, render_tag_loader, ACTIVATION_SCRIPT_NAME,
    ENV_NAME_RECORD,
};
pub use commands::{CommandEffect, CommandRunner, CommandSpec};
pub use eups::EupsTooling;
pub use evict::{evict_tag, evict_tags, select_evictions};
pub use fs_utils::{process_is_alive, rename_no_replace};
pub use install::{install_candidates, install_tag};
pub use layout::{StackLayout, WorkAttempt, WorkDirKind};
pub use ledger::{append_retired_tag, read_retired_tags};
pub use local_state::{group_by_class, list_installed_tags, reclaim_abandoned_work};
pub use pass::{run_pass, PassContext, PassReport};
pub use pointers::{maintain_pointers, merge_shared_loader, update_latest_pointer};
pub use reconcile::candidate_tags;
pub use run_state::RunState;
pub use tooling::{
    clone_tag_bindings, declare_published_tag, ensure_global_tag, install_missing_packages,
    PackageSession, StackTooling,
};
pub use types::{
    BindingPointerReport, EvictionOutcome, EvictionReport, LoaderMerge, PackageTeardown,
    PointerChange, PointerReport, ReclaimedWork, TagInstallOutcome, TagInstallReport,
};

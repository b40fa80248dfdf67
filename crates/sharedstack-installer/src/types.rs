use std::path::PathBuf;

use sharedstack_core::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInstallOutcome {
    Installed { env_name: String },
    LostRace,
    Planned,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInstallReport {
    pub tag: Tag,
    pub outcome: TagInstallOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageTeardown {
    pub removed: Vec<String>,
    pub undeclared: Vec<String>,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionOutcome {
    Evicted { teardown: PackageTeardown },
    AlreadyEvicted,
    LedgerWriteFailed { reason: String },
    Planned { teardown: PackageTeardown },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionReport {
    pub tag: Tag,
    pub outcome: EvictionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimedWork {
    pub path: PathBuf,
    pub tag: String,
    /// Set for rename-aside directories whose package teardown had not
    /// finished when their evictor died.
    pub teardown: Option<PackageTeardown>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerChange {
    Unchanged,
    Repointed { previous: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderMerge {
    NotStaged,
    Unchanged,
    Published { backed_up: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPointerReport {
    pub pointer: String,
    pub source: Tag,
    pub declared: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerReport {
    pub symlinks: Vec<(String, Tag, PointerChange)>,
    pub loader: LoaderMerge,
    pub bindings: Vec<BindingPointerReport>,
    pub failures: Vec<String>,
}

impl TagInstallOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl EvictionOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            Self::LedgerWriteFailed { .. } | Self::Failed { .. } => true,
            Self::Evicted { teardown } => !teardown.failures.is_empty(),
            Self::AlreadyEvicted | Self::Planned { .. } => false,
        }
    }
}

impl ReclaimedWork {
    pub fn is_failure(&self) -> bool {
        self.teardown
            .as_ref()
            .is_some_and(|teardown| !teardown.failures.is_empty())
    }
}

impl Default for PointerReport {
    fn default() -> Self {
        Self {
            symlinks: Vec::new(),
            loader: LoaderMerge::NotStaged,
            bindings: Vec::new(),
            failures: Vec::new(),
        }
    }
}

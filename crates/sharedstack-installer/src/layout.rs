use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use sharedstack_core::{StackConfig, Tag};

static NEXT_ATTEMPT_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    root: PathBuf,
    loader_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAttempt {
    pub pid: u32,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkDirKind {
    Installing,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkDirName {
    pub(crate) tag: String,
    pub(crate) kind: WorkDirKind,
    pub(crate) pid: u32,
}

impl WorkAttempt {
    pub fn next() -> Self {
        Self {
            pid: std::process::id(),
            seq: NEXT_ATTEMPT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl fmt::Display for WorkAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pid, self.seq)
    }
}

impl WorkDirKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Deleting => "deleting",
        }
    }
}

impl StackLayout {
    pub fn new(root: impl Into<PathBuf>, loader_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            loader_name: loader_name.into(),
        }
    }

    pub fn from_config(config: &StackConfig) -> Self {
        Self::new(config.root.clone(), config.loader_name.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn loader_name(&self) -> &str {
        &self.loader_name
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.root.join("tag")
    }

    pub fn tag_dir(&self, tag: &Tag) -> PathBuf {
        self.tags_dir().join(tag.as_str())
    }

    pub fn work_dir(&self, tag: &Tag, kind: WorkDirKind, attempt: WorkAttempt) -> PathBuf {
        self.tags_dir()
            .join(format!(".{}.{}-{}", tag.as_str(), kind.as_str(), attempt))
    }

    pub fn staging_dir(&self, tag: &Tag, attempt: WorkAttempt) -> PathBuf {
        self.work_dir(tag, WorkDirKind::Installing, attempt)
    }

    pub fn deleting_dir(&self, tag: &Tag, attempt: WorkAttempt) -> PathBuf {
        self.work_dir(tag, WorkDirKind::Deleting, attempt)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("tags.deleted")
    }

    pub fn pointer_target(&self, tag: &Tag) -> PathBuf {
        Path::new("tag").join(tag.as_str())
    }

    pub fn pointer_path(&self, pointer: &str) -> PathBuf {
        self.root.join(pointer)
    }

    pub fn shared_loader_path(&self) -> PathBuf {
        self.root.join(&self.loader_name)
    }

    pub fn shared_loader_backup_path(&self) -> PathBuf {
        self.root.join(format!("{}.bak", self.loader_name))
    }

    pub fn tag_loader_path(&self, tag_dir: &Path) -> PathBuf {
        tag_dir.join(&self.loader_name)
    }

    pub fn generated_loader_path(&self, tag_dir: &Path) -> PathBuf {
        tag_dir.join(format!("{}.generated", self.loader_name))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".state")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.tags_dir(), self.state_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub(crate) fn parse_work_dir_name(name: &str) -> Option<WorkDirName> {
    let hidden = name.strip_prefix('.')?;
    let (tag, suffix) = hidden.split_once('.')?;
    let (kind, attempt) = if let Some(attempt) = suffix.strip_prefix("installing-") {
        (WorkDirKind::Installing, attempt)
    } else if let Some(attempt) = suffix.strip_prefix("deleting-") {
        (WorkDirKind::Deleting, attempt)
    } else {
        return None;
    };
    let (pid, seq) = attempt.split_once('-')?;
    seq.parse::<u64>().ok()?;
    Some(WorkDirName {
        tag: tag.to_string(),
        kind,
        pid: pid.parse().ok()?,
    })
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

#[derive(Debug)]
pub struct RunState {
    dir: PathBuf,
}

impl RunState {
    pub fn create(base: &Path) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let dir = base.join(format!("run-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create run state: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.join("catalog.json")
    }

    pub fn eups_userdata_dir(&self) -> PathBuf {
        self.dir.join("eups-userdata")
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.dir) {
            tracing::debug!(path = %self.dir.display(), %err, "failed to remove run state");
        }
    }
}

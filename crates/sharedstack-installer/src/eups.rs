use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use sharedstack_catalog::RemoteCatalog;
use sharedstack_core::{parse_binding_line, BootstrapConfig, PackageBinding, StackConfig, Tag};

use crate::commands::{CommandRunner, CommandSpec};
use crate::tooling::{PackageSession, StackTooling};

const EUPS: &str = "eups";
const CONDA: &str = "conda";

#[derive(Debug, Clone)]
pub struct EupsTooling {
    runner: CommandRunner,
    catalog: RemoteCatalog,
    bootstrap: BootstrapConfig,
    root: PathBuf,
    env_name_variable: String,
    userdata_dir: PathBuf,
}

struct EupsSession<'a> {
    runner: &'a CommandRunner,
    env: BTreeMap<String, String>,
    env_name: String,
}

#[derive(Debug, Deserialize)]
struct CondaPackage {
    name: String,
}

impl EupsTooling {
    pub fn new(
        config: &StackConfig,
        runner: CommandRunner,
        catalog: RemoteCatalog,
        userdata_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            catalog,
            bootstrap: config.bootstrap.clone(),
            root: config.root.clone(),
            env_name_variable: config.env_name_variable.clone(),
            userdata_dir: userdata_dir.into(),
        }
    }

    fn capture_loader_env(&self, loader: &Path) -> Result<BTreeMap<String, String>> {
        let spec = CommandSpec::read_only(
            "bash",
            [
                "-c".to_string(),
                r#"source "$1" >/dev/null && env -0"#.to_string(),
                "shared-stack-load".to_string(),
                loader.display().to_string(),
            ],
        );
        let raw = self
            .runner
            .run_raw(&spec)
            .with_context(|| format!("failed to source loader {}", loader.display()))?;
        Ok(parse_env_block(&raw))
    }
}

impl StackTooling for EupsTooling {
    fn bootstrap(&self, tag: &Tag, work_dir: &Path) -> Result<()> {
        let spec = CommandSpec::mutating(
            self.bootstrap.program.clone(),
            self.bootstrap.render_args(tag.as_str(), &self.root),
        )
        .with_current_dir(work_dir);
        self.runner
            .run(&spec)
            .with_context(|| format!("bootstrap failed for {tag}"))?;
        Ok(())
    }

    fn open_session(&self, loader: &Path) -> Result<Box<dyn PackageSession + '_>> {
        let mut env = self.capture_loader_env(loader)?;
        let env_name = env.get(&self.env_name_variable).cloned().ok_or_else(|| {
            anyhow!(
                "loader {} did not export {}",
                loader.display(),
                self.env_name_variable
            )
        })?;
        env.insert(
            "EUPS_USERDATA".to_string(),
            self.userdata_dir.display().to_string(),
        );
        Ok(Box::new(EupsSession {
            runner: &self.runner,
            env,
            env_name,
        }))
    }

    fn tag_manifest(&self, tag: &Tag) -> Result<Vec<PackageBinding>> {
        self.catalog
            .fetch_tag_manifest(tag)
            .with_context(|| format!("failed to fetch version list for {tag}"))
    }
}

impl EupsSession<'_> {
    fn eups<I, S>(&self, mutating: bool, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = std::iter::once("--nolocks".to_string())
            .chain(args.into_iter().map(Into::into))
            .collect::<Vec<_>>();
        let spec = if mutating {
            CommandSpec::mutating(EUPS, args)
        } else {
            CommandSpec::read_only(EUPS, args)
        };
        self.runner.run(&spec.with_env(self.env.clone()))
    }

    fn startup_file(&self) -> Result<PathBuf> {
        let eups_path = self
            .env
            .get("EUPS_PATH")
            .ok_or_else(|| anyhow!("EUPS_PATH is not set in the loaded environment"))?;
        let first = eups_path
            .split(':')
            .find(|entry| !entry.is_empty())
            .ok_or_else(|| anyhow!("EUPS_PATH is empty"))?;
        Ok(Path::new(first).join("site").join("startup.py"))
    }
}

impl PackageSession for EupsSession<'_> {
    fn env_name(&self) -> &str {
        &self.env_name
    }

    fn installed_packages(&self) -> Result<BTreeSet<String>> {
        let spec = CommandSpec::read_only(
            CONDA,
            ["list", "--name", self.env_name.as_str(), "--json"],
        )
        .with_env(self.env.clone());
        let raw = self.runner.run(&spec)?;
        let packages: Vec<CondaPackage> =
            serde_json::from_str(&raw).context("failed to parse conda package listing")?;
        Ok(packages.into_iter().map(|package| package.name).collect())
    }

    fn install_packages(&self, packages: &[String]) -> Result<()> {
        let mut args = vec![
            "install".to_string(),
            "--name".to_string(),
            self.env_name.clone(),
            "--yes".to_string(),
        ];
        args.extend(packages.iter().cloned());
        let spec = CommandSpec::mutating(CONDA, args).with_env(self.env.clone());
        self.runner.run(&spec)?;
        Ok(())
    }

    fn install_product(&self, tag: &Tag, product: &str) -> Result<()> {
        self.eups(
            true,
            ["distrib", "install", "--no-server-tags", "-t", tag.as_str(), product],
        )?;
        Ok(())
    }

    fn product_versions(&self) -> Result<Vec<PackageBinding>> {
        parse_binding_lines(&self.eups(false, ["list", "--raw"])?)
    }

    fn tag_bindings(&self, tag: &str) -> Result<Vec<PackageBinding>> {
        parse_binding_lines(&self.eups(false, ["list", "--raw", "-t", tag])?)
    }

    fn remove_package(&self, binding: &PackageBinding) -> Result<()> {
        self.eups(
            true,
            [
                "remove",
                "--force",
                binding.package.as_str(),
                binding.version.as_str(),
            ],
        )?;
        Ok(())
    }

    fn undeclare_tag(&self, tag: &str, binding: &PackageBinding) -> Result<()> {
        self.eups(
            true,
            [
                "undeclare",
                "-t",
                tag,
                binding.package.as_str(),
                binding.version.as_str(),
            ],
        )?;
        Ok(())
    }

    fn declare_tag(&self, tag: &str, binding: &PackageBinding) -> Result<()> {
        self.eups(
            true,
            [
                "declare",
                "-t",
                tag,
                binding.package.as_str(),
                binding.version.as_str(),
            ],
        )?;
        Ok(())
    }

    fn global_tags(&self) -> Result<BTreeSet<String>> {
        let raw = self.eups(false, ["tags"])?;
        Ok(raw
            .split_whitespace()
            .map(|tag| tag.trim_end_matches(':').to_string())
            .filter(|tag| !tag.is_empty())
            .collect())
    }

    fn register_global_tag(&self, tag: &str) -> Result<()> {
        let startup = self.startup_file()?;
        let line = format!("hooks.config.Eups.globalTags += [\"{tag}\"]\n");
        if self.runner.is_dry_run() {
            println!("+ append '{}' to {}", line.trim_end(), startup.display());
            return Ok(());
        }

        if let Some(parent) = startup.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&startup)
            .with_context(|| format!("failed to open {}", startup.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append {}", startup.display()))?;
        tracing::info!(tag, path = %startup.display(), "registered global tag");
        Ok(())
    }
}

fn parse_binding_lines(raw: &str) -> Result<Vec<PackageBinding>> {
    let mut bindings = Vec::new();
    for line in raw.lines() {
        if let Some(binding) = parse_binding_line(line)? {
            bindings.push(binding);
        }
    }
    Ok(bindings)
}

fn parse_env_block(raw: &[u8]) -> BTreeMap<String, String> {
    raw.split(|byte| *byte == 0)
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (key, value) = entry.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

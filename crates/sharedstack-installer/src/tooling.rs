use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use sharedstack_core::{PackageBinding, Tag};

pub trait StackTooling: Send + Sync {
    fn bootstrap(&self, tag: &Tag, work_dir: &Path) -> Result<()>;

    fn open_session(&self, loader: &Path) -> Result<Box<dyn PackageSession + '_>>;

    fn tag_manifest(&self, tag: &Tag) -> Result<Vec<PackageBinding>>;
}

pub trait PackageSession {
    fn env_name(&self) -> &str;

    fn installed_packages(&self) -> Result<BTreeSet<String>>;

    fn install_packages(&self, packages: &[String]) -> Result<()>;

    fn install_product(&self, tag: &Tag, product: &str) -> Result<()>;

    fn product_versions(&self) -> Result<Vec<PackageBinding>>;

    fn tag_bindings(&self, tag: &str) -> Result<Vec<PackageBinding>>;

    fn remove_package(&self, binding: &PackageBinding) -> Result<()>;

    fn undeclare_tag(&self, tag: &str, binding: &PackageBinding) -> Result<()>;

    fn declare_tag(&self, tag: &str, binding: &PackageBinding) -> Result<()>;

    fn global_tags(&self) -> Result<BTreeSet<String>>;

    fn register_global_tag(&self, tag: &str) -> Result<()>;
}

pub fn install_missing_packages(
    session: &dyn PackageSession,
    wanted: &[String],
) -> Result<Vec<String>> {
    let present = session
        .installed_packages()
        .context("failed to query installed packages")?;
    let missing = wanted
        .iter()
        .filter(|package| !present.contains(package.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return Ok(missing);
    }

    session
        .install_packages(&missing)
        .with_context(|| format!("failed to install {}", missing.join(", ")))?;
    Ok(missing)
}

/// Declares `tag` on every installed `(package, version)` its published
/// version list names. Entries not installed in this environment are
/// skipped. Returns how many declarations were made.
pub fn declare_published_tag(
    session: &dyn PackageSession,
    tag: &str,
    manifest: &[PackageBinding],
) -> Result<usize> {
    ensure_global_tag(session, tag)?;
    let installed = session
        .product_versions()
        .context("failed to list installed products")?;

    let mut declared = 0;
    for entry in manifest {
        let Some(binding) = installed
            .iter()
            .find(|binding| binding.package == entry.package && binding.version == entry.version)
        else {
            tracing::debug!(package = %entry.package, version = %entry.version, "not installed; skipping tag");
            continue;
        };
        if binding.is_tagged(tag) {
            continue;
        }
        session.declare_tag(tag, binding).with_context(|| {
            format!(
                "failed to declare {tag} on {} {}",
                binding.package, binding.version
            )
        })?;
        declared += 1;
    }
    Ok(declared)
}

/// Makes `dest` annotate exactly the package versions `source` annotates,
/// for every package `source` binds. Returns how many declarations were made.
pub fn clone_tag_bindings(session: &dyn PackageSession, source: &str, dest: &str) -> Result<usize> {
    let wanted = session
        .tag_bindings(source)
        .with_context(|| format!("failed to list packages tagged {source}"))?;
    let existing = session
        .tag_bindings(dest)
        .with_context(|| format!("failed to list packages tagged {dest}"))?;

    let mut declared = 0;
    for binding in &wanted {
        if binding.is_tagged(dest) {
            continue;
        }
        for stale in existing
            .iter()
            .filter(|stale| stale.package == binding.package && stale.version != binding.version)
        {
            session.undeclare_tag(dest, stale).with_context(|| {
                format!(
                    "failed to undeclare {dest} from {} {}",
                    stale.package, stale.version
                )
            })?;
        }
        session.declare_tag(dest, binding).with_context(|| {
            format!(
                "failed to declare {dest} on {} {}",
                binding.package, binding.version
            )
        })?;
        declared += 1;
    }
    Ok(declared)
}

pub fn ensure_global_tag(session: &dyn PackageSession, tag: &str) -> Result<bool> {
    let listed = session
        .global_tags()
        .context("failed to list global tags")?;
    if listed.contains(tag) {
        return Ok(false);
    }
    session
        .register_global_tag(tag)
        .with_context(|| format!("failed to register global tag {tag}"))?;
    Ok(true)
}

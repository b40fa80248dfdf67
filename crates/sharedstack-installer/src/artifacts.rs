use std::fs;
use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sharedstack_core::Tag;

use crate::commands::shell_quote;
use crate::fs_utils::write_file_atomic;
use crate::StackLayout;

pub const ACTIVATION_SCRIPT_NAME: &str = "activate.bash";
pub const ENV_NAME_RECORD: &str = "env_name";

pub fn render_tag_loader(
    shared_loader: &Path,
    env_name_variable: &str,
    env_name: &str,
    tag: &Tag,
) -> String {
    format!(
        "# Generated by shared-stack for {tag}.\n\
         export {env_name_variable}={}\n\
         source {}\n",
        shell_quote(env_name),
        shell_quote(&shared_loader.display().to_string()),
    )
}

pub fn render_activation_script(env_name: &str) -> String {
    format!("conda activate {}\n", shell_quote(env_name))
}

pub(crate) fn write_tag_artifacts(
    layout: &StackLayout,
    tag_dir: &Path,
    env_name_variable: &str,
    env_name: &str,
    tag: &Tag,
) -> Result<()> {
    let loader = layout.tag_loader_path(tag_dir);
    let contents = render_tag_loader(
        &layout.shared_loader_path(),
        env_name_variable,
        env_name,
        tag,
    );
    write_file_atomic(&loader, contents.as_bytes())
        .with_context(|| format!("failed to write loader: {}", loader.display()))?;

    let activate = tag_dir.join(ACTIVATION_SCRIPT_NAME);
    write_file_atomic(&activate, render_activation_script(env_name).as_bytes())
        .with_context(|| format!("failed to write activation script: {}", activate.display()))?;

    let record = tag_dir.join(ENV_NAME_RECORD);
    write_file_atomic(&record, format!("{env_name}\n").as_bytes())
        .with_context(|| format!("failed to write environment record: {}", record.display()))?;
    Ok(())
}

pub fn read_env_name_record(tag_dir: &Path) -> Result<Option<String>> {
    let path = tag_dir.join(ENV_NAME_RECORD);
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let name = raw.trim();
            Ok((!name.is_empty()).then(|| name.to_string()))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    }
}

pub(crate) fn stage_generated_loader(layout: &StackLayout, work_dir: &Path) -> Result<()> {
    let produced = layout.tag_loader_path(work_dir);
    if !produced.is_file() {
        bail!(
            "bootstrap did not produce a loader script: {}",
            produced.display()
        );
    }
    let staged = layout.generated_loader_path(work_dir);
    fs::rename(&produced, &staged).with_context(|| {
        format!(
            "failed to stage generated loader {} -> {}",
            produced.display(),
            staged.display()
        )
    })
}

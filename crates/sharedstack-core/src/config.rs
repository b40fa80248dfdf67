use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tag::TagClass;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "SHARED_STACK_CONFIG";
/// Configuration file consulted when the environment variable is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/shared-stack.toml";

/// Immutable settings for one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default = "default_products")]
    pub products: Vec<String>,
    #[serde(default = "default_developer_packages")]
    pub developer_packages: Vec<String>,
    #[serde(default = "default_loader_name")]
    pub loader_name: String,
    #[serde(default = "default_env_name_variable")]
    pub env_name_variable: String,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub program: String,
    pub args: Vec<String>,
}

/// Per-class keep-counts. `None` keeps every installed tag of that class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionPolicy {
    pub weekly: Option<usize>,
    pub daily: Option<usize>,
    pub release: Option<usize>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            program: "newinstall.sh".to_string(),
            args: ["-b", "-S", "-t", "{tag}"]
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
        }
    }
}

impl BootstrapConfig {
    /// Substitutes `{tag}` and `{root}` in the configured arguments.
    pub fn render_args(&self, tag: &str, root: &Path) -> Vec<String> {
        let root = root.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{tag}", tag).replace("{root}", &root))
            .collect()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            weekly: Some(8),
            daily: Some(24),
            release: None,
        }
    }
}

impl RetentionPolicy {
    pub fn keep_count(&self, class: TagClass) -> Option<usize> {
        match class {
            TagClass::Release => self.release,
            TagClass::Weekly => self.weekly,
            TagClass::Daily => self.daily,
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            catalog_url: default_catalog_url(),
            tag_filter: None,
            products: default_products(),
            developer_packages: default_developer_packages(),
            loader_name: default_loader_name(),
            env_name_variable: default_env_name_variable(),
            bootstrap: BootstrapConfig::default(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl StackConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse shared-stack config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Resolves the configuration from `SHARED_STACK_CONFIG`, then the
    /// default path, then built-in defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match fs::metadata(default_path) {
            Ok(_) => Self::load(default_path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to inspect config: {}", default_path.display())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.root.is_absolute() {
            bail!("root must be an absolute path: {}", self.root.display());
        }
        if !(self.catalog_url.starts_with("https://") || self.catalog_url.starts_with("http://")) {
            bail!("catalog_url must be an http(s) URL: {}", self.catalog_url);
        }
        if self.products.is_empty() {
            bail!("products must name at least one top-level product");
        }
        if let Some(product) = self.products.iter().find(|name| name.trim().is_empty()) {
            bail!("product names must not be empty (got '{product}')");
        }
        if self.loader_name.trim().is_empty() || self.loader_name.contains('/') {
            bail!("loader_name must be a plain file name: '{}'", self.loader_name);
        }
        if self.env_name_variable.trim().is_empty() {
            bail!("env_name_variable must not be empty");
        }
        if self.bootstrap.program.trim().is_empty() {
            bail!("bootstrap.program must not be empty");
        }
        if !self.bootstrap.args.iter().any(|arg| arg.contains("{tag}")) {
            bail!("bootstrap.args must pass the tag through a '{{tag}}' placeholder");
        }
        for class in TagClass::ALL {
            if self.retention.keep_count(class) == Some(0) {
                bail!("retention.{} must be at least 1", class.as_str());
            }
        }
        self.tag_filter_regex()?;
        Ok(())
    }

    /// Compiled `tag_filter`, anchored so it must match the whole identifier.
    pub fn tag_filter_regex(&self) -> Result<Option<Regex>> {
        self.tag_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|err| anyhow!("invalid tag_filter '{pattern}': {err}"))
            })
            .transpose()
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/ssd/lsstsw/stack")
}

fn default_catalog_url() -> String {
    "https://eups.lsst.codes/stack/src/tags/".to_string()
}

fn default_products() -> Vec<String> {
    vec!["lsst_distrib".to_string()]
}

fn default_developer_packages() -> Vec<String> {
    [
        "jupyter",
        "pep8",
        "pyflakes",
        "panel",
        "holoviews",
        "hvplot",
        "bokeh",
        "pyviz_comms",
        "fastparquet",
        "numba",
        "dask-jobqueue",
        "ipdb",
        "psycopg2",
    ]
    .into_iter()
    .map(ToOwned::to_owned)
    .collect()
}

fn default_loader_name() -> String {
    "loadLSST.bash".to_string()
}

fn default_env_name_variable() -> String {
    "LSST_CONDA_ENV_NAME".to_string()
}

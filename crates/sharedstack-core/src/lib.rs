mod binding;
mod config;
mod tag;

pub use binding::{classify_binding, parse_binding_line, BindingDisposition, PackageBinding};
pub use config::{BootstrapConfig, RetentionPolicy, StackConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
pub use tag::{sort_most_recent_first, Tag, TagClass, CURRENT_TAG};

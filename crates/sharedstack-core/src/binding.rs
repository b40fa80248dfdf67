use anyhow::{bail, Result};

use crate::tag::CURRENT_TAG;

/// Markers the package manager prints alongside real tags.
const PSEUDO_TAGS: [&str; 1] = ["setup"];

/// One installed `(package, version)` pair and every tag annotating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageBinding {
    pub package: String,
    pub version: String,
    pub tags: Vec<String>,
}

impl PackageBinding {
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }
}

/// What eviction of one tag must do to a package bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingDisposition {
    /// No tag survives the eviction; the package is removed outright.
    Exclusive,
    /// `current` still annotates the package; only the evicted tag is undeclared.
    SharedWithCurrent,
    /// Another live tag still annotates the package; only the evicted tag is undeclared.
    SharedWithTag(String),
    /// The evicted tag does not annotate this package; nothing to do.
    NotBound,
}

impl BindingDisposition {
    pub fn removes_package(&self) -> bool {
        matches!(self, Self::Exclusive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::SharedWithCurrent => "shared-with-current",
            Self::SharedWithTag(_) => "shared-with-tag",
            Self::NotBound => "not-bound",
        }
    }
}

/// A package is exclusive to `evicted` exactly when dropping that one
/// annotation would leave it untagged. Position of the evicted tag among
/// the annotations does not matter.
pub fn classify_binding(binding: &PackageBinding, evicted: &str) -> BindingDisposition {
    if !binding.is_tagged(evicted) {
        return BindingDisposition::NotBound;
    }

    let survivors = binding
        .tags
        .iter()
        .filter(|tag| tag.as_str() != evicted)
        .collect::<Vec<_>>();
    if survivors.is_empty() {
        return BindingDisposition::Exclusive;
    }
    if survivors.iter().any(|tag| tag.as_str() == CURRENT_TAG) {
        return BindingDisposition::SharedWithCurrent;
    }
    BindingDisposition::SharedWithTag(survivors[0].clone())
}

/// Parses one `package|version|tag1:tag2` line of a raw package listing.
/// Blank lines yield `None`.
pub fn parse_binding_line(line: &str) -> Result<Option<PackageBinding>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields = line.split('|').collect::<Vec<_>>();
    let [package, version, tags] = fields.as_slice() else {
        bail!("expected 'package|version|tags' but got '{line}'");
    };
    if package.trim().is_empty() || version.trim().is_empty() {
        bail!("package binding is missing a name or version: '{line}'");
    }

    let mut parsed_tags = Vec::new();
    for tag in tags.split(':').map(str::trim) {
        if tag.is_empty() || PSEUDO_TAGS.contains(&tag) {
            continue;
        }
        if !parsed_tags.iter().any(|existing: &String| existing == tag) {
            parsed_tags.push(tag.to_string());
        }
    }

    Ok(Some(PackageBinding {
        package: package.trim().to_string(),
        version: version.trim().to_string(),
        tags: parsed_tags,
    }))
}

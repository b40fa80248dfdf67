use anyhow::{bail, Result};
use sharedstack_core::PackageBinding;

/// Parses a published `<tag>.list` file into the `(product, version)` pairs
/// the tag names. Lines are `product flavor version`; the header line and
/// `#` comments are skipped.
pub fn parse_tag_manifest(tag: &str, body: &str) -> Result<Vec<PackageBinding>> {
    let header = format!("EUPS distribution {tag} version list");
    let mut entries = Vec::new();
    for (index, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.contains(&header) {
            continue;
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let [product, _flavor, version] = fields.as_slice() else {
            bail!(
                "malformed line {} in version list for {tag}: {line:?}",
                index + 1
            );
        };
        entries.push(PackageBinding {
            package: (*product).to_string(),
            version: (*version).to_string(),
            tags: Vec::new(),
        });
    }
    Ok(entries)
}

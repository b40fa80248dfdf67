mod fetch;
mod listing;
mod manifest;
mod snapshot;

pub use fetch::RemoteCatalog;
pub use listing::parse_catalog_listing;
pub use manifest::parse_tag_manifest;
pub use snapshot::{read_catalog_snapshot, write_catalog_snapshot, CatalogSnapshot};

#[cfg(test)]
mod tests;

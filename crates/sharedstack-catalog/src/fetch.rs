use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use sharedstack_core::{PackageBinding, StackConfig, Tag};

use crate::listing::parse_catalog_listing;
use crate::manifest::parse_tag_manifest;
use crate::snapshot::CatalogSnapshot;

/// The remote listing of published tags.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    url: String,
    filter: Option<Regex>,
}

impl RemoteCatalog {
    pub fn new(url: impl Into<String>, filter: Option<Regex>) -> Self {
        Self {
            url: url.into(),
            filter,
        }
    }

    pub fn from_config(config: &StackConfig) -> Result<Self> {
        Ok(Self::new(config.catalog_url.clone(), config.tag_filter_regex()?))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches and parses the listing. Any transport or HTTP status failure
    /// is returned to the caller; nothing is retried here.
    pub fn fetch(&self) -> Result<CatalogSnapshot> {
        let body = fetch_text(&self.url)?;
        let tags = parse_catalog_listing(&body, self.filter.as_ref())?;
        tracing::info!(url = %self.url, tags = tags.len(), "fetched remote catalog");
        CatalogSnapshot::new(&self.url, &tags)
    }

    pub fn tag_manifest_url(&self, tag: &Tag) -> String {
        format!("{}/{tag}.list", self.url.trim_end_matches('/'))
    }

    pub fn fetch_tag_manifest(&self, tag: &Tag) -> Result<Vec<PackageBinding>> {
        let url = self.tag_manifest_url(tag);
        let body = fetch_text(&url)?;
        let entries = parse_tag_manifest(tag.as_str(), &body)?;
        tracing::debug!(url = %url, entries = entries.len(), "fetched tag version list");
        Ok(entries)
    }
}

fn fetch_text(url: &str) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(None::<Duration>)
        .user_agent(concat!("shared-stack/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("catalog-fetch-failed: failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("catalog-fetch-failed: GET {url}"))?
        .error_for_status()
        .with_context(|| format!("catalog-fetch-failed: GET {url} returned an error status"))?;
    response
        .text()
        .with_context(|| format!("catalog-fetch-failed: failed reading body of {url}"))
}

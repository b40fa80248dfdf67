use std::fs;
use std::path::PathBuf;

use regex::Regex;

use super::*;

const LISTING: &str = r#"<html><head><title>Index of /stack/src/tags</title></head>
<body><h1>Index of /stack/src/tags</h1><table>
<tr><td><a href="../">Parent Directory</a></td></tr>
<tr><td><a href="w_2024_10.list">w_2024_10.list</a></td><td>2024-03-08 04:12</td></tr>
<tr><td><a href="w_2024_09.list">w_2024_09.list</a></td><td>2024-03-01 04:09</td></tr>
<tr><td><a href="d_2024_05_01.list">d_2024_05_01.list</a></td></tr>
<tr><td><a href="v27_0_0_rc2.list">v27_0_0_rc2.list</a></td></tr>
<tr><td><a href="v27_0_0.list">v27_0_0.list</a></td></tr>
<tr><td><a href="sims_w_2024_10.list">sims_w_2024_10.list</a></td></tr>
<tr><td><a href="w_2024.list">w_2024.list</a></td></tr>
<tr><td><a href="d_2024_05.list">d_2024_05.list</a></td></tr>
<tr><td><a href="w_latest.list">w_latest.list</a></td></tr>
<tr><td><a href="README.txt">README.txt</a></td></tr>
</table></body></html>
"#;

fn ids(tags: &std::collections::BTreeSet<sharedstack_core::Tag>) -> Vec<String> {
    tags.iter().map(|tag| tag.as_str().to_string()).collect()
}

fn test_snapshot_path() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    std::env::temp_dir().join(format!("sharedstack-catalog-test-{nanos}.json"))
}

#[test]
fn listing_extracts_well_formed_tags_only() {
    let tags = parse_catalog_listing(LISTING, None).expect("listing must parse");
    assert_eq!(
        ids(&tags),
        vec![
            "v27_0_0_rc2",
            "v27_0_0",
            "w_2024_09",
            "w_2024_10",
            "d_2024_05_01",
        ]
    );
}

#[test]
fn listing_deduplicates_href_and_link_text() {
    let tags = parse_catalog_listing(LISTING, None).expect("listing must parse");
    let weekly = tags
        .iter()
        .filter(|tag| tag.as_str() == "w_2024_10")
        .count();
    assert_eq!(weekly, 1);
}

#[test]
fn listing_applies_anchored_filter() {
    let filter = Regex::new("^(?:w_2024_.*)$").expect("filter must compile");
    let tags = parse_catalog_listing(LISTING, Some(&filter)).expect("listing must parse");
    assert_eq!(ids(&tags), vec!["w_2024_09", "w_2024_10"]);
}

#[test]
fn listing_without_entries_is_empty() {
    let tags = parse_catalog_listing("<html><body>nothing here</body></html>", None)
        .expect("listing must parse");
    assert!(tags.is_empty());
}

#[test]
fn remote_catalog_from_config_compiles_filter() {
    let config = sharedstack_core::StackConfig {
        tag_filter: Some("d_2024_05_.*".to_string()),
        ..sharedstack_core::StackConfig::default()
    };
    let catalog = RemoteCatalog::from_config(&config).expect("catalog must build");
    assert_eq!(catalog.url(), config.catalog_url);
}

#[test]
fn snapshot_round_trips_through_run_state_file() {
    let tags = parse_catalog_listing(LISTING, None).expect("listing must parse");
    let snapshot =
        CatalogSnapshot::new("https://example.test/tags/", &tags).expect("snapshot must build");
    let path = test_snapshot_path();

    write_catalog_snapshot(&path, &snapshot).expect("must write snapshot");
    let loaded = read_catalog_snapshot(&path).expect("must read snapshot");
    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.tags().expect("cached tags must parse"), tags);

    let _ = fs::remove_file(&path);
}

#[test]
fn snapshot_rejects_corrupt_cached_tags() {
    let snapshot = CatalogSnapshot {
        version: 1,
        source_url: "https://example.test/tags/".to_string(),
        fetched_at_unix: 0,
        tags: vec!["not-a-tag".to_string()],
    };
    assert!(snapshot.tags().is_err());
}

#[test]
fn tag_manifest_lists_product_versions() {
    let body = "EUPS distribution w_2024_10 version list. Version 1.0\n\
                #product             flavor     version\n\
                #--------------------------------------\n\
                sconsUtils           generic    26.0.0+3\n\
                \n\
                lsst_distrib         generic    g1a2b3c+15\n";

    let entries = parse_tag_manifest("w_2024_10", body).expect("version list must parse");

    let pairs = entries
        .iter()
        .map(|entry| (entry.package.as_str(), entry.version.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![("sconsUtils", "26.0.0+3"), ("lsst_distrib", "g1a2b3c+15")]
    );
    assert!(entries.iter().all(|entry| entry.tags.is_empty()));
}

#[test]
fn tag_manifest_rejects_truncated_lines() {
    let err = parse_tag_manifest("w_2024_10", "afw generic\n").expect_err("must reject");
    assert!(err.to_string().contains("line 1"), "{err}");
}

#[test]
fn tag_manifest_url_sits_beside_the_listing() {
    let catalog = RemoteCatalog::new("https://example.org/stack/src/tags/", None);
    let tag = sharedstack_core::Tag::parse("w_2024_10").expect("tag must parse");
    assert_eq!(
        catalog.tag_manifest_url(&tag),
        "https://example.org/stack/src/tags/w_2024_10.list"
    );
}

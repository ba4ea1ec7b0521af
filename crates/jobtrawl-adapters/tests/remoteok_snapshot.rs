use std::path::{Path, PathBuf};

use chrono::Utc;
use jobtrawl_adapters::{remoteok_adapter, FetchedPage, ListingAdapter, ListingPage, DEFAULT_LISTING_URL};

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/remoteok/sample")
}

#[test]
fn remoteok_listing_matches_golden_snapshot() {
    let html = std::fs::read_to_string(fixture_dir().join("listing.html")).expect("read listing fixture");
    let snapshot = std::fs::read_to_string(fixture_dir().join("snapshot.json")).expect("read snapshot");
    let expected: ListingPage = serde_json::from_str(&snapshot).expect("parse snapshot");

    let adapter = remoteok_adapter(DEFAULT_LISTING_URL).expect("adapter");
    let page = FetchedPage {
        url: DEFAULT_LISTING_URL.to_string(),
        html,
        fetched_at: Utc::now(),
    };
    let actual = adapter.parse_listing(&page).expect("parse listing");

    assert_eq!(actual, expected);
    assert!(actual.jobs.iter().all(|job| !job.title.is_empty() || !job.company.is_empty()));
}

// tests/providers_rss.rs
// The RSS reader hands items through raw; cleanup belongs to normalize_dedup.

use news_scout::ingest::providers::rss::RssSource;
use news_scout::ingest::types::FeedSource;

const FIXTURE: &str = include_str!("fixtures/news_rss.xml");

#[tokio::test]
async fn fixture_decodes_every_item_raw() {
    let src = RssSource::from_fixture("fixture-feed", FIXTURE);
    let items = src.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 7, "reader keeps duplicates and blank titles");

    // Entity-encoded markup survives the reader untouched.
    assert!(items[0].summary.contains("<p>"));
    assert!(!items[0].summary.contains("&nbsp;"));
    assert!(items[0].summary.contains("storm came ashore"));

    // Whitespace-only title is not the reader's problem.
    assert!(items[5].title.trim().is_empty());
    assert_eq!(items[5].link, "https://news.example/empty-title");

    // The budget item is syndicated twice; dedup happens downstream.
    let budget_links = items
        .iter()
        .filter(|i| i.link == "https://news.example/budget")
        .count();
    assert_eq!(budget_links, 2);
}

#[tokio::test]
async fn source_element_overrides_feed_id() {
    let src = RssSource::from_fixture("fixture-feed", FIXTURE);
    let items = src.fetch_latest().await.unwrap();

    assert_eq!(items[0].source, "CoastWire");
    assert_eq!(items[1].source, "Daily Paper");
    // No <source> element: fall back to the configured feed id.
    assert_eq!(items[2].source, "fixture-feed");
}

#[tokio::test]
async fn pub_dates_become_epoch_seconds() {
    let src = RssSource::from_fixture("fixture-feed", FIXTURE);
    let items = src.fetch_latest().await.unwrap();

    assert!(items.iter().all(|i| i.published_at > 0));
    // 09:30 vs 08:45 UTC on the same day.
    assert_eq!(items[0].published_at - items[1].published_at, 45 * 60);
    // The Sunday item is the oldest of the batch.
    let oldest = items.iter().map(|i| i.published_at).min().unwrap();
    assert_eq!(oldest, items[6].published_at);
}

#[tokio::test]
async fn malformed_xml_is_an_error() {
    let src = RssSource::from_fixture("bad", "<rss><channel><item>");
    let err = src.fetch_latest().await.unwrap_err();
    assert!(format!("{err:#}").contains("bad"));
}

#[test]
fn http_mode_builds_without_io() {
    assert!(RssSource::from_url("google-news", "https://news.example/rss").is_ok());
}

// tests/cluster_grouping.rs
// Partition properties of the similarity grouper on larger, messier inputs
// than the unit tests cover.

use news_scout::cluster::group_clusters;
use news_scout::ingest::types::{item_key, NewsItem};

fn item(title: &str, link: &str, ts: u64) -> NewsItem {
    NewsItem {
        source: "test".into(),
        title: title.into(),
        link: link.into(),
        summary: "sum".into(),
        published_at: ts,
        key: item_key(link),
    }
}

/// Ten items: three storm variants, two budget variants, five unrelated.
fn mixed_batch() -> Vec<NewsItem> {
    vec![
        item("Hurricane Nora closes ports along the gulf coast", "https://a/1", 500),
        item("Wildfire forces evacuations in northern hills", "https://a/2", 400),
        item("Hurricane Nora closes ports along gulf coast", "https://a/3", 300),
        item("Parliament passes landmark budget after marathon session", "https://a/4", 450),
        item("Championship final ends in penalty shootout", "https://a/5", 100),
        item("Hurricane Nora closes ports on the gulf coast", "https://a/6", 350),
        item("Parliament passes landmark budget after a marathon session", "https://a/7", 200),
        item("New metro line opens to commuters downtown", "https://a/8", 600),
        item("Astronomers spot record-bright comet", "https://a/9", 700),
        item("Drought pushes grain prices to seasonal high", "https://a/10", 800),
    ]
}

fn partition_links(clusters: &[news_scout::StoryCluster]) -> Vec<Vec<String>> {
    let mut p: Vec<Vec<String>> = clusters
        .iter()
        .map(|c| {
            let mut links: Vec<String> = c.members().map(|m| m.link.clone()).collect();
            links.sort();
            links
        })
        .collect();
    p.sort();
    p
}

#[test]
fn every_item_lands_in_exactly_one_cluster() {
    let items = mixed_batch();
    let mut expected: Vec<String> = items.iter().map(|i| i.link.clone()).collect();
    expected.sort();

    let clusters = group_clusters(items, 0.75, 0);

    let mut seen: Vec<String> = Vec::new();
    for c in &clusters {
        assert!(
            c.related.iter().all(|r| r.key != c.primary.key),
            "related must never contain the primary"
        );
        seen.extend(c.members().map(|m| m.link.clone()));
    }
    seen.sort();
    assert_eq!(seen, expected, "no item lost, none duplicated");
}

#[test]
fn variant_headlines_fold_into_expected_clusters() {
    let clusters = group_clusters(mixed_batch(), 0.75, 0);
    // 3 storm + 2 budget variants fold, 5 singletons remain.
    assert_eq!(clusters.len(), 7);

    let storm = clusters
        .iter()
        .find(|c| c.primary.title.starts_with("Hurricane"))
        .expect("storm cluster");
    assert_eq!(storm.member_count(), 3);
    // Earliest published variant is the primary.
    assert_eq!(storm.primary.link, "https://a/3");

    let budget = clusters
        .iter()
        .find(|c| c.primary.title.starts_with("Parliament"))
        .expect("budget cluster");
    assert_eq!(budget.member_count(), 2);
    assert_eq!(budget.primary.link, "https://a/7");
}

#[test]
fn partition_is_stable_under_permutation() {
    let forward = group_clusters(mixed_batch(), 0.75, 0);

    let mut reversed_input = mixed_batch();
    reversed_input.reverse();
    let reversed = group_clusters(reversed_input, 0.75, 0);

    let mut rotated_input = mixed_batch();
    rotated_input.rotate_left(4);
    let rotated = group_clusters(rotated_input, 0.75, 0);

    assert_eq!(partition_links(&forward), partition_links(&reversed));
    assert_eq!(partition_links(&forward), partition_links(&rotated));
}

#[test]
fn primary_choice_is_permutation_independent() {
    // published_at differs, so the primary is fixed regardless of order.
    let forward = group_clusters(mixed_batch(), 0.75, 0);
    let mut reversed_input = mixed_batch();
    reversed_input.reverse();
    let reversed = group_clusters(reversed_input, 0.75, 0);

    let primary_of = |clusters: &[news_scout::StoryCluster], prefix: &str| {
        clusters
            .iter()
            .find(|c| c.primary.title.starts_with(prefix))
            .map(|c| c.primary.link.clone())
            .unwrap()
    };
    assert_eq!(primary_of(&forward, "Hurricane"), primary_of(&reversed, "Hurricane"));
    assert_eq!(primary_of(&forward, "Parliament"), primary_of(&reversed, "Parliament"));
}

#[test]
fn threshold_one_keeps_everything_separate() {
    // Only byte-identical canonical titles could reach similarity 1.0.
    let clusters = group_clusters(mixed_batch(), 1.0, 0);
    assert_eq!(clusters.len(), 10);
}

#[test]
fn threshold_zero_folds_everything_together() {
    let clusters = group_clusters(mixed_batch(), 0.0, 0);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].member_count(), 10);
    // Earliest published item overall.
    assert_eq!(clusters[0].primary.link, "https://a/5");
}

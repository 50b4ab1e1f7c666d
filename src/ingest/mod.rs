// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{item_key, FeedItem, FeedSource, NewsItem};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// One-time metrics registration for the ingest stage.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scout_items_total", "Items parsed from feed sources.");
        describe_counter!(
            "scout_items_skipped_total",
            "Items dropped during normalization (empty title or missing link)."
        );
        describe_counter!(
            "scout_duplicates_total",
            "Items dropped because their link was already seen this run."
        );
        describe_counter!(
            "scout_source_errors_total",
            "Feed source fetch/parse errors."
        );
        describe_histogram!("scout_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Normalize raw items and collapse duplicate links, first occurrence wins.
/// Items whose title normalizes to empty (or that carry no link, so no key
/// can be derived) are skipped. Returns (kept, skipped_count, dup_count).
pub fn normalize_dedup(raw_items: Vec<FeedItem>) -> (Vec<NewsItem>, usize, usize) {
    let mut skipped = 0usize;
    let mut dups = 0usize;
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw_items.len());

    for it in raw_items {
        let title = normalize_text(&it.title);
        let link = it.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            tracing::debug!(
                target: "scout::ingest",
                source = %it.source,
                link = %it.link,
                "item skipped during normalization"
            );
            skipped += 1;
            continue;
        }

        let key = item_key(&link);
        if !seen_keys.insert(key.clone()) {
            dups += 1;
            continue;
        }

        kept.push(NewsItem {
            source: it.source,
            title,
            summary: normalize_text(&it.summary),
            link,
            published_at: it.published_at,
            key,
        });
    }

    (kept, skipped, dups)
}

/// Fetch from every source, isolating per-source failures.
/// Returns the combined raw items plus one error description per failed source.
pub async fn fetch_all(sources: &[Box<dyn FeedSource>]) -> (Vec<FeedItem>, Vec<String>) {
    ensure_metrics_described();

    let mut raw = Vec::new();
    let mut errors = Vec::new();
    for s in sources {
        match s.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "scout::ingest", error = ?e, source = s.name(), "feed source error");
                counter!("scout_source_errors_total").increment(1);
                errors.push(format!("{}: {e:#}", s.name()));
            }
        }
    }

    (raw, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, link: &str) -> FeedItem {
        FeedItem {
            source: "test".into(),
            title: title.into(),
            link: link.into(),
            summary: "sum".into(),
            published_at: 100,
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>Fed&nbsp;raises</b>   rates ";
        assert_eq!(normalize_text(s), "Fed raises rates");
    }

    #[test]
    fn normalize_text_keeps_plain_text_unchanged() {
        let s = "Markets steady after jobs report";
        assert_eq!(normalize_text(s), s);
        // Second pass is a no-op on its own output.
        assert_eq!(normalize_text(&normalize_text(s)), normalize_text(s));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let items = vec![
            raw("First headline", "https://a.example/1"),
            raw("Second headline", "https://a.example/2"),
            raw("Repeat of first", "https://a.example/1"),
        ];
        let (kept, skipped, dups) = normalize_dedup(items);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "First headline");
        assert_eq!(skipped, 0);
        assert_eq!(dups, 1);
    }

    #[test]
    fn empty_title_or_missing_link_is_skipped() {
        let items = vec![
            raw("   ", "https://a.example/1"),
            raw("<p></p>", "https://a.example/2"),
            raw("Fine", ""),
            raw("Kept", "https://a.example/3"),
        ];
        let (kept, skipped, dups) = normalize_dedup(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Kept");
        assert_eq!(skipped, 3);
        assert_eq!(dups, 0);
    }

    #[test]
    fn normalize_dedup_is_idempotent_on_its_output() {
        let items = vec![
            raw("One story", "https://a.example/1"),
            raw("One story", "https://a.example/1"),
            raw("Other story", "https://a.example/2"),
        ];
        let (first, _, _) = normalize_dedup(items);
        let back: Vec<FeedItem> = first
            .iter()
            .map(|n| FeedItem {
                source: n.source.clone(),
                title: n.title.clone(),
                link: n.link.clone(),
                summary: n.summary.clone(),
                published_at: n.published_at,
            })
            .collect();
        let (second, skipped, dups) = normalize_dedup(back);
        assert_eq!(second, first);
        assert_eq!(skipped, 0);
        assert_eq!(dups, 0);
    }
}

// src/cluster.rs
//! Story clustering: group normalized items that describe the same event.
//!
//! - Similarity: `strsim::normalized_levenshtein` over lowercased titles
//!   (titles are already whitespace-collapsed upstream).
//! - Two items join the same cluster when similarity >= threshold; the
//!   relation is closed transitively with a union-find partition, so the
//!   output partition does not depend on input order.
//! - Primary per cluster: earliest `published_at`, ties by first-seen
//!   position in the input. `related` keeps first-seen order.
//!
//! Pure logic, no I/O; counters for cluster sizes live in the pipeline.

use strsim::normalized_levenshtein;

use crate::ingest::types::NewsItem;

/// Convenience default, tuned for same-story headlines across outlets.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoryCluster {
    pub primary: NewsItem,
    pub related: Vec<NewsItem>,
    pub formed_at: u64,
}

impl StoryCluster {
    pub fn member_count(&self) -> usize {
        1 + self.related.len()
    }

    /// Primary first, then related in first-seen order.
    pub fn members(&self) -> impl Iterator<Item = &NewsItem> {
        std::iter::once(&self.primary).chain(self.related.iter())
    }
}

/// Similarity over canonicalized titles (f64 -> f32, as strsim returns f64).
pub fn title_similarity(a: &str, b: &str) -> f32 {
    normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase()) as f32
}

/// Partition items into story clusters. `formed_at` is stamped from `now`.
pub fn group_clusters(items: Vec<NewsItem>, similarity_threshold: f32, now: u64) -> Vec<StoryCluster> {
    // Param hygiene: keep the threshold inside [0, 1].
    let threshold = similarity_threshold.clamp(0.0, 1.0);

    let n = items.len();
    if n == 0 {
        return Vec::new();
    }

    // Union-find with path halving.
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let canon: Vec<String> = items.iter().map(|it| it.title.to_lowercase()).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let sim = normalized_levenshtein(&canon[i], &canon[j]) as f32;
            if sim >= threshold {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // Collect members per root; groups and their members keep first-seen order.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut slot_by_root: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    for i in 0..n {
        let r = find(&mut parent, i);
        match slot_by_root.get(&r) {
            Some(&s) => groups[s].push(i),
            None => {
                slot_by_root.insert(r, groups.len());
                groups.push(vec![i]);
            }
        }
    }

    let mut slots: Vec<Option<NewsItem>> = items.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        // Earliest published_at wins; min over (ts, idx) breaks ties by input order.
        let Some(&p) = group.iter().min_by_key(|&&i| {
            let ts = slots[i].as_ref().map(|it| it.published_at).unwrap_or(u64::MAX);
            (ts, i)
        }) else {
            continue;
        };
        let Some(primary) = slots[p].take() else {
            continue;
        };
        let related: Vec<NewsItem> = group
            .iter()
            .filter(|&&i| i != p)
            .filter_map(|&i| slots[i].take())
            .collect();
        out.push(StoryCluster {
            primary,
            related,
            formed_at: now,
        });
    }

    tracing::debug!(
        target: "scout::cluster",
        items = n,
        clusters = out.len(),
        threshold,
        "partition complete"
    );
    out
}

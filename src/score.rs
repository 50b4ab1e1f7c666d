// src/score.rs
//! Importance scoring: one judge call per cluster, capped per run.
//!
//! Calls run concurrently in a `JoinSet` (width bounded by the cap) and each
//! carries its cluster index, so results reassemble by cluster identity, not
//! completion order. A failed or timed-out call excludes only its own
//! cluster; siblings are never aborted.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::ai_adapter::DynJudge;
use crate::cluster::StoryCluster;
use crate::report::{ScoredStory, ScoringFailure};

/// What the scorer hands to the report builder.
#[derive(Debug, Default)]
pub struct ScoreOutcome {
    /// Scored clusters, in cluster order.
    pub scored: Vec<ScoredStory>,
    pub failures: Vec<ScoringFailure>,
    /// Clusters that reached the judge, including failed ones.
    pub attempted: usize,
    /// Clusters excluded by the per-run cap (never sent to the judge).
    pub over_cap: usize,
    pub clamped: usize,
}

/// Score up to `max_clusters` clusters. `call_timeout` applies per call.
pub async fn score_clusters(
    clusters: Vec<StoryCluster>,
    judge: DynJudge,
    max_clusters: usize,
    call_timeout: Duration,
) -> ScoreOutcome {
    let mut out = ScoreOutcome {
        over_cap: clusters.len().saturating_sub(max_clusters),
        ..Default::default()
    };
    if out.over_cap > 0 {
        tracing::info!(
            target: "scout::score",
            over_cap = out.over_cap,
            cap = max_clusters,
            "clusters beyond cap excluded from this run"
        );
        counter!("scout_clusters_over_cap_total").increment(out.over_cap as u64);
    }

    let mut set = JoinSet::new();
    for (idx, cluster) in clusters.into_iter().take(max_clusters).enumerate() {
        let judge = Arc::clone(&judge);
        set.spawn(async move {
            let verdict = timeout(
                call_timeout,
                judge.judge(&cluster.primary.title, &cluster.primary.summary),
            )
            .await;
            (idx, cluster, verdict)
        });
    }
    out.attempted = set.len();

    let mut finished = Vec::with_capacity(out.attempted);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(done) => finished.push(done),
            Err(e) => {
                tracing::error!(target: "scout::score", error = ?e, "judge task aborted");
                counter!("scout_judge_failures_total").increment(1);
                out.failures.push(ScoringFailure {
                    title: "<lost>".to_string(),
                    reason: format!("judge task aborted: {e}"),
                });
            }
        }
    }
    // Reassemble by cluster identity.
    finished.sort_by_key(|(idx, _, _)| *idx);

    for (_, cluster, verdict) in finished {
        counter!("scout_judge_calls_total").increment(1);
        match verdict {
            Ok(Ok(raw)) => {
                let raw_score = raw.score;
                let (judgment, was_clamped) = raw.into_judgment();
                if was_clamped {
                    out.clamped += 1;
                    counter!("scout_scores_clamped_total").increment(1);
                    tracing::warn!(
                        target: "scout::score",
                        raw_score,
                        title = %cluster.primary.title,
                        "score out of range, clamped"
                    );
                }
                out.scored.push(ScoredStory { cluster, judgment });
            }
            Ok(Err(e)) => {
                counter!("scout_judge_failures_total").increment(1);
                tracing::warn!(
                    target: "scout::score",
                    error = ?e,
                    title = %cluster.primary.title,
                    "scoring failed"
                );
                out.failures.push(ScoringFailure {
                    title: cluster.primary.title,
                    reason: format!("{e:#}"),
                });
            }
            Err(_) => {
                counter!("scout_judge_failures_total").increment(1);
                tracing::warn!(
                    target: "scout::score",
                    timeout_secs = call_timeout.as_secs(),
                    title = %cluster.primary.title,
                    "scoring timed out"
                );
                out.failures.push(ScoringFailure {
                    title: cluster.primary.title,
                    reason: format!("timed out after {}s", call_timeout.as_secs()),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::{JudgeClient, RawJudgment, TableJudge};
    use crate::ingest::types::NewsItem;
    use std::future::Future;
    use std::pin::Pin;

    fn cluster(title: &str, ts: u64) -> StoryCluster {
        StoryCluster {
            primary: NewsItem {
                source: "test".into(),
                title: title.into(),
                link: format!("https://t.example/{}", title.replace(' ', "-")),
                summary: "sum".into(),
                published_at: ts,
                key: crate::ingest::types::item_key(title),
            },
            related: Vec::new(),
            formed_at: ts,
        }
    }

    const LONG_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn cap_bounds_judge_calls() {
        let clusters: Vec<StoryCluster> = (0..7).map(|i| cluster(&format!("story {i}"), i)).collect();
        let titles: Vec<String> = (0..7).map(|i| format!("story {i}")).collect();
        let judge = Arc::new(TableJudge::with_scores(
            titles.iter().map(|t| (t.as_str(), 6)).collect(),
        ));
        let out = score_clusters(clusters, judge.clone(), 5, LONG_TIMEOUT).await;
        assert_eq!(out.attempted, 5);
        assert_eq!(out.over_cap, 2);
        assert_eq!(out.scored.len(), 5);
        assert_eq!(judge.calls(), 5);
    }

    #[tokio::test]
    async fn single_failure_is_isolated() {
        let clusters: Vec<StoryCluster> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, t)| cluster(t, i as u64))
            .collect();
        let judge = Arc::new(TableJudge::new(vec![
            ("a", Ok(RawJudgment { score: 8, summary: "s".into(), reasoning: "r".into() })),
            ("b", Ok(RawJudgment { score: 3, summary: "s".into(), reasoning: "r".into() })),
            ("c", Err("capability error".to_string())),
            ("d", Ok(RawJudgment { score: 2, summary: "s".into(), reasoning: "r".into() })),
            ("e", Ok(RawJudgment { score: 9, summary: "s".into(), reasoning: "r".into() })),
        ]));
        let out = score_clusters(clusters, judge, 5, LONG_TIMEOUT).await;
        assert_eq!(out.attempted, 5);
        assert_eq!(out.scored.len(), 4);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].title, "c");
        assert!(out.failures[0].reason.contains("capability error"));
    }

    #[tokio::test]
    async fn results_keep_cluster_order() {
        let clusters = vec![cluster("first", 1), cluster("second", 2), cluster("third", 3)];
        let judge = Arc::new(TableJudge::with_scores(vec![
            ("first", 1),
            ("second", 2),
            ("third", 3),
        ]));
        let out = score_clusters(clusters, judge, 5, LONG_TIMEOUT).await;
        let titles: Vec<&str> = out
            .scored
            .iter()
            .map(|s| s.cluster.primary.title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn clamped_scores_are_counted() {
        let clusters = vec![cluster("wild", 1)];
        let judge = Arc::new(TableJudge::with_scores(vec![("wild", 15)]));
        let out = score_clusters(clusters, judge, 5, LONG_TIMEOUT).await;
        assert_eq!(out.clamped, 1);
        assert_eq!(out.scored[0].judgment.score, 10);
    }

    #[tokio::test]
    async fn all_failures_leave_scored_empty() {
        let clusters = vec![cluster("x", 1), cluster("y", 2)];
        let judge = Arc::new(TableJudge::new(vec![
            ("x", Err("down".to_string())),
            ("y", Err("down".to_string())),
        ]));
        let out = score_clusters(clusters, judge, 5, LONG_TIMEOUT).await;
        assert!(out.scored.is_empty());
        assert_eq!(out.failures.len(), 2);
        assert_eq!(out.attempted, 2);
    }

    /// One slow title, instant otherwise.
    struct SlowJudge {
        slow_title: String,
    }

    impl JudgeClient for SlowJudge {
        fn judge<'a>(
            &'a self,
            title: &'a str,
            _summary: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<RawJudgment>> + Send + 'a>> {
            let slow = title == self.slow_title;
            Box::pin(async move {
                if slow {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok(RawJudgment {
                    score: 6,
                    summary: "s".into(),
                    reasoning: "r".into(),
                })
            })
        }
        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn timeout_hits_only_the_slow_cluster() {
        let clusters = vec![cluster("fast one", 1), cluster("slow one", 2), cluster("fast two", 3)];
        let judge = Arc::new(SlowJudge {
            slow_title: "slow one".into(),
        });
        let out = score_clusters(clusters, judge, 5, Duration::from_millis(20)).await;
        assert_eq!(out.scored.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].title, "slow one");
        assert!(out.failures[0].reason.contains("timed out"));
    }
}

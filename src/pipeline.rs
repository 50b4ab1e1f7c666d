// src/pipeline.rs
//! One scout run: fetch -> normalize -> cluster -> score -> build -> store.
//!
//! Each run is self-contained; nothing is shared across runs. Only systemic
//! failures (no feed reachable, or every judge call failing) abort a run;
//! per-cluster failures land in the report diagnostics.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::fmt;
use std::time::Duration;

use crate::ai_adapter::DynJudge;
use crate::cluster::group_clusters;
use crate::config::ScoutConfig;
use crate::ingest::types::FeedSource;
use crate::ingest::{fetch_all, normalize_dedup};
use crate::report::{build_report, RunDiagnostics, ScoutReport};
use crate::score::score_clusters;
use crate::sink::ReportSink;

/// Stages of a single run. `Failed` is terminal and reached only on
/// systemic errors; per-cluster scoring failures stay inside `Scoring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Fetching,
    Normalizing,
    Grouping,
    Scoring,
    Building,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Idle => "idle",
            RunStage::Fetching => "fetching",
            RunStage::Normalizing => "normalizing",
            RunStage::Grouping => "grouping",
            RunStage::Scoring => "scoring",
            RunStage::Building => "building",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn advance(stage: &mut RunStage, next: RunStage) {
    tracing::debug!(target: "scout::pipeline", from = %stage, to = %next, "stage transition");
    *stage = next;
}

/// Systemic failures that abort a run. Everything else is diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("no feed source reachable: {0}")]
    FeedUnavailable(String),
    #[error("reasoning capability unreachable: all {attempted} judge call(s) failed; last: {last_reason}")]
    ScoringUnavailable {
        attempted: usize,
        last_reason: String,
    },
}

/// A completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: ScoutReport,
    pub stage: RunStage,
}

/// One-time metrics registration for run-level series.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scout_runs_total", "Completed scout runs.");
        describe_counter!("scout_runs_failed_total", "Runs aborted by a systemic failure.");
        describe_counter!("scout_clusters_total", "Story clusters formed.");
        describe_counter!(
            "scout_clusters_over_cap_total",
            "Clusters excluded by the per-run cap."
        );
        describe_counter!("scout_judge_calls_total", "Judge calls issued.");
        describe_counter!(
            "scout_judge_failures_total",
            "Judge calls that failed or timed out."
        );
        describe_counter!(
            "scout_scores_clamped_total",
            "Judgments with out-of-range scores clamped to 0-10."
        );
        describe_counter!("scout_reports_written_total", "Reports persisted by the file sink.");
        describe_gauge!("scout_last_run_ts", "Unix timestamp of the most recent scheduler tick.");
        describe_histogram!("scout_run_ms", "Scout run duration in milliseconds.");
    });
}

/// Run the pipeline once. Empty input is not an error: zero usable items
/// flow through to a valid empty report.
pub async fn run_scout_once(
    cfg: &ScoutConfig,
    sources: &[Box<dyn FeedSource>],
    judge: DynJudge,
    sink: &dyn ReportSink,
) -> Result<RunOutcome, ScoutError> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let mut stage = RunStage::Idle;

    // 1) Fetch, isolating per-source failures. All sources failing is systemic.
    advance(&mut stage, RunStage::Fetching);
    if sources.is_empty() {
        tracing::warn!(target: "scout::pipeline", "no feed sources configured");
    }
    let (raw, source_errors) = fetch_all(sources).await;
    if !sources.is_empty() && source_errors.len() == sources.len() {
        advance(&mut stage, RunStage::Failed);
        counter!("scout_runs_failed_total").increment(1);
        return Err(ScoutError::FeedUnavailable(source_errors.join("; ")));
    }
    let items_fetched = raw.len();

    // 2) Normalize + dedup.
    advance(&mut stage, RunStage::Normalizing);
    let (items, skipped, dups) = normalize_dedup(raw);
    counter!("scout_items_skipped_total").increment(skipped as u64);
    counter!("scout_duplicates_total").increment(dups as u64);
    let mut diagnostics = RunDiagnostics {
        items_fetched,
        items_skipped: skipped,
        duplicates_dropped: dups,
        ..Default::default()
    };
    if items.is_empty() {
        tracing::info!(target: "scout::pipeline", fetched = items_fetched, "no usable items this run");
    }

    let now = chrono::Utc::now();
    let now_unix = now.timestamp().max(0) as u64;

    // 3) Group into story clusters.
    advance(&mut stage, RunStage::Grouping);
    let clusters = group_clusters(items, cfg.similarity_threshold, now_unix);
    diagnostics.clusters_formed = clusters.len();
    counter!("scout_clusters_total").increment(clusters.len() as u64);

    // 4) Score, capped and fault-isolated per cluster.
    advance(&mut stage, RunStage::Scoring);
    let outcome = score_clusters(
        clusters,
        judge,
        cfg.max_clusters,
        Duration::from_secs(cfg.judge_timeout_secs),
    )
    .await;
    if outcome.attempted > 0 && outcome.scored.is_empty() {
        let last_reason = outcome
            .failures
            .last()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "unknown".to_string());
        advance(&mut stage, RunStage::Failed);
        counter!("scout_runs_failed_total").increment(1);
        return Err(ScoutError::ScoringUnavailable {
            attempted: outcome.attempted,
            last_reason,
        });
    }
    diagnostics.clusters_over_cap = outcome.over_cap;
    diagnostics.scores_clamped = outcome.clamped;
    diagnostics.scoring_failures = outcome.failures;

    // 5) Assemble and hand off. A sink error is logged, not fatal: the
    //    report is still returned to the caller.
    advance(&mut stage, RunStage::Building);
    let report = build_report(
        now,
        outcome.attempted,
        outcome.scored,
        cfg.score_threshold,
        diagnostics,
    );
    if let Err(e) = sink.store(&report).await {
        tracing::error!(target: "scout::pipeline", error = ?e, "report sink failed");
    }

    advance(&mut stage, RunStage::Done);
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    counter!("scout_runs_total").increment(1);
    histogram!("scout_run_ms").record(ms);
    tracing::info!(
        target: "scout::pipeline",
        analyzed = report.total_analyzed,
        important = report.important_count,
        failures = report.diagnostics.scoring_failures.len(),
        clamped = report.diagnostics.scores_clamped,
        ms = ms as u64,
        "scout run complete"
    );

    Ok(RunOutcome { report, stage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_render_lowercase() {
        assert_eq!(RunStage::Idle.to_string(), "idle");
        assert_eq!(RunStage::Scoring.to_string(), "scoring");
        assert_eq!(RunStage::Failed.to_string(), "failed");
    }

    #[test]
    fn errors_render_with_context() {
        let e = ScoutError::FeedUnavailable("gnews: connect timeout".into());
        assert!(e.to_string().contains("gnews"));
        let e = ScoutError::ScoringUnavailable {
            attempted: 3,
            last_reason: "timed out after 20s".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("all 3 judge call(s) failed"));
        assert!(msg.contains("timed out"));
    }
}

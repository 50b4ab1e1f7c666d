// src/report.rs
//! Report assembly: pure, testable logic that turns scored clusters into the
//! run report. No I/O here; persistence lives in `sink`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai_adapter::Judgment;
use crate::cluster::StoryCluster;

/// Cluster plus the verdict it earned. The unit the report is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredStory {
    pub cluster: StoryCluster,
    pub judgment: Judgment,
}

/// Per-cluster scoring failure kept for run diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoringFailure {
    pub title: String,
    pub reason: String,
}

/// Anomaly counts attached to every report so a partial run is never silent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub items_fetched: usize,
    pub items_skipped: usize,
    pub duplicates_dropped: usize,
    pub clusters_formed: usize,
    pub clusters_over_cap: usize,
    pub scores_clamped: usize,
    pub below_threshold: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scoring_failures: Vec<ScoringFailure>,
}

impl RunDiagnostics {
    pub fn has_anomalies(&self) -> bool {
        self.scores_clamped > 0 || !self.scoring_failures.is_empty()
    }
}

/// One pipeline run's output. Immutable once assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutReport {
    pub generated_at: DateTime<Utc>,
    /// Clusters that reached the scorer, including failed ones.
    pub total_analyzed: usize,
    pub important_count: usize,
    /// Important stories only, ordered by score desc, then published_at desc.
    pub stories: Vec<ScoredStory>,
    pub diagnostics: RunDiagnostics,
}

/// Assemble the report. Cannot fail on valid inputs; an empty important
/// list is a valid outcome.
pub fn build_report(
    generated_at: DateTime<Utc>,
    total_analyzed: usize,
    scored: Vec<ScoredStory>,
    score_threshold: u8,
    mut diagnostics: RunDiagnostics,
) -> ScoutReport {
    // 1) Partition by threshold
    let (mut important, rest): (Vec<ScoredStory>, Vec<ScoredStory>) = scored
        .into_iter()
        .partition(|s| s.judgment.score >= score_threshold);
    diagnostics.below_threshold = rest.len();

    // 2) Total order: score desc, ties by primary published_at desc.
    //    Stable sort keeps scorer order for full ties.
    important.sort_by(|a, b| {
        b.judgment
            .score
            .cmp(&a.judgment.score)
            .then_with(|| b.cluster.primary.published_at.cmp(&a.cluster.primary.published_at))
    });

    ScoutReport {
        generated_at,
        total_analyzed,
        important_count: important.len(),
        stories: important,
        diagnostics,
    }
}

/// Console rendering used by the agent binary after each run.
pub fn render_console(report: &ScoutReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Analyzed {} clusters\nFound {} important stories:\n",
        report.total_analyzed, report.important_count
    ));

    for story in &report.stories {
        out.push_str(&format!(
            "\nScore: {}/10\nTitle: {}\nSummary: {}\n",
            story.judgment.score, story.cluster.primary.title, story.judgment.summary
        ));
        if !story.judgment.reasoning.is_empty() {
            out.push_str(&format!("Reasoning: {}\n", story.judgment.reasoning));
        }
        out.push_str(&format!("Link: {}\n", story.cluster.primary.link));
        for rel in &story.cluster.related {
            out.push_str(&format!("Related: {}\n", rel.link));
        }
        out.push_str(&"-".repeat(80));
        out.push('\n');
    }

    let d = &report.diagnostics;
    if d.has_anomalies() {
        out.push_str(&format!(
            "\nAnomalies: {} scoring failure(s), {} clamped score(s)\n",
            d.scoring_failures.len(),
            d.scores_clamped
        ));
        for f in &d.scoring_failures {
            out.push_str(&format!("  failed: {} ({})\n", f.title, f.reason));
        }
    }

    out
}

// src/evaluate.rs
//! Offline quality audit of saved reports: one LLM-as-judge call per story,
//! grading the scout's judgment on five 1-5 criteria. Per-story failures are
//! isolated, same as scoring failures in the pipeline.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ai_adapter::{extract_json_object, ChatProvider};
use crate::report::{ScoredStory, ScoutReport};

pub const DEFAULT_EVALUATIONS_DIR: &str = "evaluations";

/// One graded criterion, 1-5.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: u8,
    pub reasoning: String,
}

/// Grades for one story's judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEvaluation {
    pub story_title: String,
    pub overall_score: f64,
    pub scores: Vec<CriterionScore>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
}

/// A story whose evaluation call failed; kept so the report is never a
/// silent partial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationFailure {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    /// Stories in the scout report, including ones whose evaluation failed.
    pub total_stories: usize,
    /// Average of overall scores, two decimals. 0 when nothing evaluated.
    pub average_score: f64,
    pub evaluations: Vec<StoryEvaluation>,
    pub overall_feedback: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EvaluationFailure>,
}

// ------------------------------------------------------------
// Prompting + response parsing
// ------------------------------------------------------------

const EVAL_SYSTEM_PROMPT: &str = "You are an expert evaluator assessing the quality of news story analysis performed by an AI assistant editor.\n\
\n\
Evaluate how well the AI analyzed one story, on these criteria:\n\
1. Importance Score Accuracy (1-5): is the 0-10 importance score appropriate? Consider impact, novelty, and public interest.\n\
2. Summary Quality (1-5): is the one-sentence summary clear, concise, and does it capture the story's significance?\n\
3. Reasoning Clarity (1-5): is the reasoning behind the score logical, specific, and well-justified?\n\
4. Consistency (1-5): does the importance score align with the summary and reasoning?\n\
5. Relevance (1-5): did the AI correctly decide whether this is truly important news?\n\
\n\
For each criterion give a score from 1-5 (5 = excellent, 1 = poor) and a one-line reason.\n\
Also give an overall score (average of the criteria), 2-3 key strengths, 2-3 key weaknesses, and actionable suggestions.\n\
\n\
Return ONLY a valid JSON object in this format:\n\
{\"overall_score\": 4.2, \"scores\": [{\"criterion\": \"Importance Score Accuracy\", \"score\": 4, \"reasoning\": \"one line\"}], \"strengths\": [\"...\"], \"weaknesses\": [\"...\"], \"suggestions\": [\"...\"]}";

fn eval_user_prompt(story: &ScoredStory) -> String {
    let primary = &story.cluster.primary;
    let published = if primary.published_at > 0 {
        DateTime::from_timestamp(primary.published_at as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        "unknown".to_string()
    };
    format!(
        "Please evaluate this story analysis:\n\n\
ORIGINAL STORY:\n\
Title: {}\n\
Source: {}\n\
Published: {}\n\
Related coverage: {} similar article(s)\n\n\
AI ANALYSIS:\n\
Importance score: {}/10\n\
Summary: {}\n\
Reasoning: {}\n\n\
Evaluate the quality of this analysis on the criteria provided.",
        primary.title,
        primary.source,
        published,
        story.cluster.related.len(),
        story.judgment.score,
        story.judgment.summary,
        story.judgment.reasoning,
    )
}

#[derive(Debug, Deserialize)]
struct WireEvaluation {
    overall_score: f64,
    scores: Vec<CriterionScore>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Parse an evaluator reply. Same JSON-salvage rules as the judge; any shape
/// violation is an error so the caller can record a per-story failure.
pub fn parse_story_evaluation(title: &str, text: &str) -> Result<StoryEvaluation> {
    let json =
        extract_json_object(text).ok_or_else(|| anyhow!("no JSON object in evaluator reply"))?;
    let wire: WireEvaluation =
        serde_json::from_str(json).context("malformed evaluation JSON")?;
    if wire.scores.is_empty() {
        bail!("evaluation missing criterion scores");
    }
    if !wire.overall_score.is_finite() {
        bail!("evaluation overall_score is not a number");
    }
    Ok(StoryEvaluation {
        story_title: title.to_string(),
        overall_score: wire.overall_score.clamp(1.0, 5.0),
        scores: wire
            .scores
            .into_iter()
            .map(|mut c| {
                c.score = c.score.clamp(1, 5);
                c
            })
            .collect(),
        strengths: wire.strengths,
        weaknesses: wire.weaknesses,
        suggestions: wire.suggestions,
    })
}

// ------------------------------------------------------------
// Evaluation run
// ------------------------------------------------------------

/// Grade every story in one scout report. A failed evaluator call skips that
/// story and is kept in `failures`; it never aborts the rest.
pub async fn evaluate_report(report: &ScoutReport, chat: &dyn ChatProvider) -> EvaluationReport {
    let mut evaluations = Vec::with_capacity(report.stories.len());
    let mut failures = Vec::new();

    for story in &report.stories {
        let title = story.cluster.primary.title.clone();
        let user = eval_user_prompt(story);
        let outcome = match chat.complete(EVAL_SYSTEM_PROMPT, &user).await {
            Ok(text) => parse_story_evaluation(&title, &text),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(eval) => evaluations.push(eval),
            Err(e) => {
                tracing::warn!(
                    target: "scout::evaluate",
                    error = ?e,
                    title = %title,
                    "story evaluation failed"
                );
                failures.push(EvaluationFailure {
                    title,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    let average = average_score(&evaluations);
    let feedback = overall_feedback(&evaluations, average);
    EvaluationReport {
        evaluated_at: Utc::now(),
        total_stories: report.stories.len(),
        average_score: average,
        evaluations,
        overall_feedback: feedback,
        failures,
    }
}

// ------------------------------------------------------------
// Aggregation (pure)
// ------------------------------------------------------------

/// Average of overall scores, rounded to two decimals. 0 for no evaluations.
pub fn average_score(evaluations: &[StoryEvaluation]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    let sum: f64 = evaluations.iter().map(|e| e.overall_score).sum();
    round2(sum / evaluations.len() as f64)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn performance_label(average: f64) -> &'static str {
    if average >= 4.5 {
        "excellent"
    } else if average >= 4.0 {
        "very good"
    } else if average >= 3.5 {
        "good"
    } else if average >= 3.0 {
        "satisfactory"
    } else {
        "needs improvement"
    }
}

/// Feedback text: performance line plus up to 5 distinct strengths and
/// weaknesses across all evaluations, first-seen order.
pub fn overall_feedback(evaluations: &[StoryEvaluation], average: f64) -> String {
    let mut out = format!(
        "Overall performance: {} (average score {:.2}/5.0)\n",
        capitalize_words(performance_label(average)),
        average
    );

    let strengths = distinct_first(evaluations.iter().flat_map(|e| e.strengths.iter()), 5);
    if !strengths.is_empty() {
        out.push_str("\nCommon strengths:\n");
        for s in strengths {
            out.push_str("  - ");
            out.push_str(s);
            out.push('\n');
        }
    }

    let weaknesses = distinct_first(evaluations.iter().flat_map(|e| e.weaknesses.iter()), 5);
    if !weaknesses.is_empty() {
        out.push_str("\nAreas for improvement:\n");
        for w in weaknesses {
            out.push_str("  - ");
            out.push_str(w);
            out.push('\n');
        }
    }

    out
}

fn distinct_first<'a, I: Iterator<Item = &'a String>>(items: I, max: usize) -> Vec<&'a String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for it in items {
        if out.len() >= max {
            break;
        }
        if seen.insert(it.as_str()) {
            out.push(it);
        }
    }
    out
}

fn capitalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ------------------------------------------------------------
// Output
// ------------------------------------------------------------

pub fn evaluation_file_name(ts: &DateTime<Utc>) -> String {
    format!("evaluation_{}.json", ts.format("%Y%m%d_%H%M%S"))
}

/// Write the evaluation under `dir`, tmp file then rename.
pub fn write_evaluation(dir: &Path, report: &EvaluationReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating evaluations dir {}", dir.display()))?;
    let path = dir.join(evaluation_file_name(&report.evaluated_at));
    let json = serde_json::to_string_pretty(report).context("serializing evaluation")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
    tracing::info!(target: "scout::evaluate", path = %path.display(), "evaluation written");
    Ok(path)
}

/// Console rendering used by the evaluate binary.
pub fn render_evaluation(report: &EvaluationReport) -> String {
    let bar = "=".repeat(80);
    let rule = "-".repeat(80);
    let mut out = String::new();
    out.push_str(&format!("{bar}\nEVALUATION REPORT\n{bar}\n"));
    out.push_str(&format!("Evaluated at: {}\n", report.evaluated_at.to_rfc3339()));
    out.push_str(&format!(
        "Stories evaluated: {} of {}\n",
        report.evaluations.len(),
        report.total_stories
    ));
    out.push_str(&format!("Average score: {:.2}/5.0\n\n", report.average_score));
    out.push_str(&report.overall_feedback);

    if !report.evaluations.is_empty() {
        out.push_str(&format!("\nDETAILED EVALUATIONS:\n{rule}\n"));
        for (i, eval) in report.evaluations.iter().enumerate() {
            out.push_str(&format!("\n{}. {}\n", i + 1, eval.story_title));
            out.push_str(&format!("   Overall: {:.1}/5.0\n", eval.overall_score));
            for c in &eval.scores {
                out.push_str(&format!("   - {}: {}/5\n     {}\n", c.criterion, c.score, c.reasoning));
            }
            if !eval.suggestions.is_empty() {
                out.push_str("   Suggestions:\n");
                for s in &eval.suggestions {
                    out.push_str(&format!("     - {s}\n"));
                }
            }
            out.push_str(&rule);
            out.push('\n');
        }
    }

    if !report.failures.is_empty() {
        out.push_str("\nSkipped (evaluation call failed):\n");
        for f in &report.failures {
            out.push_str(&format!("  - {} ({})\n", f.title, f.reason));
        }
    }

    out
}

/// Canned reply used when `SCOUT_AI_MODE=mock` forces the evaluator offline.
pub fn mock_evaluation_reply() -> &'static str {
    r#"{"overall_score": 4.0,
  "scores": [
    {"criterion": "Importance Score Accuracy", "score": 4, "reasoning": "Mock grade (test mode)."},
    {"criterion": "Summary Quality", "score": 4, "reasoning": "Mock grade (test mode)."},
    {"criterion": "Reasoning Clarity", "score": 4, "reasoning": "Mock grade (test mode)."},
    {"criterion": "Consistency", "score": 4, "reasoning": "Mock grade (test mode)."},
    {"criterion": "Relevance", "score": 4, "reasoning": "Mock grade (test mode)."}
  ],
  "strengths": ["Mock strength."],
  "weaknesses": ["Mock weakness."],
  "suggestions": ["Mock suggestion."]}"#
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(overall: f64, strengths: &[&str], weaknesses: &[&str]) -> StoryEvaluation {
        StoryEvaluation {
            story_title: "t".into(),
            overall_score: overall,
            scores: vec![CriterionScore {
                criterion: "Summary Quality".into(),
                score: 4,
                reasoning: "fine".into(),
            }],
            strengths: strengths.iter().map(|s| s.to_string()).collect(),
            weaknesses: weaknesses.iter().map(|s| s.to_string()).collect(),
            suggestions: vec![],
        }
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let evals = vec![eval(4.0, &[], &[]), eval(4.3, &[], &[]), eval(3.9, &[], &[])];
        // (4.0 + 4.3 + 3.9) / 3 = 4.066..
        assert_eq!(average_score(&evals), 4.07);
        assert_eq!(average_score(&[]), 0.0);
    }

    #[test]
    fn performance_labels_hit_their_boundaries() {
        assert_eq!(performance_label(4.5), "excellent");
        assert_eq!(performance_label(4.49), "very good");
        assert_eq!(performance_label(4.0), "very good");
        assert_eq!(performance_label(3.5), "good");
        assert_eq!(performance_label(3.0), "satisfactory");
        assert_eq!(performance_label(2.99), "needs improvement");
    }

    #[test]
    fn feedback_lists_distinct_capped_strengths() {
        let evals = vec![
            eval(4.0, &["clear", "concise", "clear"], &["vague"]),
            eval(4.0, &["specific", "timely", "balanced", "deep"], &[]),
        ];
        let text = overall_feedback(&evals, 4.0);
        assert!(text.contains("Very Good"));
        // 5 distinct strengths max, first-seen order, no repeat of "clear".
        assert_eq!(text.matches("  - ").count(), 6); // 5 strengths + 1 weakness
        assert!(text.contains("- clear\n"));
        assert!(!text.contains("- deep\n"));
        assert!(text.contains("Areas for improvement"));
    }

    #[test]
    fn parse_salvages_and_clamps() {
        let text = format!("Here you go:\n```json\n{}\n```", mock_evaluation_reply());
        let e = parse_story_evaluation("Some story", &text).unwrap();
        assert_eq!(e.story_title, "Some story");
        assert_eq!(e.scores.len(), 5);
        assert_eq!(e.overall_score, 4.0);

        let wild = r#"{"overall_score": 9.5, "scores": [{"criterion": "Relevance", "score": 7, "reasoning": "r"}]}"#;
        let e = parse_story_evaluation("t", wild).unwrap();
        assert_eq!(e.overall_score, 5.0);
        assert_eq!(e.scores[0].score, 5);
    }

    #[test]
    fn parse_rejects_empty_or_prose_replies() {
        assert!(parse_story_evaluation("t", "I refuse.").is_err());
        assert!(parse_story_evaluation("t", r#"{"overall_score": 4.0, "scores": []}"#).is_err());
    }

    #[test]
    fn file_name_is_timestamped() {
        use chrono::TimeZone;
        let ts = Utc.with_ymd_and_hms(2026, 8, 25, 10, 30, 0).unwrap();
        assert_eq!(evaluation_file_name(&ts), "evaluation_20260825_103000.json");
    }
}

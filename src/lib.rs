// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod ai_adapter;
pub mod cluster;
pub mod config;
pub mod evaluate;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod score;
pub mod sink;

// ---- Re-exports for stable public API ----
pub use ai_adapter::{build_judge_from_config, DynJudge, JudgeClient, Judgment, RawJudgment};
pub use cluster::{group_clusters, StoryCluster};
pub use config::ScoutConfig;
pub use pipeline::{run_scout_once, RunOutcome, RunStage, ScoutError};
pub use report::{build_report, render_console, RunDiagnostics, ScoredStory, ScoutReport};
pub use sink::{JsonFileSink, MemorySink, ReportSink};

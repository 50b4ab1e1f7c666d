// src/scheduler.rs
//! Interval loop for the agent binary: run once immediately, then on a fixed
//! tick. A tick that fails systemically is logged and the loop keeps going.

use metrics::gauge;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::ai_adapter::DynJudge;
use crate::config::ScoutConfig;
use crate::ingest::types::FeedSource;
use crate::pipeline::run_scout_once;
use crate::report::render_console;
use crate::sink::ReportSink;

/// Spawn the scouting loop. The first tick completes immediately.
pub fn spawn_scout_scheduler(
    cfg: ScoutConfig,
    sources: Vec<Box<dyn FeedSource>>,
    judge: DynJudge,
    sink: Arc<dyn ReportSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            gauge!("scout_last_run_ts").set(now as f64);

            match run_scout_once(&cfg, &sources, Arc::clone(&judge), sink.as_ref()).await {
                Ok(outcome) => {
                    println!("{}", render_console(&outcome.report));
                    tracing::info!(
                        target: "scout::scheduler",
                        analyzed = outcome.report.total_analyzed,
                        important = outcome.report.important_count,
                        failures = outcome.report.diagnostics.scoring_failures.len(),
                        "scout tick complete"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "scout::scheduler",
                        error = %e,
                        "scout tick failed, next tick in {}s",
                        cfg.interval_secs
                    );
                }
            }
        }
    })
}

//! News scout agent binary.
//! Runs the scouting pipeline once or on a fixed interval, writing reports
//! to the reports directory and rendering them to the console.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_scout::ai_adapter::{build_judge_from_config, DynJudge};
use news_scout::config::ScoutConfig;
use news_scout::ingest::providers::rss::RssSource;
use news_scout::ingest::types::FeedSource;
use news_scout::pipeline::run_scout_once;
use news_scout::report::render_console;
use news_scout::scheduler::spawn_scout_scheduler;
use news_scout::sink::JsonFileSink;

#[derive(Parser, Debug)]
#[command(name = "news-scout", about = "Scouts news feeds and reports the important stories.")]
struct Args {
    /// Run one scouting pass and exit. Exit code reflects systemic failure.
    #[arg(long)]
    once: bool,

    /// Path to the TOML config file (default: config/scout.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Issue one canned judge call to verify AI wiring, print the verdict,
    /// and exit.
    #[arg(long, conflicts_with = "once")]
    probe_ai: bool,
}

/// Compact tracing to stderr; `RUST_LOG` overrides the default `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_sources(cfg: &ScoutConfig) -> Result<Vec<Box<dyn FeedSource>>> {
    let mut out: Vec<Box<dyn FeedSource>> = Vec::with_capacity(cfg.feeds.len());
    for feed in &cfg.feeds {
        out.push(Box::new(RssSource::from_url(&feed.id, &feed.url)?));
    }
    Ok(out)
}

async fn probe_ai(judge: DynJudge) -> Result<()> {
    let title = "Central bank calls unscheduled meeting after sharp market swings";
    let summary = "Officials will decide on an emergency rate move before markets reopen.";
    println!("Probing judge provider '{}'...", judge.provider_name());
    match judge.judge(title, summary).await {
        Ok(raw) => {
            let (j, _) = raw.into_judgment();
            println!("Judge replied: score {}/10, {}", j.score, j.summary);
        }
        Err(e) => println!("Judge call failed: {e:#}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so config and key resolution can see it.
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => ScoutConfig::load_from_path(path)?,
        None => ScoutConfig::load()?,
    };
    tracing::info!(
        target: "scout::config",
        feeds = cfg.feeds.len(),
        score_threshold = cfg.score_threshold,
        max_clusters = cfg.max_clusters,
        provider = %cfg.ai.provider,
        "configuration loaded"
    );

    let judge = build_judge_from_config(&cfg.ai);
    if args.probe_ai {
        return probe_ai(judge).await;
    }

    let sources = build_sources(&cfg)?;
    if args.once {
        let sink = JsonFileSink::new(&cfg.reports_dir);
        let outcome = run_scout_once(&cfg, &sources, judge, &sink).await?;
        println!("{}", render_console(&outcome.report));
        return Ok(());
    }

    let sink = Arc::new(JsonFileSink::new(&cfg.reports_dir));
    tracing::info!(
        target: "scout::scheduler",
        interval_secs = cfg.interval_secs,
        "news scout started"
    );
    spawn_scout_scheduler(cfg, sources, judge, sink)
        .await
        .context("scheduler task exited")?;
    Ok(())
}

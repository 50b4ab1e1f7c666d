//! Offline evaluator: grades saved scout reports with an LLM-as-judge rubric
//! and writes the grades under evaluations/.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_scout::ai_adapter::{mock_mode, ChatProvider, MockChat, OpenAiChat};
use news_scout::config::ScoutConfig;
use news_scout::evaluate::{
    evaluate_report, mock_evaluation_reply, render_evaluation, write_evaluation,
    DEFAULT_EVALUATIONS_DIR,
};
use news_scout::sink::{list_reports, load_report};

#[derive(Parser, Debug)]
#[command(name = "evaluate", about = "Grades saved scout reports with an LLM-as-judge rubric.")]
struct Args {
    /// Evaluate the newest report in the reports directory (the default).
    #[arg(long)]
    latest: bool,

    /// Evaluate one specific report file.
    #[arg(long, value_name = "FILE", conflicts_with = "latest")]
    file: Option<PathBuf>,

    /// Evaluate the N newest reports.
    #[arg(long, value_name = "N", conflicts_with_all = ["latest", "file"])]
    all: Option<usize>,

    /// Reports directory (default: the configured reports_dir).
    #[arg(long, value_name = "DIR")]
    reports_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn pick_reports(args: &Args, dir: &Path) -> Result<Vec<PathBuf>> {
    if let Some(file) = &args.file {
        if !file.exists() {
            bail!("report file not found: {}", file.display());
        }
        return Ok(vec![file.clone()]);
    }
    let found = list_reports(dir)
        .with_context(|| format!("listing reports in {}", dir.display()))?;
    if found.is_empty() {
        bail!(
            "no scout reports found in {} (run news-scout first)",
            dir.display()
        );
    }
    // --latest is the default; --all N widens the window.
    let take = if args.latest {
        1
    } else {
        args.all.unwrap_or(1).max(1)
    };
    Ok(found.into_iter().take(take).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let cfg = ScoutConfig::load()?;
    let dir = args
        .reports_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.reports_dir));
    let paths = pick_reports(&args, &dir)?;

    let chat: Arc<dyn ChatProvider> = if mock_mode() || cfg.ai.provider == "mock" {
        Arc::new(MockChat {
            fixed: mock_evaluation_reply().to_string(),
        })
    } else {
        Arc::new(OpenAiChat::new(&cfg.ai))
    };

    let mut averages = Vec::new();
    for path in &paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report");
        let report = load_report(path)?;
        if report.stories.is_empty() {
            println!("{name}: no important stories to evaluate, skipping");
            continue;
        }

        println!("Evaluating {name} ({} stories)...", report.stories.len());
        let evaluation = evaluate_report(&report, chat.as_ref()).await;
        println!("{}", render_evaluation(&evaluation));
        let out = write_evaluation(Path::new(DEFAULT_EVALUATIONS_DIR), &evaluation)?;
        println!("Evaluation written to {}", out.display());
        averages.push(evaluation.average_score);
    }

    if averages.len() > 1 {
        let mean = averages.iter().sum::<f64>() / averages.len() as f64;
        println!(
            "\nEvaluated {} reports, mean average score {mean:.2}/5.0",
            averages.len()
        );
    }

    Ok(())
}

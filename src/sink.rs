// src/sink.rs
//! Report persistence. The pipeline only guarantees the report contract;
//! where it lands (file, memory) is the sink's business.

use anyhow::{Context, Result};
use metrics::counter;
use std::path::{Path, PathBuf};

use crate::report::ScoutReport;

#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    /// Persist one report. Called once per completed run.
    async fn store(&self, report: &ScoutReport) -> Result<()>;
}

/// Writes `scout_report_YYYYMMDD_HHMMSS.json` under `dir`, tmp file then
/// rename so readers never see a half-written report.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name_for(ts: &chrono::DateTime<chrono::Utc>) -> String {
        format!("scout_report_{}.json", ts.format("%Y%m%d_%H%M%S"))
    }
}

#[async_trait::async_trait]
impl ReportSink for JsonFileSink {
    async fn store(&self, report: &ScoutReport) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating reports dir {}", self.dir.display()))?;
        let path = self.dir.join(Self::file_name_for(&report.generated_at));
        let json = serde_json::to_string_pretty(report).context("serializing report")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;

        counter!("scout_reports_written_total").increment(1);
        tracing::info!(target: "scout::report", path = %path.display(), "report written");
        Ok(())
    }
}

/// Keeps reports in memory; test double.
pub struct MemorySink {
    pub reports: std::sync::Mutex<Vec<ScoutReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            reports: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn count(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ReportSink for MemorySink {
    async fn store(&self, report: &ScoutReport) -> Result<()> {
        self.reports
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned sink"))?
            .push(report.clone());
        Ok(())
    }
}

// ------------------------------------------------------------
// Saved-report discovery (used by the evaluator binary)
// ------------------------------------------------------------

/// Saved reports, newest first. Timestamped names sort chronologically,
/// so a descending name sort is a descending time sort.
pub fn list_reports<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading reports dir {}", dir.display()))?;
    for e in entries.flatten() {
        let path = e.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if name.starts_with("scout_report_") && name.ends_with(".json") {
            out.push(path);
        }
    }
    out.sort();
    out.reverse();
    Ok(out)
}

pub fn load_report<P: AsRef<Path>>(path: P) -> Result<ScoutReport> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading report {}", path.display()))?;
    let report: ScoutReport =
        serde_json::from_str(&data).with_context(|| format!("parsing report {}", path.display()))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{build_report, RunDiagnostics};
    use chrono::TimeZone;

    fn mk_report(ts: chrono::DateTime<chrono::Utc>) -> ScoutReport {
        build_report(ts, 0, vec![], 5, RunDiagnostics::default())
    }

    #[tokio::test]
    async fn file_sink_writes_named_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let ts = chrono::Utc.with_ymd_and_hms(2026, 8, 25, 10, 30, 0).unwrap();
        sink.store(&mk_report(ts)).await.unwrap();

        let expected = dir.path().join("scout_report_20260825_103000.json");
        assert!(expected.exists());
        let loaded = load_report(&expected).unwrap();
        assert_eq!(loaded.total_analyzed, 0);
        // No tmp leftovers.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn list_reports_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        for (d, h) in [(24, 9), (25, 10), (23, 8)] {
            let ts = chrono::Utc.with_ymd_and_hms(2026, 8, d, h, 0, 0).unwrap();
            sink.store(&mk_report(ts)).await.unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let found = list_reports(dir.path()).unwrap();
        assert_eq!(found.len(), 3);
        let first = found[0].file_name().unwrap().to_str().unwrap().to_string();
        assert!(first.contains("20260825"));
    }

    #[tokio::test]
    async fn memory_sink_collects_reports() {
        let sink = MemorySink::new();
        sink.store(&mk_report(chrono::Utc::now())).await.unwrap();
        sink.store(&mk_report(chrono::Utc::now())).await.unwrap();
        assert_eq!(sink.count(), 2);
    }
}

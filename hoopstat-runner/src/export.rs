//! Report export: timestamped pretty-JSON artifacts.
//!
//! Files are written atomically (temp file + rename) so a reader never sees
//! a half-written report:
//! - `performance_report_{YYYYmmdd_HHMMSS}.json`
//! - `comparison_report_{YYYYmmdd_HHMMSS}.json`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::report::{ComparisonReport, PerformanceReport};

/// `{prefix}_{YYYYmmdd_HHMMSS}.json`
pub fn report_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
    fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        let _ = fs::remove_file(&tmp);
        format!("failed to move report into place at {}", path.display())
    })?;
    Ok(())
}

/// Write a performance report into `dir` (created if missing); returns the path.
pub fn write_report(dir: &Path, report: &PerformanceReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(report_file_name("performance_report", report.generated_at));
    write_json_atomic(&path, report)?;
    info!(path = %path.display(), players = report.players.len(), "performance report exported");
    Ok(path)
}

/// Write a comparison report stamped with `at`; returns the path.
pub fn write_comparison(dir: &Path, report: &ComparisonReport, at: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(report_file_name("comparison_report", at));
    write_json_atomic(&path, report)?;
    info!(path = %path.display(), "comparison report exported");
    Ok(path)
}

/// Read back an exported performance report.
pub fn read_report(path: &Path) -> Result<PerformanceReport> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).context("failed to deserialize PerformanceReport")
}

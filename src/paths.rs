//! Output path resolution for a run and its tasks.
//!
//! Converts arbitrary URLs into filesystem-safe tokens, lays out the
//! per-run directory (log, workbook copy, screenshots), and post-sorts
//! generated report files into `json/` and `html/` subfolders.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::extract::ReportRegion;
use crate::models::Task;

/// Name of the shared run log inside the run directory.
pub const RUN_LOG_FILE: &str = "audit-simplified-data.txt";

/// Convert a URL into a filesystem-safe token.
///
/// The scheme is stripped, every non-alphanumeric run folds to a single
/// `-`, and the result is lowercased with trimmed edges.
pub fn sanitize_url(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let mut token = String::with_capacity(stripped.len());
    let mut pending_dash = false;
    for c in stripped.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !token.is_empty() {
                token.push('-');
            }
            pending_dash = false;
            token.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    token
}

/// Filesystem-safe timestamp naming the run folder, e.g.
/// `08-01-2025-05-53-29-PM`.
pub fn folder_timestamp() -> String {
    Local::now()
        .format("%m-%d-%Y-%I-%M-%S-%p")
        .to_string()
        .to_uppercase()
}

/// Human-readable form of the report's fetch time, e.g.
/// `Aug 1, 2025, 5:54:42 PM`. Falls back to the raw value when it does
/// not parse as RFC 3339.
pub fn format_fetch_timestamp(fetch_time: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(fetch_time) {
        Ok(dt) => dt.format("%b %-d, %Y, %-I:%M:%S %p").to_string(),
        Err(e) => {
            debug!("Unparseable fetch time {:?}: {}", fetch_time, e);
            fetch_time.to_string()
        }
    }
}

/// Paths for one run: created once at startup, shared by every task.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Per-run root directory.
    pub root: PathBuf,
    /// Shared append-only run log.
    pub log_path: PathBuf,
    /// Workbook copy the aggregator mutates.
    pub workbook_path: PathBuf,
    /// Directory for captured screenshots.
    pub screenshot_dir: PathBuf,
}

impl RunPaths {
    /// Create the run directory tree and copy the workbook template into
    /// it. A missing or unreadable template is fatal to the run.
    pub fn prepare(output_root: &Path, template: &Path, timestamp: &str) -> Result<Self> {
        let root = output_root.join(format!("audit-{}", timestamp));
        let screenshot_dir = root.join("screenshot");
        fs::create_dir_all(&screenshot_dir)
            .with_context(|| format!("Failed to create run directory: {}", root.display()))?;

        let log_path = root.join(RUN_LOG_FILE);

        let stamp = Utc::now()
            .format("%Y-%m-%dT%H-%M-%S-%3fZ")
            .to_string();
        let workbook_path = root.join(format!("page-insights-{}.xlsx", stamp));
        fs::copy(template, &workbook_path).with_context(|| {
            format!(
                "Failed to copy workbook template {} into run directory",
                template.display()
            )
        })?;

        debug!("Run directory prepared at {}", root.display());

        Ok(Self {
            root,
            log_path,
            workbook_path,
            screenshot_dir,
        })
    }

    /// Output path prefix the audit engine writes its reports under.
    /// The engine appends `.report.json` and `.report.html`.
    pub fn report_prefix(&self, task: &Task) -> PathBuf {
        self.root
            .join(format!("audit-{}-{}", sanitize_url(&task.url), task.label()))
    }

    /// Target file for a region screenshot of the given task.
    pub fn screenshot_file(&self, task: &Task, region: ReportRegion) -> PathBuf {
        self.screenshot_dir.join(format!(
            "{}-{}-{}.png",
            region.slug(),
            sanitize_url(&task.url),
            task.label()
        ))
    }

    /// Suffix-based post-sort: move every generated `*.report.json` into
    /// `json/` and `*.report.html` into `html/`. Runs once at
    /// finalization, after all tasks have resolved.
    pub fn arrange_files(&self) -> Result<()> {
        let json_dir = self.root.join("json");
        let html_dir = self.root.join("html");
        fs::create_dir_all(&json_dir)?;
        fs::create_dir_all(&html_dir)?;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            let target_dir = if name.ends_with(".report.json") {
                &json_dir
            } else if name.ends_with(".report.html") {
                &html_dir
            } else {
                continue;
            };

            if let Err(e) = fs::rename(entry.path(), target_dir.join(&name)) {
                warn!("Failed to move {} into {}: {}", name, target_dir.display(), e);
            }
        }

        Ok(())
    }
}

/// The json report the engine generates for a prefix.
pub fn json_report_file(prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}.report.json", prefix.display()))
}

/// The html report the engine generates for a prefix.
pub fn html_report_file(prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}.report.html", prefix.display()))
}

//! Per-task audit pipeline.
//!
//! Invoke the engine (with rendering fallback), pull the score out of the
//! generated json report, extract diagnostic evidence from the html
//! report, and append one record to the shared run log. Failures here are
//! caught by the scheduler and never reach sibling tasks.

pub mod invoker;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::extract::{CaptureRequest, DiagnosticExtractor, ReportRegion};
use crate::models::{score_rating, RegionFields, RunRecord, ScreenshotPolicy, Task, SCREENSHOT_SKIPPED};
use crate::paths::{format_fetch_timestamp, html_report_file, json_report_file, RunPaths};
use crate::runlog::RunLogWriter;

pub use invoker::{AuditError, AuditInvoker, RenderMode};

/// Everything a task needs, threaded explicitly through the pipeline.
pub struct RunContext {
    pub paths: RunPaths,
    pub invoker: AuditInvoker,
    pub extractor: Box<dyn DiagnosticExtractor>,
    pub log: RunLogWriter,
    pub policy: ScreenshotPolicy,
}

/// Subset of the engine's json report the pipeline reads.
#[derive(Debug, Deserialize)]
struct EngineReport {
    categories: EngineCategories,
    #[serde(rename = "fetchTime", default)]
    fetch_time: String,
}

#[derive(Debug, Deserialize)]
struct EngineCategories {
    performance: EngineCategory,
}

#[derive(Debug, Deserialize)]
struct EngineCategory {
    /// 0.0 - 1.0 in the report; scaled to 0-100 here.
    score: f64,
}

/// Run one audit end to end and append its record to the run log.
pub async fn run_task(ctx: &RunContext, task: &Task) -> Result<()> {
    println!(
        "\n🚀 Running audit [{}] on {} ({}/{})",
        task.label(),
        task.url,
        task.sequence_index + 1,
        task.total_count
    );

    let prefix = ctx.paths.report_prefix(task);
    let mode = ctx.invoker.run(task, &prefix).await?;
    debug!("[{}] Engine succeeded in {:?} mode", task.label(), mode);

    let json_path = json_report_file(&prefix);
    let content = tokio::fs::read_to_string(&json_path)
        .await
        .with_context(|| format!("Failed to read engine report: {}", json_path.display()))?;
    let report: EngineReport = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse engine report: {}", json_path.display()))?;

    let score = (report.categories.performance.score * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8;
    let timestamp = format_fetch_timestamp(&report.fetch_time);
    let html_path = html_report_file(&prefix);

    let capture = ctx.policy.applies(task.device, task.privacy);
    let diagnostic =
        extract_region(ctx, task, &html_path, ReportRegion::Diagnostics, capture).await;
    let mut audit =
        extract_region(ctx, task, &html_path, ReportRegion::PassedAudits, capture).await;
    // Display text is a diagnostics-only field in the log format.
    audit.display.clear();

    let record = RunRecord {
        timestamp: timestamp.clone(),
        url: task.url.clone(),
        label: task.label(),
        score,
        diagnostic,
        audit,
        html_report_file: html_path.to_string_lossy().to_string(),
        output_dir: ctx.paths.root.to_string_lossy().to_string(),
    };
    ctx.log.append(&record).await?;

    println!("\n📋 Report Summary");
    println!("======================");
    println!("URL: {}", task.url);
    println!("Mode: {}", task.label());
    println!("Date & Time: {}", timestamp);
    println!("Performance Score: {} ({})", score, score_rating(score));

    Ok(())
}

/// Extraction always runs (text first), capture only when the policy
/// allows it. A policy-excluded task carries the skipped sentinel.
async fn extract_region(
    ctx: &RunContext,
    task: &Task,
    html_report: &Path,
    region: ReportRegion,
    capture: bool,
) -> RegionFields {
    let request = if capture {
        CaptureRequest {
            screenshot_path: Some(ctx.paths.screenshot_file(task, region)),
        }
    } else {
        CaptureRequest::default()
    };

    let mut fields = ctx.extractor.extract(html_report, region, &request).await;
    if !capture {
        fields.screenshot_path = SCREENSHOT_SKIPPED.to_string();
    }
    fields
}

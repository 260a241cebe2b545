//! Diagnostic extraction from rendered reports.
//!
//! The DOM scraping itself (browser, selectors) lives outside this crate.
//! It is modeled as a collaborator returning structured fields for a named
//! region of the rendered report, with an optional screenshot of that
//! region. [`ScraperProcessExtractor`] delegates to a configured external
//! scraper tool; [`NullExtractor`] is wired in when none is configured.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{RegionFields, NO_DETAILS};

/// Named section of the rendered report to extract from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRegion {
    /// Improvement opportunities.
    Diagnostics,
    /// Audits the page passed.
    PassedAudits,
}

impl ReportRegion {
    pub fn slug(&self) -> &'static str {
        match self {
            ReportRegion::Diagnostics => "diagnostics",
            ReportRegion::PassedAudits => "audits",
        }
    }
}

/// Screenshot target for one extraction. `None` means the capture policy
/// excluded this task.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub screenshot_path: Option<PathBuf>,
}

/// Contract for the external DOM-scraping collaborator.
///
/// Implementations must extract text before capturing the screenshot so
/// the capture always targets the final rendered region. An absent region
/// yields all-empty fields and a warning; extraction never fails a task.
#[async_trait]
pub trait DiagnosticExtractor: Send + Sync {
    async fn extract(
        &self,
        html_report: &Path,
        region: ReportRegion,
        capture: &CaptureRequest,
    ) -> RegionFields;
}

/// Shape of the scraper tool's stdout.
#[derive(Debug, Default, Deserialize)]
struct ScraperOutput {
    #[serde(default)]
    title: String,
    #[serde(default)]
    display: String,
    #[serde(default)]
    redirect_text: String,
    #[serde(default)]
    redirect_link: String,
}

/// Extractor that shells out to an external scraper tool.
///
/// Invocation: `<scraper_bin> <html-report> --region <slug>
/// [--screenshot <path>]`; the tool prints a JSON object on stdout and
/// writes the screenshot itself when asked to.
pub struct ScraperProcessExtractor {
    scraper_bin: String,
}

impl ScraperProcessExtractor {
    pub fn new(scraper_bin: String) -> Self {
        Self { scraper_bin }
    }
}

#[async_trait]
impl DiagnosticExtractor for ScraperProcessExtractor {
    async fn extract(
        &self,
        html_report: &Path,
        region: ReportRegion,
        capture: &CaptureRequest,
    ) -> RegionFields {
        let mut cmd = tokio::process::Command::new(&self.scraper_bin);
        cmd.arg(html_report).arg("--region").arg(region.slug());
        if let Some(path) = &capture.screenshot_path {
            cmd.arg("--screenshot").arg(path);
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Scraper {} failed to launch for {} region: {}",
                    self.scraper_bin,
                    region.slug(),
                    e
                );
                return RegionFields::default();
            }
        };

        if !output.status.success() {
            warn!(
                "Scraper exited with {} for {} region of {}",
                output.status,
                region.slug(),
                html_report.display()
            );
            return RegionFields::default();
        }

        let parsed: ScraperOutput = match serde_json::from_slice(&output.stdout) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparseable scraper output for {} region: {}", region.slug(), e);
                return RegionFields::default();
            }
        };

        if parsed.title.is_empty() {
            warn!(
                "{} region absent in {}",
                region.slug(),
                html_report.display()
            );
            return RegionFields::default();
        }

        let display = match region {
            ReportRegion::Diagnostics if parsed.display.trim().is_empty() => {
                NO_DETAILS.to_string()
            }
            ReportRegion::Diagnostics => parsed.display.trim().to_string(),
            // The passed-audits region carries no display text.
            ReportRegion::PassedAudits => String::new(),
        };

        let screenshot_path = match &capture.screenshot_path {
            Some(path) if path.exists() => path.to_string_lossy().to_string(),
            Some(path) => {
                warn!("Scraper produced no screenshot at {}", path.display());
                String::new()
            }
            None => String::new(),
        };

        RegionFields {
            title: parsed.title,
            display,
            redirect_text: parsed.redirect_text,
            redirect_link: parsed.redirect_link,
            screenshot_path,
        }
    }
}

/// Extractor used when no scraper tool is configured. Every region reads
/// as absent.
pub struct NullExtractor;

#[async_trait]
impl DiagnosticExtractor for NullExtractor {
    async fn extract(
        &self,
        html_report: &Path,
        region: ReportRegion,
        _capture: &CaptureRequest,
    ) -> RegionFields {
        debug!(
            "No scraper configured; skipping {} region of {}",
            region.slug(),
            html_report.display()
        );
        RegionFields::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_extractor_is_empty() {
        let fields = NullExtractor
            .extract(
                Path::new("/tmp/report.html"),
                ReportRegion::Diagnostics,
                &CaptureRequest::default(),
            )
            .await;
        assert_eq!(fields, RegionFields::default());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scraper_process_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("shot.png");
        let scraper = write_script(
            dir.path(),
            "scraper.sh",
            &format!(
                "touch {}\n\
                 echo '{{\"title\":\"Avoid redirects\",\"display\":\" 780 ms \",\
                 \"redirect_text\":\"docs\",\"redirect_link\":\"https://web.dev/\"}}'",
                shot.display()
            ),
        );

        let extractor = ScraperProcessExtractor::new(scraper);
        let capture = CaptureRequest {
            screenshot_path: Some(shot.clone()),
        };
        let fields = extractor
            .extract(Path::new("/tmp/x.html"), ReportRegion::Diagnostics, &capture)
            .await;

        assert_eq!(fields.title, "Avoid redirects");
        assert_eq!(fields.display, "780 ms");
        assert_eq!(fields.redirect_text, "docs");
        assert_eq!(fields.screenshot_path, shot.to_string_lossy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_display_becomes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = write_script(
            dir.path(),
            "scraper.sh",
            "echo '{\"title\":\"Some audit\",\"display\":\"\"}'",
        );

        let extractor = ScraperProcessExtractor::new(scraper);
        let fields = extractor
            .extract(
                Path::new("/tmp/x.html"),
                ReportRegion::Diagnostics,
                &CaptureRequest::default(),
            )
            .await;
        assert_eq!(fields.display, NO_DETAILS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_absent_region_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = write_script(dir.path(), "scraper.sh", "echo '{}'");

        let extractor = ScraperProcessExtractor::new(scraper);
        let fields = extractor
            .extract(
                Path::new("/tmp/x.html"),
                ReportRegion::PassedAudits,
                &CaptureRequest::default(),
            )
            .await;
        assert_eq!(fields, RegionFields::default());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_scraper_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = write_script(dir.path(), "scraper.sh", "exit 3");

        let extractor = ScraperProcessExtractor::new(scraper);
        let fields = extractor
            .extract(
                Path::new("/tmp/x.html"),
                ReportRegion::Diagnostics,
                &CaptureRequest::default(),
            )
            .await;
        assert_eq!(fields, RegionFields::default());
    }
}

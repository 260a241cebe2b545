//! The shared run log: one block per completed task.
//!
//! This is the wire format the aggregator consumes. Each block is a fixed
//! first line `[timestamp] url - label:` followed by `Label: value` lines
//! in a fixed, versioned order; blocks are separated by a blank line.
//! Reordering fields is a breaking change.
//!
//! Every concurrently-running task in a batch appends to the same file,
//! so appends are serialized through an async mutex and each block goes
//! out in a single write.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{RegionFields, RunRecord};

const F_SCORE: &str = "Score: ";
const F_TIME: &str = "Time: ";
const F_DIAG_TITLE: &str = "Diagnostic Title Text: ";
const F_DIAG_DISPLAY: &str = "Diagnostic Display Text: ";
const F_DIAG_REDIRECT: &str = "Diagnostic Redirect Text: ";
const F_DIAG_REDIRECT_LINK: &str = "Diagnostic Redirect Link Text: ";
const F_DIAG_SCREENSHOT: &str = "Diagnostic Screenshot Path: ";
const F_AUDIT_TITLE: &str = "Audit Title Text: ";
const F_AUDIT_REDIRECT: &str = "Audit Redirect Text: ";
const F_AUDIT_REDIRECT_LINK: &str = "Audit Redirect Link Text: ";
const F_AUDIT_SCREENSHOT: &str = "Audit Screenshot Path: ";
const F_HTML_REPORT: &str = "Html Report Path: ";
const F_OUTPUT_DIR: &str = "Output Report Path: ";

/// Lines per block, header included.
const BLOCK_LINES: usize = 14;

/// Serialized appender for the shared run log.
pub struct RunLogWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RunLogWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    #[allow(dead_code)] // Handy in tests and for callers that log the location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a complete block. Holds the writer lock for
    /// the duration of the write so concurrent tasks never interleave.
    pub async fn append(&self, record: &RunRecord) -> Result<()> {
        let block = format_block(record);

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open run log: {}", self.path.display()))?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Values are single-line by contract; stray newlines would corrupt the
/// block framing, so they are folded to spaces on the way out.
fn clean(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Render a record as one log block, trailing blank line included.
pub fn format_block(record: &RunRecord) -> String {
    format!(
        "[{ts}] {url} - {label}:\n\
         {F_SCORE}{score}\n\
         {F_TIME}{ts}\n\
         {F_DIAG_TITLE}{dt}\n\
         {F_DIAG_DISPLAY}{dd}\n\
         {F_DIAG_REDIRECT}{dr}\n\
         {F_DIAG_REDIRECT_LINK}{drl}\n\
         {F_DIAG_SCREENSHOT}{ds}\n\
         {F_AUDIT_TITLE}{at}\n\
         {F_AUDIT_REDIRECT}{ar}\n\
         {F_AUDIT_REDIRECT_LINK}{arl}\n\
         {F_AUDIT_SCREENSHOT}{as_}\n\
         {F_HTML_REPORT}{html}\n\
         {F_OUTPUT_DIR}{out}\n\n",
        ts = clean(&record.timestamp),
        url = clean(&record.url),
        label = clean(&record.label),
        score = record.score,
        dt = clean(&record.diagnostic.title),
        dd = clean(&record.diagnostic.display),
        dr = clean(&record.diagnostic.redirect_text),
        drl = clean(&record.diagnostic.redirect_link),
        ds = clean(&record.diagnostic.screenshot_path),
        at = clean(&record.audit.title),
        ar = clean(&record.audit.redirect_text),
        arl = clean(&record.audit.redirect_link),
        as_ = clean(&record.audit.screenshot_path),
        html = clean(&record.html_report_file),
        out = clean(&record.output_dir),
    )
}

/// Parse the whole log. Block order is arbitrary; malformed blocks are
/// skipped with a warning and never abort the pass.
pub fn parse_log(content: &str) -> Vec<RunRecord> {
    content
        .trim()
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| match parse_block(block) {
            Some(record) => Some(record),
            None => {
                warn!(
                    "Skipping malformed log block starting with: {:?}",
                    block.lines().next().unwrap_or("")
                );
                None
            }
        })
        .collect()
}

/// Read and parse a log file from disk.
pub fn parse_log_file(path: &Path) -> Result<Vec<RunRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run log: {}", path.display()))?;
    Ok(parse_log(&content))
}

fn parse_block(block: &str) -> Option<RunRecord> {
    let lines: Vec<&str> = block.lines().collect();
    if lines.len() != BLOCK_LINES {
        return None;
    }

    // Header: `[timestamp] url - label:`
    let header = lines[0].strip_prefix('[')?;
    let (timestamp, rest) = header.split_once("] ")?;
    let rest = rest.strip_suffix(':')?;
    let (url, label) = rest.rsplit_once(" - ")?;

    let score: u8 = field(lines[1], F_SCORE)?.parse().ok()?;
    field(lines[2], F_TIME)?;

    let diagnostic = RegionFields {
        title: field(lines[3], F_DIAG_TITLE)?.to_string(),
        display: field(lines[4], F_DIAG_DISPLAY)?.to_string(),
        redirect_text: field(lines[5], F_DIAG_REDIRECT)?.to_string(),
        redirect_link: field(lines[6], F_DIAG_REDIRECT_LINK)?.to_string(),
        screenshot_path: field(lines[7], F_DIAG_SCREENSHOT)?.to_string(),
    };
    let audit = RegionFields {
        title: field(lines[8], F_AUDIT_TITLE)?.to_string(),
        display: String::new(),
        redirect_text: field(lines[9], F_AUDIT_REDIRECT)?.to_string(),
        redirect_link: field(lines[10], F_AUDIT_REDIRECT_LINK)?.to_string(),
        screenshot_path: field(lines[11], F_AUDIT_SCREENSHOT)?.to_string(),
    };

    Some(RunRecord {
        timestamp: timestamp.to_string(),
        url: url.to_string(),
        label: label.to_string(),
        score,
        diagnostic,
        audit,
        html_report_file: field(lines[12], F_HTML_REPORT)?.to_string(),
        output_dir: field(lines[13], F_OUTPUT_DIR)?.to_string(),
    })
}

fn field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    // Empty values serialize without the trailing space.
    line.strip_prefix(prefix)
        .or_else(|| line.strip_prefix(prefix.trim_end()).filter(|v| v.is_empty()))
}

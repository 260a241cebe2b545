//! Report aggregation into the output workbook.
//!
//! Parses the shared run log and places every record into the workbook
//! copy: scores and timestamps on the summary surface, diagnostic
//! evidence, screenshots and report links on the per-segment detail
//! surfaces. The workbook is opened once, mutated in place, and written
//! exactly once; only failing to open or write it is fatal. Everything
//! per-record degrades to a warning.

pub mod coords;

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{info, warn};
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::{Hyperlink, Image, Spreadsheet, Worksheet};

use crate::models::{parse_label, Device, PrivacyMode, RunRecord, SCREENSHOT_SKIPPED};
use crate::runlog::parse_log_file;

pub use coords::CoordinateMap;

/// Summary-surface score/timestamp columns.
const COL_NORMAL: &str = "D";
const COL_INCOGNITO: &str = "E";

/// Detail-surface anchor rows.
const DIAG_TITLE_ROW: u32 = 5;
const DIAG_DISPLAY_ROW: u32 = 6;
const DIAG_REDIRECT_ROW: u32 = 7;
const AUDIT_TITLE_ROW: u32 = 9;
const AUDIT_REDIRECT_ROW: u32 = 10;
const DIAG_IMAGE_ROW: u32 = 29;
const AUDIT_IMAGE_ROW: u32 = 60;

/// Full-report links: column B, one fixed row per device x mode.
const REPORT_LINK_COL: &str = "B";
const REPORT_LINK_ROW_BASE: u32 = 40;

/// Outcome counts for one aggregation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Detail surfaces available beyond the summary in a workbook template.
pub fn detail_surface_count(template: &Path) -> Result<usize> {
    let book = read_workbook(template)?;
    Ok(book
        .get_sheet_collection()
        .len()
        .saturating_sub(coords::SHEET_BASE))
}

/// Parse the run log and apply every record to the workbook.
pub fn aggregate(
    log_path: &Path,
    workbook_path: &Path,
    map: &CoordinateMap,
) -> Result<AggregateStats> {
    let records = parse_log_file(log_path)?;
    info!("Aggregating {} log records", records.len());

    let mut book = read_workbook(workbook_path)?;

    let mut stats = AggregateStats::default();
    for record in &records {
        match apply_record(&mut book, map, record) {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                stats.skipped += 1;
                warn!(
                    "Skipping record [{}] {}: {:#}",
                    record.label, record.url, e
                );
            }
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, workbook_path).map_err(|e| {
        anyhow!(
            "Failed to write workbook {}: {:?}",
            workbook_path.display(),
            e
        )
    })?;

    Ok(stats)
}

fn read_workbook(path: &Path) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| anyhow!("Failed to open workbook {}: {:?}", path.display(), e))
}

fn apply_record(book: &mut Spreadsheet, map: &CoordinateMap, record: &RunRecord) -> Result<()> {
    let (device, mode) = parse_label(&record.label)
        .ok_or_else(|| anyhow!("Unrecognized task label: {:?}", record.label))?;

    let target = map.resolve(&record.url);
    let column = match mode {
        PrivacyMode::Normal => COL_NORMAL,
        PrivacyMode::Incognito => COL_INCOGNITO,
    };

    // Summary surface: timestamp at the shared header row, score at the
    // device row.
    let summary = book
        .get_sheet_mut(&0)
        .context("Workbook has no summary sheet")?;
    let timestamp_cell = format!("{}{}", column, coords::timestamp_row(device, target));
    summary
        .get_cell_mut(timestamp_cell.as_str())
        .set_value(record.timestamp.clone());
    let score_cell = format!("{}{}", column, coords::score_row(device, target));
    summary
        .get_cell_mut(score_cell.as_str())
        .set_value_number(record.score);

    // Detail surface, only for URLs with a configured segment.
    let Some(target) = target else {
        return Ok(());
    };
    let detail = book
        .get_sheet_mut(&target.sheet_index)
        .with_context(|| format!("Workbook has no detail sheet {}", target.sheet_index))?;

    let col = detail_column(device, mode);
    write_text(detail, col, DIAG_TITLE_ROW, &record.diagnostic.title);
    write_text(detail, col, DIAG_DISPLAY_ROW, &record.diagnostic.display);
    write_link(
        detail,
        col,
        DIAG_REDIRECT_ROW,
        &record.diagnostic.redirect_text,
        &record.diagnostic.redirect_link,
    );
    write_text(detail, col, AUDIT_TITLE_ROW, &record.audit.title);
    write_link(
        detail,
        col,
        AUDIT_REDIRECT_ROW,
        &record.audit.redirect_text,
        &record.audit.redirect_link,
    );

    embed_screenshot(detail, col, DIAG_IMAGE_ROW, &record.diagnostic.screenshot_path);
    embed_screenshot(detail, col, AUDIT_IMAGE_ROW, &record.audit.screenshot_path);

    // The full-report link is written unconditionally.
    let link_cell = format!("{}{}", REPORT_LINK_COL, report_link_row(device, mode));
    let cell = detail.get_cell_mut(link_cell.as_str());
    cell.set_value(format!("Full report ({})", record.label));
    let mut hyperlink = Hyperlink::default();
    hyperlink.set_url(report_link_target(record));
    cell.set_hyperlink(hyperlink);

    Ok(())
}

/// Where the html report lives once aggregation runs. The log records
/// the path the engine wrote, but finalization has already sorted every
/// report into the run's `html/` subfolder by then, so the link must
/// point there.
fn report_link_target(record: &RunRecord) -> String {
    match Path::new(&record.html_report_file).file_name() {
        Some(name) => Path::new(&record.output_dir)
            .join("html")
            .join(name)
            .to_string_lossy()
            .to_string(),
        None => record.html_report_file.clone(),
    }
}

/// Detail-surface column for a device x mode combination.
fn detail_column(device: Device, mode: PrivacyMode) -> &'static str {
    match (device, mode) {
        (Device::Desktop, PrivacyMode::Normal) => "C",
        (Device::Desktop, PrivacyMode::Incognito) => "F",
        (Device::Mobile, PrivacyMode::Normal) => "I",
        (Device::Mobile, PrivacyMode::Incognito) => "L",
    }
}

/// One of four fixed rows for the full-report link.
fn report_link_row(device: Device, mode: PrivacyMode) -> u32 {
    let offset = match (device, mode) {
        (Device::Desktop, PrivacyMode::Normal) => 0,
        (Device::Desktop, PrivacyMode::Incognito) => 1,
        (Device::Mobile, PrivacyMode::Normal) => 2,
        (Device::Mobile, PrivacyMode::Incognito) => 3,
    };
    REPORT_LINK_ROW_BASE + offset
}

fn write_text(sheet: &mut Worksheet, col: &str, row: u32, value: &str) {
    if value.is_empty() {
        return;
    }
    let cell_ref = format!("{}{}", col, row);
    sheet
        .get_cell_mut(cell_ref.as_str())
        .set_value(value.to_string());
}

fn write_link(sheet: &mut Worksheet, col: &str, row: u32, text: &str, link: &str) {
    if text.is_empty() {
        return;
    }
    let cell_ref = format!("{}{}", col, row);
    let cell = sheet.get_cell_mut(cell_ref.as_str());
    cell.set_value(text.to_string());
    if !link.is_empty() {
        let mut hyperlink = Hyperlink::default();
        hyperlink.set_url(link.to_string());
        cell.set_hyperlink(hyperlink);
    }
}

/// Embed a captured screenshot at its fixed anchor. Sentinel and missing
/// paths are quietly skipped; a referenced-but-vanished file only warns.
fn embed_screenshot(sheet: &mut Worksheet, col: &str, row: u32, path: &str) {
    if path.is_empty() || path == SCREENSHOT_SKIPPED {
        return;
    }
    if !Path::new(path).exists() {
        warn!("Screenshot referenced by log no longer on disk: {}", path);
        return;
    }

    let mut marker = MarkerType::default();
    let anchor = format!("{}{}", col, row);
    marker.set_coordinate(anchor.as_str());
    let mut image = Image::default();
    image.new_image(path, marker);
    sheet.add_image(image);
}

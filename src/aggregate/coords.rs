//! URL path segment to output-grid coordinates.
//!
//! Mapping is purely positional: a segment's coordinates derive from its
//! position in the canonical, configured ordered URL set via an
//! arithmetic progression. Runtime execution order never influences a
//! coordinate, so re-running with the same configuration always lands
//! values in the same cells. Reordering the configured set invalidates
//! coordinate stability across runs.

use anyhow::{bail, Result};
use tracing::warn;
use url::Url;

use crate::models::Device;

/// Desktop score row of the first configured segment.
pub const DESKTOP_ROW_BASE: u32 = 11;
/// Rows between consecutive segments on the summary surface.
pub const ROW_STRIDE: u32 = 4;
/// Detail sheet of the first configured segment (sheet 0 is the summary).
pub const SHEET_BASE: usize = 2;

/// Fallback rows for URLs with no configured segment (the homepage).
pub const DEFAULT_DESKTOP_ROW: u32 = 7;
pub const DEFAULT_MOBILE_ROW: u32 = 8;
pub const DEFAULT_TIMESTAMP_ROW: u32 = 6;

/// Resolved grid position for one URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellTarget {
    pub desktop_row: u32,
    pub mobile_row: u32,
    pub sheet_index: usize,
}

/// Deterministic segment-to-coordinates mapping seeded from the
/// configured URL set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateMap {
    segments: Vec<String>,
}

impl CoordinateMap {
    /// Build the mapping from the configured ordered URL set.
    ///
    /// The homepage (no path segment) is skipped and falls back to the
    /// default rows at resolve time. Two configured URLs sharing a path
    /// segment, or more segments than the template has detail surfaces,
    /// are hard errors rather than silent overwrites.
    pub fn new(urls: &[String], detail_sheet_count: usize) -> Result<Self> {
        let mut segments: Vec<String> = Vec::new();

        for raw in urls {
            let parsed = match Url::parse(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping malformed configured URL {:?}: {}", raw, e);
                    continue;
                }
            };

            let segment = parsed
                .path_segments()
                .and_then(|mut parts| parts.find(|p| !p.is_empty()))
                .map(str::to_string);
            let Some(segment) = segment else {
                continue;
            };

            if segments.contains(&segment) {
                bail!(
                    "Duplicate path segment {:?} in configured URLs; \
                     its coordinates would collide",
                    segment
                );
            }
            segments.push(segment);
        }

        if segments.len() > detail_sheet_count {
            bail!(
                "{} configured path segments but the workbook template \
                 only has {} detail surfaces",
                segments.len(),
                detail_sheet_count
            );
        }

        Ok(Self { segments })
    }

    /// Configured segments in canonical order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Coordinates of the segment at `index`.
    fn target(&self, index: usize) -> CellTarget {
        let desktop_row = DESKTOP_ROW_BASE + index as u32 * ROW_STRIDE;
        CellTarget {
            desktop_row,
            mobile_row: desktop_row + 1,
            sheet_index: SHEET_BASE + index,
        }
    }

    /// Resolve a URL to its grid position: the first configured segment
    /// (canonical order) contained in the URL wins. `None` falls back to
    /// the default rows.
    pub fn resolve(&self, url: &str) -> Option<CellTarget> {
        self.segments
            .iter()
            .position(|segment| url.contains(segment.as_str()))
            .map(|index| self.target(index))
    }
}

/// Summary-surface score row for a device, with the unmatched-URL
/// fallback applied.
pub fn score_row(device: Device, target: Option<CellTarget>) -> u32 {
    match (device, target) {
        (Device::Desktop, Some(t)) => t.desktop_row,
        (Device::Mobile, Some(t)) => t.mobile_row,
        (Device::Desktop, None) => DEFAULT_DESKTOP_ROW,
        (Device::Mobile, None) => DEFAULT_MOBILE_ROW,
    }
}

/// Summary-surface timestamp row: one above the desktop score row, two
/// above the mobile one (both land on the segment's shared header row).
pub fn timestamp_row(device: Device, target: Option<CellTarget>) -> u32 {
    match (device, target) {
        (Device::Desktop, Some(t)) => t.desktop_row - 1,
        (Device::Mobile, Some(t)) => t.mobile_row - 2,
        (_, None) => DEFAULT_TIMESTAMP_ROW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Vec<String> {
        vec![
            "https://example.com/".to_string(),
            "https://example.com/testing-services/".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/news".to_string(),
        ]
    }

    #[test]
    fn test_arithmetic_progression() {
        let map = CoordinateMap::new(&urls(), 8).unwrap();
        assert_eq!(map.segments(), ["testing-services", "about", "news"]);

        let first = map.resolve("https://example.com/testing-services/").unwrap();
        assert_eq!(first.desktop_row, 11);
        assert_eq!(first.mobile_row, 12);
        assert_eq!(first.sheet_index, 2);

        let third = map.resolve("https://example.com/news").unwrap();
        assert_eq!(third.desktop_row, 19);
        assert_eq!(third.mobile_row, 20);
        assert_eq!(third.sheet_index, 4);
    }

    #[test]
    fn test_recomputation_is_identical() {
        let a = CoordinateMap::new(&urls(), 8).unwrap();
        let b = CoordinateMap::new(&urls(), 8).unwrap();
        assert_eq!(a, b);
        for url in urls() {
            assert_eq!(a.resolve(&url), b.resolve(&url));
        }
    }

    #[test]
    fn test_homepage_falls_back_to_defaults() {
        let map = CoordinateMap::new(&urls(), 8).unwrap();
        assert_eq!(map.resolve("https://example.com/"), None);
        assert_eq!(score_row(Device::Desktop, None), DEFAULT_DESKTOP_ROW);
        assert_eq!(score_row(Device::Mobile, None), DEFAULT_MOBILE_ROW);
        assert_eq!(timestamp_row(Device::Mobile, None), DEFAULT_TIMESTAMP_ROW);
    }

    #[test]
    fn test_timestamp_rows_share_header() {
        let map = CoordinateMap::new(&urls(), 8).unwrap();
        let target = map.resolve("https://example.com/about");
        assert_eq!(timestamp_row(Device::Desktop, target), 14);
        assert_eq!(timestamp_row(Device::Mobile, target), 14);
    }

    #[test]
    fn test_duplicate_segment_is_an_error() {
        let urls = vec![
            "https://example.com/about".to_string(),
            "https://mirror.example.com/about/team".to_string(),
        ];
        assert!(CoordinateMap::new(&urls, 8).is_err());
    }

    #[test]
    fn test_too_many_segments_is_an_error() {
        let urls: Vec<String> = (0..5)
            .map(|i| format!("https://example.com/page-{}", i))
            .collect();
        assert!(CoordinateMap::new(&urls, 4).is_err());
        assert!(CoordinateMap::new(&urls, 5).is_ok());
    }

    #[test]
    fn test_malformed_url_skipped() {
        let urls = vec![
            "not a url at all".to_string(),
            "https://example.com/about".to_string(),
        ];
        let map = CoordinateMap::new(&urls, 8).unwrap();
        assert_eq!(map.segments(), ["about"]);
    }

    #[test]
    fn test_resolve_prefers_canonical_order() {
        let urls = vec![
            "https://example.com/news".to_string(),
            "https://example.com/careers".to_string(),
        ];
        let map = CoordinateMap::new(&urls, 8).unwrap();
        // Both segments appear; the first configured one wins.
        let target = map.resolve("https://example.com/news/careers-day").unwrap();
        assert_eq!(target.sheet_index, 2);
    }
}

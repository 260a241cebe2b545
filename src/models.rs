//! Data models for the audit runner.
//!
//! This module contains the core data structures shared across the
//! application: device profiles, privacy modes, the task matrix entry,
//! extracted report fields, and the screenshot capture policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel written to the log when the capture policy excluded a task.
pub const SCREENSHOT_SKIPPED: &str = "skipped";

/// Sentinel for a diagnostics entry that renders no display text.
pub const NO_DETAILS: &str = "no details";

/// Device profile an audit runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Mobile,
    Desktop,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Mobile => write!(f, "Mobile"),
            Device::Desktop => write!(f, "Desktop"),
        }
    }
}

/// Browsing context an audit runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivacyMode {
    Normal,
    Incognito,
}

impl fmt::Display for PrivacyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyMode::Normal => write!(f, "Normal"),
            PrivacyMode::Incognito => write!(f, "Incognito"),
        }
    }
}

/// All devices, in canonical matrix order.
pub const ALL_DEVICES: [Device; 2] = [Device::Mobile, Device::Desktop];

/// All privacy modes, in canonical matrix order.
pub const ALL_MODES: [PrivacyMode; 2] = [PrivacyMode::Normal, PrivacyMode::Incognito];

/// One entry of the audit matrix. Immutable once built; identity is
/// (url, device, privacy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Target page URL.
    pub url: String,
    /// Device profile.
    pub device: Device,
    /// Browsing context.
    pub privacy: PrivacyMode,
    /// Position in the matrix (0-based).
    pub sequence_index: usize,
    /// Total number of tasks in the matrix.
    pub total_count: usize,
}

impl Task {
    /// Combined label, e.g. `Mobile-Incognito`. Part of the log wire format.
    pub fn label(&self) -> String {
        format!("{}-{}", self.device, self.privacy)
    }
}

/// Parse a task label back into its device and privacy mode.
pub fn parse_label(label: &str) -> Option<(Device, PrivacyMode)> {
    let (device, mode) = label.split_once('-')?;
    let device = match device {
        "Mobile" => Device::Mobile,
        "Desktop" => Device::Desktop,
        _ => return None,
    };
    let mode = match mode {
        "Normal" => PrivacyMode::Normal,
        "Incognito" => PrivacyMode::Incognito,
        _ => return None,
    };
    Some((device, mode))
}

/// Fields extracted from one region of a rendered report.
///
/// All-empty fields mean the region was absent, which is a warning and
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFields {
    /// Title of the first entry in the region.
    pub title: String,
    /// Display text of that entry, or the [`NO_DETAILS`] sentinel.
    pub display: String,
    /// Text of the first outbound link in the region.
    pub redirect_text: String,
    /// Href of that link.
    pub redirect_link: String,
    /// Path of the captured screenshot, or the [`SCREENSHOT_SKIPPED`]
    /// sentinel, or empty when capture failed.
    pub screenshot_path: String,
}

/// One completed audit, as serialized to the shared run log.
///
/// Append-only; never mutated after being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Formatted fetch timestamp of the audit.
    pub timestamp: String,
    /// Target page URL.
    pub url: String,
    /// Task label (`Device-Mode`).
    pub label: String,
    /// Performance score, 0-100.
    pub score: u8,
    /// Fields extracted from the diagnostics region.
    pub diagnostic: RegionFields,
    /// Fields extracted from the passed-audits region. The display field
    /// is not part of the wire format and stays empty.
    pub audit: RegionFields,
    /// Path to the generated html report.
    pub html_report_file: String,
    /// Per-run output directory.
    pub output_dir: String,
}

/// Which runs get a screenshot captured from their rendered report.
///
/// Replaces a ten-valued numeric option code: a tagged policy evaluated
/// per task instead of a magic-number switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotPolicy {
    /// Capture nothing.
    None,
    /// Capture every combination.
    All,
    /// Capture only tasks matching the given filters. A `None` filter
    /// matches both values of its axis.
    Only {
        device: Option<Device>,
        mode: Option<PrivacyMode>,
    },
}

impl ScreenshotPolicy {
    /// Map a legacy numeric option code (1-10) onto a policy.
    pub fn from_code(code: u8) -> Option<Self> {
        use Device::*;
        use PrivacyMode::*;
        let policy = match code {
            1 => Self::only(Some(Mobile), Some(Normal)),
            2 => Self::only(Some(Mobile), Some(Incognito)),
            3 => Self::only(Some(Desktop), Some(Normal)),
            4 => Self::only(Some(Desktop), Some(Incognito)),
            5 => Self::only(Some(Mobile), None),
            6 => Self::only(Some(Desktop), None),
            7 => Self::only(None, Some(Normal)),
            8 => Self::only(None, Some(Incognito)),
            9 => ScreenshotPolicy::All,
            10 => ScreenshotPolicy::None,
            _ => return None,
        };
        Some(policy)
    }

    fn only(device: Option<Device>, mode: Option<PrivacyMode>) -> Self {
        ScreenshotPolicy::Only { device, mode }
    }

    /// Whether a task with the given device and mode gets a screenshot.
    pub fn applies(&self, device: Device, mode: PrivacyMode) -> bool {
        match self {
            ScreenshotPolicy::None => false,
            ScreenshotPolicy::All => true,
            ScreenshotPolicy::Only {
                device: want_device,
                mode: want_mode,
            } => {
                want_device.map_or(true, |d| d == device) && want_mode.map_or(true, |m| m == mode)
            }
        }
    }
}

/// Human rating for a performance score.
pub fn score_rating(score: u8) -> &'static str {
    match score {
        0..=49 => "Poor",
        50..=89 => "Needs Improvement",
        _ => "Good",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for device in ALL_DEVICES {
            for mode in ALL_MODES {
                let task = Task {
                    url: "https://example.com/".to_string(),
                    device,
                    privacy: mode,
                    sequence_index: 0,
                    total_count: 4,
                };
                assert_eq!(parse_label(&task.label()), Some((device, mode)));
            }
        }
    }

    #[test]
    fn test_parse_label_rejects_garbage() {
        assert_eq!(parse_label("Tablet-Normal"), None);
        assert_eq!(parse_label("Mobile"), None);
        assert_eq!(parse_label("Mobile-Private"), None);
    }

    #[test]
    fn test_policy_single_combination() {
        let policy = ScreenshotPolicy::from_code(1).unwrap();
        assert!(policy.applies(Device::Mobile, PrivacyMode::Normal));
        assert!(!policy.applies(Device::Mobile, PrivacyMode::Incognito));
        assert!(!policy.applies(Device::Desktop, PrivacyMode::Normal));
    }

    #[test]
    fn test_policy_axis_filters() {
        let all_mobile = ScreenshotPolicy::from_code(5).unwrap();
        assert!(all_mobile.applies(Device::Mobile, PrivacyMode::Normal));
        assert!(all_mobile.applies(Device::Mobile, PrivacyMode::Incognito));
        assert!(!all_mobile.applies(Device::Desktop, PrivacyMode::Normal));

        let all_incognito = ScreenshotPolicy::from_code(8).unwrap();
        assert!(all_incognito.applies(Device::Mobile, PrivacyMode::Incognito));
        assert!(all_incognito.applies(Device::Desktop, PrivacyMode::Incognito));
        assert!(!all_incognito.applies(Device::Desktop, PrivacyMode::Normal));
    }

    #[test]
    fn test_policy_all_and_none() {
        let all = ScreenshotPolicy::from_code(9).unwrap();
        let none = ScreenshotPolicy::from_code(10).unwrap();
        for device in ALL_DEVICES {
            for mode in ALL_MODES {
                assert!(all.applies(device, mode));
                assert!(!none.applies(device, mode));
            }
        }
    }

    #[test]
    fn test_policy_invalid_code() {
        assert_eq!(ScreenshotPolicy::from_code(0), None);
        assert_eq!(ScreenshotPolicy::from_code(11), None);
    }

    #[test]
    fn test_score_rating() {
        assert_eq!(score_rating(0), "Poor");
        assert_eq!(score_rating(49), "Poor");
        assert_eq!(score_rating(50), "Needs Improvement");
        assert_eq!(score_rating(89), "Needs Improvement");
        assert_eq!(score_rating(90), "Good");
        assert_eq!(score_rating(100), "Good");
    }
}

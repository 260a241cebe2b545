//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

use crate::models::{Device, PrivacyMode, ScreenshotPolicy};

/// PagePulse - batch page-performance auditor
///
/// Run performance audits over every URL in Mobile/Desktop and
/// Normal/Incognito modes, with rendering fallback for pages that
/// refuse to paint headlessly, then aggregate everything into a
/// spreadsheet report.
///
/// Examples:
///   pagepulse --urls https://example.com/,https://example.com/about
///   pagepulse --config .pagepulse.toml --screenshot all
///   pagepulse --urls https://example.com/ --dry-run
///   pagepulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .pagepulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URLs to audit (comma-separated), overriding the config file
    ///
    /// Order matters: it seeds the output-grid coordinates.
    #[arg(short, long, value_name = "URLS", value_delimiter = ',')]
    pub urls: Option<Vec<String>>,

    /// Number of audits launched concurrently per batch
    #[arg(short, long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Which device/mode combinations get screenshots
    #[arg(short, long, value_name = "WHICH", value_enum)]
    pub screenshot: Option<ScreenshotChoice>,

    /// Workbook template copied for each run
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Root directory run folders are created under
    #[arg(short, long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Audit engine executable
    ///
    /// Can also be set via PAGEPULSE_ENGINE env var or .pagepulse.toml.
    #[arg(long, value_name = "BIN", env = "PAGEPULSE_ENGINE")]
    pub engine: Option<String>,

    /// Real browser executable for the headed-attach fallback tier
    #[arg(long, value_name = "BIN", env = "PAGEPULSE_BROWSER")]
    pub browser: Option<String>,

    /// External report-scraper tool for diagnostic extraction
    ///
    /// When unset (and absent from the config), text extraction and
    /// screenshots are disabled and log records carry defaults.
    #[arg(long, value_name = "BIN")]
    pub scraper: Option<String>,

    /// Remote-debugging port for the headed-attach tier
    #[arg(long, value_name = "PORT")]
    pub debug_port: Option<u16>,

    /// Wall-clock budget per rendering tier, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: print the task matrix and exit without auditing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .pagepulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Screenshot selection for --screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScreenshotChoice {
    /// Mobile + Normal only
    MobileNormal,
    /// Mobile + Incognito only
    MobileIncognito,
    /// Desktop + Normal only
    DesktopNormal,
    /// Desktop + Incognito only
    DesktopIncognito,
    /// Both Mobile combinations
    Mobile,
    /// Both Desktop combinations
    Desktop,
    /// Both Normal combinations
    Normal,
    /// Both Incognito combinations
    Incognito,
    /// Every combination
    All,
    /// No screenshots
    None,
}

impl ScreenshotChoice {
    /// Convert the CLI choice to a screenshot policy.
    pub fn policy(self) -> ScreenshotPolicy {
        match self {
            Self::MobileNormal => ScreenshotPolicy::Only {
                device: Some(Device::Mobile),
                mode: Some(PrivacyMode::Normal),
            },
            Self::MobileIncognito => ScreenshotPolicy::Only {
                device: Some(Device::Mobile),
                mode: Some(PrivacyMode::Incognito),
            },
            Self::DesktopNormal => ScreenshotPolicy::Only {
                device: Some(Device::Desktop),
                mode: Some(PrivacyMode::Normal),
            },
            Self::DesktopIncognito => ScreenshotPolicy::Only {
                device: Some(Device::Desktop),
                mode: Some(PrivacyMode::Incognito),
            },
            Self::Mobile => ScreenshotPolicy::Only {
                device: Some(Device::Mobile),
                mode: None,
            },
            Self::Desktop => ScreenshotPolicy::Only {
                device: Some(Device::Desktop),
                mode: None,
            },
            Self::Normal => ScreenshotPolicy::Only {
                device: None,
                mode: Some(PrivacyMode::Normal),
            },
            Self::Incognito => ScreenshotPolicy::Only {
                device: None,
                mode: Some(PrivacyMode::Incognito),
            },
            Self::All => ScreenshotPolicy::All,
            Self::None => ScreenshotPolicy::None,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate URL format when provided on the command line
        if let Some(ref urls) = self.urls {
            for url in urls {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(format!(
                        "URL must start with 'https://' or 'http://': {}",
                        url
                    ));
                }
            }
        }

        // Validate batch size
        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 {
                return Err("Batch size must be at least 1".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            urls: Some(vec!["https://example.com/".to_string()]),
            batch_size: None,
            screenshot: None,
            template: None,
            output_root: None,
            engine: None,
            browser: None,
            scraper: None,
            debug_port: None,
            timeout: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.urls = Some(vec!["example.com".to_string()]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_batch_size() {
        let mut args = make_args();
        args.batch_size = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.urls = Some(vec!["not-a-url".to_string()]);
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_screenshot_choice_maps_to_policy() {
        assert_eq!(ScreenshotChoice::All.policy(), ScreenshotPolicy::All);
        assert_eq!(ScreenshotChoice::None.policy(), ScreenshotPolicy::None);

        let only = ScreenshotChoice::DesktopIncognito.policy();
        assert!(only.applies(Device::Desktop, PrivacyMode::Incognito));
        assert!(!only.applies(Device::Desktop, PrivacyMode::Normal));
        assert!(!only.applies(Device::Mobile, PrivacyMode::Incognito));
    }
}

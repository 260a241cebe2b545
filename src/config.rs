//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pagepulse.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::ScreenshotPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Audit targets.
    #[serde(default)]
    pub targets: TargetsConfig,

    /// Run settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Audit engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Audit target settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Ordered URL set. Order seeds the output coordinates; reordering
    /// moves every value in the workbook.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tasks launched concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Root directory run folders are created under.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// Workbook template copied for each run.
    #[serde(default = "default_template")]
    pub template: String,

    /// Legacy numeric screenshot option (1-10), kept for config-file
    /// compatibility. See [`ScreenshotPolicy::from_code`].
    #[serde(default = "default_screenshot_option")]
    pub screenshot_option: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            output_root: default_output_root(),
            template: default_template(),
            screenshot_option: default_screenshot_option(),
        }
    }
}

fn default_batch_size() -> usize {
    4
}

fn default_output_root() -> String {
    "reports".to_string()
}

fn default_template() -> String {
    "template/page-insights-template.xlsx".to_string()
}

fn default_screenshot_option() -> u8 {
    9 // capture everything
}

/// External audit engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Audit engine executable.
    #[serde(default = "default_engine_bin")]
    pub binary: String,

    /// Real browser executable for the headed-attach fallback tier.
    #[serde(default = "default_browser_bin")]
    pub browser: String,

    /// Remote-debugging port for the headed-attach tier.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Wall-clock budget per rendering tier, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Engine page-load wait budget, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// External report-scraper tool; empty disables extraction.
    #[serde(default)]
    pub scraper: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_bin(),
            browser: default_browser_bin(),
            debug_port: default_debug_port(),
            timeout_seconds: default_timeout(),
            max_wait_ms: default_max_wait_ms(),
            scraper: String::new(),
        }
    }
}

fn default_engine_bin() -> String {
    "lighthouse".to_string()
}

fn default_browser_bin() -> String {
    "chromium".to_string()
}

fn default_debug_port() -> u16 {
    9222
}

fn default_timeout() -> u64 {
    180
}

fn default_max_wait_ms() -> u64 {
    45_000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".pagepulse.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence; only explicitly provided values
    /// override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref urls) = args.urls {
            self.targets.urls = urls.clone();
        }
        if let Some(batch_size) = args.batch_size {
            self.run.batch_size = batch_size;
        }
        if let Some(ref output_root) = args.output_root {
            self.run.output_root = output_root.to_string_lossy().to_string();
        }
        if let Some(ref template) = args.template {
            self.run.template = template.to_string_lossy().to_string();
        }
        if let Some(ref engine) = args.engine {
            self.engine.binary = engine.clone();
        }
        if let Some(ref browser) = args.browser {
            self.engine.browser = browser.clone();
        }
        if let Some(ref scraper) = args.scraper {
            self.engine.scraper = scraper.clone();
        }
        if let Some(debug_port) = args.debug_port {
            self.engine.debug_port = debug_port;
        }
        if let Some(timeout) = args.timeout {
            self.engine.timeout_seconds = timeout;
        }
    }

    /// Screenshot policy from the configured legacy option code.
    pub fn screenshot_policy(&self) -> Result<ScreenshotPolicy> {
        ScreenshotPolicy::from_code(self.run.screenshot_option).with_context(|| {
            format!(
                "Invalid screenshot_option {} (expected 1-10)",
                self.run.screenshot_option
            )
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Device, PrivacyMode};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.run.batch_size, 4);
        assert_eq!(config.engine.binary, "lighthouse");
        assert_eq!(config.engine.debug_port, 9222);
        assert!(config.targets.urls.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[targets]
urls = ["https://example.com/", "https://example.com/about"]

[run]
batch_size = 2
screenshot_option = 10

[engine]
binary = "npx lighthouse"
timeout_seconds = 300
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.targets.urls.len(), 2);
        assert_eq!(config.run.batch_size, 2);
        assert_eq!(config.run.screenshot_option, 10);
        assert_eq!(config.engine.binary, "npx lighthouse");
        assert_eq!(config.engine.timeout_seconds, 300);
        // Unspecified sections keep their defaults.
        assert_eq!(config.engine.max_wait_ms, 45_000);
    }

    #[test]
    fn test_screenshot_policy() {
        let mut config = Config::default();
        assert!(config
            .screenshot_policy()
            .unwrap()
            .applies(Device::Mobile, PrivacyMode::Normal));

        config.run.screenshot_option = 10;
        assert!(!config
            .screenshot_policy()
            .unwrap()
            .applies(Device::Mobile, PrivacyMode::Normal));

        config.run.screenshot_option = 42;
        assert!(config.screenshot_policy().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[targets]"));
        assert!(toml_str.contains("[run]"));
        assert!(toml_str.contains("[engine]"));
    }
}

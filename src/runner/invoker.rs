//! Audit engine invocation with tiered rendering fallback.
//!
//! Some pages never paint content under a headless engine-managed browser
//! and the engine exits with a "no first contentful paint" error. That
//! class of failure is non-deterministic, so the invoker escalates through
//! three rendering tiers: new headless, old headless, and finally a real
//! browser attached over the remote-debugging port (most reliable, tried
//! last because slowest). Any other engine failure fails fast; a different
//! rendering mode would not help.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::models::{Device, PrivacyMode, Task};

/// Stable error code the engine emits when a page never paints content.
pub const RENDER_TIMEOUT_SIGNATURE: &str = "NO_FCP";

/// Secondary phrasing of the same failure in engine output.
const RENDER_TIMEOUT_PHRASE: &str = "did not paint any content";

/// Max transcript characters kept per attempt for the aggregate error.
const TRANSCRIPT_TAIL: usize = 500;

/// Rendering tier for one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Engine-managed browser with `--headless=new`.
    HeadlessNew,
    /// Engine-managed browser with legacy `--headless`.
    HeadlessOld,
    /// Real browser launched with a remote-debugging port; the engine
    /// attaches instead of managing its own.
    HeadedAttach,
}

impl RenderMode {
    /// Escalation order. Earlier tiers are cheaper, the last is the most
    /// reliable.
    pub const ESCALATION: [RenderMode; 3] = [
        RenderMode::HeadlessNew,
        RenderMode::HeadlessOld,
        RenderMode::HeadedAttach,
    ];

    fn describe(&self) -> &'static str {
        match self {
            RenderMode::HeadlessNew => "headless (new)",
            RenderMode::HeadlessOld => "headless (old)",
            RenderMode::HeadedAttach => "headed attach",
        }
    }
}

/// Failure taxonomy of an audit invocation.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Non-zero exit without the rendering-timeout signature. Not a
    /// rendering-timing issue; no further tiers are attempted.
    #[error("audit engine failed in {} mode: {detail}", mode.describe())]
    EngineFailure { mode: RenderMode, detail: String },

    /// Every tier failed with a rendering-class failure.
    #[error("page never painted content; all rendering tiers failed:\n{}", attempts.join("\n"))]
    AllTiersFailed { attempts: Vec<String> },

    #[error("failed to run audit engine: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a single tier.
enum Attempt {
    Success,
    /// Rendering-class failure; escalate to the next tier.
    RenderFailure(String),
    /// Anything else; fail the task immediately.
    HardFailure(String),
}

/// Runs the external audit engine for one task.
pub struct AuditInvoker {
    /// Audit engine executable.
    pub engine_bin: String,
    /// Real browser executable for the headed-attach tier.
    pub browser_bin: String,
    /// Remote-debugging port the headed-attach tier uses.
    pub debug_port: u16,
    /// Wall-clock budget per tier.
    pub tier_timeout: Duration,
    /// Engine page-load wait budget in milliseconds.
    pub max_wait_ms: u64,
    /// Grace period for the real browser to open its debugging port.
    pub browser_warmup: Duration,
}

impl AuditInvoker {
    /// Run the engine for `task`, escalating through rendering tiers.
    /// Every tier writes to the same output prefix, so only the
    /// successful tier's reports survive. Returns the tier that
    /// succeeded.
    ///
    /// There is no task-level rerun on top of this: the tiers are the
    /// only retry.
    pub async fn run(&self, task: &Task, report_prefix: &Path) -> Result<RenderMode, AuditError> {
        let mut attempts = Vec::with_capacity(RenderMode::ESCALATION.len());

        for mode in RenderMode::ESCALATION {
            if !attempts.is_empty() {
                info!(
                    "[{}] Escalating to {} for {}",
                    task.label(),
                    mode.describe(),
                    task.url
                );
            }

            match self.attempt(task, report_prefix, mode).await? {
                Attempt::Success => {
                    debug!("[{}] Audit succeeded in {} mode", task.label(), mode.describe());
                    return Ok(mode);
                }
                Attempt::HardFailure(detail) => {
                    return Err(AuditError::EngineFailure { mode, detail });
                }
                Attempt::RenderFailure(detail) => {
                    warn!(
                        "[{}] {} tier hit a rendering failure on {}",
                        task.label(),
                        mode.describe(),
                        task.url
                    );
                    attempts.push(format!("{}: {}", mode.describe(), detail));
                }
            }
        }

        Err(AuditError::AllTiersFailed { attempts })
    }

    async fn attempt(
        &self,
        task: &Task,
        report_prefix: &Path,
        mode: RenderMode,
    ) -> Result<Attempt, AuditError> {
        let mut browser: Option<Child> = None;
        if mode == RenderMode::HeadedAttach {
            match self.launch_browser(task.privacy) {
                Ok(child) => browser = Some(child),
                Err(e) => {
                    return Ok(Attempt::RenderFailure(format!(
                        "browser launch failed: {}",
                        e
                    )))
                }
            }
            tokio::time::sleep(self.browser_warmup).await;
        }

        let mut cmd = Command::new(&self.engine_bin);
        cmd.arg(&task.url)
            .args(["--output", "json", "--output", "html"])
            .arg("--output-path")
            .arg(report_prefix)
            .arg("--quiet")
            .arg(format!("--max-wait-for-load={}", self.max_wait_ms))
            .arg("--disable-storage-reset")
            .arg("--no-enable-error-reporting");

        if task.device == Device::Desktop {
            cmd.arg("--preset=desktop");
        }

        match mode {
            RenderMode::HeadlessNew => {
                cmd.arg(format!(
                    "--chrome-flags={}",
                    chrome_flags("--headless=new", task.privacy)
                ));
            }
            RenderMode::HeadlessOld => {
                cmd.arg(format!(
                    "--chrome-flags={}",
                    chrome_flags("--headless", task.privacy)
                ));
            }
            RenderMode::HeadedAttach => {
                cmd.arg(format!("--port={}", self.debug_port));
            }
        }
        cmd.kill_on_drop(true);

        let result = tokio::time::timeout(self.tier_timeout, cmd.output()).await;

        if let Some(mut child) = browser {
            // The browser may have exited on its own already.
            let _ = child.kill().await;
        }

        match result {
            Err(_) => Ok(Attempt::RenderFailure(format!(
                "timed out after {:?}",
                self.tier_timeout
            ))),
            Ok(Err(e)) => Err(AuditError::Io(e)),
            Ok(Ok(output)) => {
                if output.status.success() {
                    return Ok(Attempt::Success);
                }

                let mut transcript = String::from_utf8_lossy(&output.stdout).to_string();
                transcript.push_str(&String::from_utf8_lossy(&output.stderr));
                let detail = format!("exit {}: {}", output.status, tail(&transcript));

                if transcript.contains(RENDER_TIMEOUT_SIGNATURE)
                    || transcript.contains(RENDER_TIMEOUT_PHRASE)
                {
                    Ok(Attempt::RenderFailure(detail))
                } else {
                    Ok(Attempt::HardFailure(detail))
                }
            }
        }
    }

    fn launch_browser(&self, privacy: PrivacyMode) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.browser_bin);
        cmd.arg(format!("--remote-debugging-port={}", self.debug_port));
        if privacy == PrivacyMode::Incognito {
            cmd.arg("--incognito");
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd.kill_on_drop(true);
        cmd.spawn()
    }
}

fn chrome_flags(rendering_flag: &str, privacy: PrivacyMode) -> String {
    match privacy {
        PrivacyMode::Normal => rendering_flag.to_string(),
        PrivacyMode::Incognito => format!("{} --incognito", rendering_flag),
    }
}

/// Last [`TRANSCRIPT_TAIL`] characters of engine output; errors surface
/// at the end.
fn tail(transcript: &str) -> &str {
    let start = transcript
        .char_indices()
        .rev()
        .take(TRANSCRIPT_TAIL)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    transcript[start..].trim()
}

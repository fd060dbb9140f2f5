use crate::elements::ElementKind;
use crate::error::CheckerError;
use crate::manifest::{Finding, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

static MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-\s*\[(ERROR|WARNING|HINT)\]\s*(.+?)\s*$").expect("valid checker regex")
});

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSeverity {
    Error,
    Warning,
    Hint,
}

/// One diagnostic from the external checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckerIssue {
    pub severity: CheckSeverity,
    pub message: String,
}

impl CheckerIssue {
    pub fn code(&self) -> &'static str {
        match self.severity {
            CheckSeverity::Error => "librepcb_error",
            CheckSeverity::Warning => "librepcb_warning",
            CheckSeverity::Hint => "librepcb_hint",
        }
    }

    /// Errors stay errors; warnings and hints are filed as warnings.
    pub fn to_finding(&self) -> Finding {
        let severity = match self.severity {
            CheckSeverity::Error => Severity::Error,
            CheckSeverity::Warning | CheckSeverity::Hint => Severity::Warning,
        };
        Finding::new(severity, self.code(), self.message.clone())
    }
}

/// Inspects a written element directory.
pub trait Checker {
    fn check(
        &self,
        kind: ElementKind,
        element_dir: &Path,
        timeout: Duration,
    ) -> Result<Vec<CheckerIssue>, CheckerError>;
}

/// Checker that never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChecker;

impl Checker for NoChecker {
    fn check(
        &self,
        _kind: ElementKind,
        _element_dir: &Path,
        _timeout: Duration,
    ) -> Result<Vec<CheckerIssue>, CheckerError> {
        Ok(Vec::new())
    }
}

/// `librepcb-cli open-symbol|open-package <dir> --check`
#[derive(Debug, Clone)]
pub struct LibrePcbCli {
    program: PathBuf,
}

impl Default for LibrePcbCli {
    fn default() -> Self {
        Self::new("librepcb-cli")
    }
}

impl LibrePcbCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Checker for LibrePcbCli {
    fn check(
        &self,
        kind: ElementKind,
        element_dir: &Path,
        timeout: Duration,
    ) -> Result<Vec<CheckerIssue>, CheckerError> {
        let command = match kind {
            ElementKind::Symbol => "open-symbol",
            ElementKind::Package => "open-package",
            ElementKind::Component | ElementKind::Device => return Ok(Vec::new()),
        };
        log::debug!(
            "Running {} {command} {}",
            self.program.display(),
            element_dir.display()
        );
        let mut child = Command::new(&self.program)
            .arg(command)
            .arg(element_dir)
            .arg("--check")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain pipes on helper threads so a chatty child cannot block.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("Checker timed out on {}", element_dir.display());
                return Err(CheckerError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let collect = |h: Option<thread::JoinHandle<String>>| {
            h.and_then(|h| h.join().ok()).unwrap_or_default()
        };
        let out = collect(stdout);
        let err = collect(stderr);
        let issues = parse_output(&out);
        if !status.success() && issues.is_empty() {
            let detail = if err.trim().is_empty() { out } else { err };
            return Err(CheckerError::Failed(format!(
                "{status}: {}",
                detail.trim()
            )));
        }
        Ok(issues)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Pick `- [SEVERITY] message` lines out of checker output, in order.
pub fn parse_output(text: &str) -> Vec<CheckerIssue> {
    text.lines()
        .filter_map(|line| {
            let caps = MESSAGE_RE.captures(line)?;
            let severity = match &caps[1] {
                "ERROR" => CheckSeverity::Error,
                "WARNING" => CheckSeverity::Warning,
                _ => CheckSeverity::Hint,
            };
            Some(CheckerIssue {
                severity,
                message: caps[2].to_string(),
            })
        })
        .collect()
}

use ghup_core::TOOL_BINARY;
use tracing::warn;

use crate::deps::describe_exit;
use crate::detect::version_report_invocation;
use crate::host::{Host, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    VersionReport,
    Help,
    RuntimeTools,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VersionReport => "version report",
            Self::Help => "help command",
            Self::RuntimeTools => "runtime tools",
        }
    }
}

impl VerificationReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.passed)
    }

    pub fn check(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.kind == kind)
    }
}

pub fn help_invocation() -> Invocation {
    Invocation::new(TOOL_BINARY, ["--help"])
}

/// Best-effort probe of a finished install. Every check runs regardless of
/// earlier failures and nothing here is fatal.
pub fn verify_installation(host: &Host<'_>, runtime_tools: &[String]) -> VerificationReport {
    let checks = vec![
        command_check(host, CheckKind::VersionReport, &version_report_invocation()),
        command_check(host, CheckKind::Help, &help_invocation()),
        runtime_tools_check(host, runtime_tools),
    ];

    for check in checks.iter().filter(|check| !check.passed) {
        warn!(check = check.kind.as_str(), detail = %check.detail, "verification check failed");
    }
    VerificationReport { checks }
}

fn command_check(host: &Host<'_>, kind: CheckKind, invocation: &Invocation) -> CheckResult {
    let line = invocation.command_line();
    match host.run(invocation) {
        Ok(outcome) if outcome.success => CheckResult {
            kind,
            passed: true,
            detail: format!("'{line}' succeeded"),
        },
        Ok(outcome) => CheckResult {
            kind,
            passed: false,
            detail: format!("'{line}' exited with {}", describe_exit(outcome.code)),
        },
        Err(err) => CheckResult {
            kind,
            passed: false,
            detail: format!("'{line}' could not run: {err:#}"),
        },
    }
}

fn runtime_tools_check(host: &Host<'_>, runtime_tools: &[String]) -> CheckResult {
    let missing = runtime_tools
        .iter()
        .filter(|tool| !host.probe.is_present(tool))
        .map(String::as_str)
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return CheckResult {
            kind: CheckKind::RuntimeTools,
            passed: true,
            detail: format!("found {}", runtime_tools.join(", ")),
        };
    }
    CheckResult {
        kind: CheckKind::RuntimeTools,
        passed: false,
        detail: format!("missing on PATH: {}", missing.join(", ")),
    }
}

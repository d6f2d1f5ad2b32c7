use ghup_core::{parse_reported_version, InstalledState, InstalledVersion, TOOL_BINARY, TOOL_VERSION_LABEL};
use tracing::{debug, warn};

use crate::host::{Host, Invocation};

pub fn version_report_invocation() -> Invocation {
    Invocation::new(TOOL_BINARY, ["--version"])
}

/// Never fails: a present tool whose version cannot be read is reported as
/// `InstalledVersion::Unknown`.
pub fn detect_installed(host: &Host<'_>) -> InstalledState {
    let Some(path) = host.probe.locate(TOOL_BINARY) else {
        debug!(tool = TOOL_BINARY, "not found on PATH");
        return InstalledState::NotInstalled;
    };
    debug!(tool = TOOL_BINARY, path = %path.display(), "found on PATH");

    let outcome = match host.run(&version_report_invocation()) {
        Ok(outcome) if outcome.success => outcome,
        Ok(outcome) => {
            warn!(code = ?outcome.code, "version report failed; treating installed version as unknown");
            return InstalledState::InstalledAt(InstalledVersion::Unknown);
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "version report could not run; treating installed version as unknown");
            return InstalledState::InstalledAt(InstalledVersion::Unknown);
        }
    };

    match parse_reported_version(&outcome.stdout, TOOL_VERSION_LABEL) {
        Some(version) => InstalledState::InstalledAt(InstalledVersion::Known(version)),
        None => {
            warn!(output = %outcome.stdout.trim(), "unrecognized version report; treating installed version as unknown");
            InstalledState::InstalledAt(InstalledVersion::Unknown)
        }
    }
}

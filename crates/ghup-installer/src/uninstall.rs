use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ghup_core::{InstalledState, InstalledVersion, TOOL_BINARY, TOOL_PACKAGE};
use tracing::{info, warn};

use crate::deps::describe_exit;
use crate::detect::detect_installed;
use crate::fs_utils::remove_dir_if_exists;
use crate::host::{Host, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallStatus {
    NotInstalled,
    Uninstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMethod {
    PackageManager,
    DpkgFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallResult {
    pub status: UninstallStatus,
    pub previous: Option<InstalledVersion>,
    pub removal: Option<RemovalMethod>,
    pub config_removed: bool,
    /// Set when the binary still resolves after removal; often a stale shell
    /// hash rather than a failed uninstall.
    pub still_on_path: Option<PathBuf>,
}

pub fn package_remove_invocation() -> Invocation {
    Invocation::new("apt-get", ["remove", "-y", TOOL_PACKAGE]).privileged()
}

pub fn dpkg_remove_invocation() -> Invocation {
    Invocation::new("dpkg", ["-r", TOOL_PACKAGE]).privileged()
}

pub fn uninstall_tool<Confirm>(
    host: &Host<'_>,
    config_dir: &Path,
    confirm_config_removal: Confirm,
) -> Result<UninstallResult>
where
    Confirm: FnOnce(&InstalledVersion, Option<&Path>) -> Result<bool>,
{
    let InstalledState::InstalledAt(previous) = detect_installed(host) else {
        return Ok(UninstallResult {
            status: UninstallStatus::NotInstalled,
            previous: None,
            removal: None,
            config_removed: false,
            still_on_path: None,
        });
    };

    // The configuration prompt is only offered when there is something to delete.
    let existing_config = config_dir.exists().then_some(config_dir);
    let remove_config = confirm_config_removal(&previous, existing_config)?;

    let removal = remove_package(host)?;
    info!(method = ?removal, "package removed");

    let config_removed = if remove_config && existing_config.is_some() {
        remove_dir_if_exists(config_dir).with_context(|| {
            format!(
                "uninstall-failed: package removed but configuration directory could not be deleted: {}",
                config_dir.display()
            )
        })?
    } else {
        false
    };

    let still_on_path = host.probe.locate(TOOL_BINARY);
    if let Some(path) = &still_on_path {
        warn!(path = %path.display(), "binary still resolves after removal");
    }

    Ok(UninstallResult {
        status: UninstallStatus::Uninstalled,
        previous: Some(previous),
        removal: Some(removal),
        config_removed,
        still_on_path,
    })
}

fn remove_package(host: &Host<'_>) -> Result<RemovalMethod> {
    let primary = package_remove_invocation();
    let primary_failure = match host.run(&primary) {
        Ok(outcome) if outcome.success => return Ok(RemovalMethod::PackageManager),
        Ok(outcome) => format!(
            "exited with {}: {}",
            describe_exit(outcome.code),
            outcome.combined_output()
        ),
        Err(err) => format!("could not run: {err:#}"),
    };
    warn!(detail = %primary_failure, "primary package removal failed; trying dpkg");

    let fallback = dpkg_remove_invocation();
    let fallback_failure = match host.run(&fallback) {
        Ok(outcome) if outcome.success => return Ok(RemovalMethod::DpkgFallback),
        Ok(outcome) => format!(
            "exited with {}: {}",
            describe_exit(outcome.code),
            outcome.combined_output()
        ),
        Err(err) => format!("could not run: {err:#}"),
    };

    Err(anyhow!(
        "uninstall-failed: '{}' {primary_failure}; fallback '{}' {fallback_failure}",
        host.manual_command(&primary),
        host.manual_command(&fallback)
    ))
}

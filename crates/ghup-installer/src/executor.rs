use std::path::Path;

use anyhow::{anyhow, Result};
use ghup_core::{artifact_location, ArtifactLocation, Version};
use tracing::{debug, info, warn};

use crate::checksum::{find_listed_checksum, verify_sha256_file};
use crate::deps::{describe_exit, index_refresh_invocation};
use crate::host::{CommandOutcome, Host, Invocation};
use crate::workspace::{CleanupSlot, Workspace};

pub trait Downloader {
    fn download(&self, url: &str, destination: &Path) -> Result<()>;
    fn fetch_text(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub version: &'a Version,
    pub arch: &'a str,
    pub download_base_url: &'a str,
    pub verify_checksums: bool,
    pub workspace_parent: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub version: Version,
    pub artifact: ArtifactLocation,
    pub checksum_verified: bool,
    pub dependencies_remediated: bool,
}

pub fn package_file_install_invocation(artifact: &Path) -> Invocation {
    Invocation::new("dpkg", ["-i".to_string(), artifact.display().to_string()]).privileged()
}

pub fn dependency_fix_invocation() -> Invocation {
    Invocation::new("apt-get", ["install", "-f", "-y"]).privileged()
}

/// Downloads and installs `request.version` inside a fresh workspace. The
/// workspace is released on every return path, and by the cleanup slot's
/// owner if the process is interrupted first.
pub fn install_release(
    host: &Host<'_>,
    downloader: &dyn Downloader,
    cleanup: &CleanupSlot,
    request: &InstallRequest<'_>,
) -> Result<InstallOutcome> {
    let workspace = Workspace::acquire(request.workspace_parent, cleanup)?;
    let result = install_in_workspace(host, downloader, &workspace, request);
    workspace.release();
    result
}

fn install_in_workspace(
    host: &Host<'_>,
    downloader: &dyn Downloader,
    workspace: &Workspace,
    request: &InstallRequest<'_>,
) -> Result<InstallOutcome> {
    let artifact = artifact_location(request.download_base_url, request.version, request.arch);
    let artifact_path = workspace.path().join(&artifact.file_name);

    info!(url = %artifact.url, "downloading release package");
    downloader
        .download(&artifact.url, &artifact_path)
        .map_err(|err| {
            anyhow!(
                "download-failed: could not download {}: {err:#}; check the version exists and that {} is reachable",
                artifact.url,
                request.download_base_url
            )
        })?;

    let checksum_verified = if request.verify_checksums {
        verify_downloaded_artifact(downloader, &artifact, &artifact_path)?;
        true
    } else {
        debug!("checksum verification disabled");
        false
    };

    let dependencies_remediated = install_package_file(host, &artifact_path)?;

    Ok(InstallOutcome {
        version: request.version.clone(),
        artifact,
        checksum_verified,
        dependencies_remediated,
    })
}

fn verify_downloaded_artifact(
    downloader: &dyn Downloader,
    artifact: &ArtifactLocation,
    artifact_path: &Path,
) -> Result<()> {
    let listing = downloader.fetch_text(&artifact.checksums_url).map_err(|err| {
        anyhow!(
            "checksum-mismatch: could not fetch checksums from {}: {err:#}",
            artifact.checksums_url
        )
    })?;
    let expected = find_listed_checksum(&listing, &artifact.file_name).ok_or_else(|| {
        anyhow!(
            "checksum-mismatch: {} does not list {}",
            artifact.checksums_url,
            artifact.file_name
        )
    })?;
    verify_sha256_file(artifact_path, expected)?;
    debug!(file = %artifact.file_name, "checksum verified");
    Ok(())
}

/// Returns whether a dependency remediation pass was needed.
fn install_package_file(host: &Host<'_>, artifact_path: &Path) -> Result<bool> {
    let install = package_file_install_invocation(artifact_path);
    let first = run_install_step(host, &install)?;
    if first.success {
        return Ok(false);
    }

    if !is_unmet_dependency_failure(&first) {
        return Err(anyhow!(
            "install-failed: '{}' exited with {}: {}",
            host.manual_command(&install),
            describe_exit(first.code),
            first.combined_output()
        ));
    }

    warn!("package install reported unmet dependencies; resolving once and retrying");
    for step in [index_refresh_invocation(), dependency_fix_invocation()] {
        let outcome = run_install_step(host, &step)?;
        if !outcome.success {
            return Err(anyhow!(
                "install-failed: dependency resolution step '{}' exited with {}: {}; run manually: {} && {}",
                host.manual_command(&step),
                describe_exit(outcome.code),
                outcome.combined_output(),
                host.manual_command(&dependency_fix_invocation()),
                host.manual_command(&install)
            ));
        }
    }

    let retry = run_install_step(host, &install)?;
    if !retry.success {
        return Err(anyhow!(
            "install-failed: '{}' failed again after resolving dependencies ({}): {}",
            host.manual_command(&install),
            describe_exit(retry.code),
            retry.combined_output()
        ));
    }
    Ok(true)
}

fn run_install_step(host: &Host<'_>, invocation: &Invocation) -> Result<CommandOutcome> {
    host.run(invocation).map_err(|err| {
        anyhow!(
            "install-failed: could not run '{}': {err:#}",
            host.manual_command(invocation)
        )
    })
}

pub fn is_unmet_dependency_failure(outcome: &CommandOutcome) -> bool {
    let output = outcome.combined_output().to_ascii_lowercase();
    ["dependency problems", "depends on", "unmet dependencies"]
        .iter()
        .any(|marker| output.contains(marker))
}

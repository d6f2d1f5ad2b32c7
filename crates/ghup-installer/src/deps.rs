use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use ghup_core::builtin_package_name;
use tracing::{debug, info};

use crate::host::{Host, Invocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    AllPresent,
    Remediated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub status: AuditStatus,
    pub missing: Vec<String>,
    pub installed_packages: Vec<String>,
}

/// Overrides win over the built-in table; unmapped tools are their own
/// package.
pub fn package_name_for(tool: &str, overrides: &BTreeMap<String, String>) -> String {
    overrides
        .get(tool)
        .cloned()
        .unwrap_or_else(|| builtin_package_name(tool).to_string())
}

pub fn index_refresh_invocation() -> Invocation {
    Invocation::new("apt-get", ["update"]).privileged()
}

pub fn package_install_invocation(packages: &[String]) -> Invocation {
    let mut args = vec!["install".to_string(), "-y".to_string()];
    args.extend(packages.iter().cloned());
    Invocation::new("apt-get", args).privileged()
}

/// Probes `tools` and installs the packages for any that are missing with a
/// single refresh-then-install pass. Fails when either step fails or when a
/// tool is still absent afterwards.
pub fn audit_dependencies(
    host: &Host<'_>,
    tools: &[String],
    package_overrides: &BTreeMap<String, String>,
) -> Result<AuditReport> {
    let missing = tools
        .iter()
        .filter(|tool| !host.probe.is_present(tool))
        .cloned()
        .collect::<Vec<_>>();

    if missing.is_empty() {
        debug!(count = tools.len(), "all required tools present");
        return Ok(AuditReport {
            status: AuditStatus::AllPresent,
            missing,
            installed_packages: Vec::new(),
        });
    }

    let mut packages = Vec::new();
    for tool in &missing {
        let package = package_name_for(tool, package_overrides);
        if !packages.contains(&package) {
            packages.push(package);
        }
    }
    info!(missing = ?missing, packages = ?packages, "remediating missing tools");

    let install = package_install_invocation(&packages);
    let manual = format!(
        "{} && {}",
        host.manual_command(&index_refresh_invocation()),
        host.manual_command(&install)
    );

    run_remediation_step(host, &index_refresh_invocation(), &missing, &manual)?;
    run_remediation_step(host, &install, &missing, &manual)?;

    let still_missing = missing
        .iter()
        .filter(|tool| !host.probe.is_present(tool))
        .cloned()
        .collect::<Vec<_>>();
    if !still_missing.is_empty() {
        return Err(anyhow!(
            "dependency-remediation-failed: still missing after installing {}: {}; install them manually: {}",
            packages.join(", "),
            still_missing.join(", "),
            manual
        ));
    }

    Ok(AuditReport {
        status: AuditStatus::Remediated,
        missing,
        installed_packages: packages,
    })
}

fn run_remediation_step(
    host: &Host<'_>,
    invocation: &Invocation,
    missing: &[String],
    manual: &str,
) -> Result<()> {
    let step = host.manual_command(invocation);
    let outcome = host.run(invocation).map_err(|err| {
        anyhow!(
            "dependency-remediation-failed: could not run '{step}' for missing tools ({}): {err:#}; run manually: {manual}",
            missing.join(", ")
        )
    })?;
    if !outcome.success {
        return Err(anyhow!(
            "dependency-remediation-failed: '{step}' exited with {}: {}; run manually: {manual}",
            describe_exit(outcome.code),
            outcome.combined_output()
        ));
    }
    Ok(())
}

pub(crate) fn describe_exit(code: Option<i32>) -> String {
    code.map(|code| format!("status {code}"))
        .unwrap_or_else(|| "a signal".to_string())
}

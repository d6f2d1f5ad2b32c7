use std::path::Path;

use anyhow::Result;
use ghup_core::{plan_action, FlowState, InstalledVersion, PlannedAction, TOOL_BINARY};
use ghup_installer::{
    audit_dependencies, detect_installed, install_release, uninstall_tool, verify_installation,
    AuditStatus, CleanupSlot, Downloader, Host, InstallOutcome, InstallRequest, Invocation,
    RemovalMethod, UninstallResult, UninstallStatus, VerificationReport,
};
use ghup_release::{resolve_target_version, ReleaseSource, ResolvedVersion, VersionOrigin};
use tracing::{info, warn};

use crate::config::Settings;
use crate::prompt::Prompt;
use crate::render::{render_status_line, OutputStyle};

/// Collaborators shared by both top-level modes.
pub(crate) struct FlowContext<'a> {
    pub host: Host<'a>,
    pub prompt: &'a dyn Prompt,
    pub settings: &'a Settings,
    pub style: OutputStyle,
    pub emit: &'a dyn Fn(&str),
}

pub(crate) struct InstallCollaborators<'a> {
    pub releases: &'a dyn ReleaseSource,
    pub downloader: &'a dyn Downloader,
    pub cleanup: &'a CleanupSlot,
    pub arch: &'a str,
    pub workspace_parent: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigurationOffer {
    AlreadyAuthenticated,
    Declined,
    LoginCompleted,
    LoginFailed,
    Unavailable,
}

#[derive(Debug)]
pub(crate) struct InstallFlowReport {
    pub target: ResolvedVersion,
    pub action: PlannedAction,
    pub install: Option<InstallOutcome>,
    pub verification: VerificationReport,
    pub configuration: ConfigurationOffer,
}

impl FlowContext<'_> {
    fn status(&self, status: &str, message: &str) {
        (self.emit)(&render_status_line(self.style, status, message));
    }
}

pub(crate) fn auth_status_invocation() -> Invocation {
    Invocation::new(TOOL_BINARY, ["auth", "status"])
}

pub(crate) fn auth_login_invocation() -> Invocation {
    Invocation::new(TOOL_BINARY, ["auth", "login"]).interactive()
}

/// Drives one install/update/skip run, recording every state entered in
/// `trail`. A failing run ends with `FlowState::Failed`.
pub(crate) fn run_install_flow(
    ctx: &FlowContext<'_>,
    collaborators: &InstallCollaborators<'_>,
    requested: Option<&str>,
    trail: &mut Vec<FlowState>,
) -> Result<InstallFlowReport> {
    let result = drive_install_flow(ctx, collaborators, requested, trail);
    if result.is_err() {
        enter(trail, FlowState::Failed);
    }
    result
}

fn enter(trail: &mut Vec<FlowState>, state: FlowState) {
    info!(state = state.as_str(), "entering state");
    trail.push(state);
}

fn drive_install_flow(
    ctx: &FlowContext<'_>,
    collaborators: &InstallCollaborators<'_>,
    requested: Option<&str>,
    trail: &mut Vec<FlowState>,
) -> Result<InstallFlowReport> {
    let settings = ctx.settings;

    enter(trail, FlowState::Auditing);
    let audit = audit_dependencies(
        &ctx.host,
        &settings.host.required_tools,
        &settings.host.package_names,
    )?;
    match audit.status {
        AuditStatus::AllPresent => ctx.status("step", "required tools present"),
        AuditStatus::Remediated => ctx.status(
            "ok",
            &format!(
                "installed missing prerequisites: {}",
                audit.installed_packages.join(", ")
            ),
        ),
    }

    enter(trail, FlowState::ResolvingVersion);
    let target = resolve_target_version(requested, collaborators.releases)?;
    let origin = match target.origin {
        VersionOrigin::Latest => "latest release",
        VersionOrigin::Requested => "requested",
    };
    ctx.status("step", &format!("target {TOOL_BINARY} {} ({origin})", target.version));

    enter(trail, FlowState::DetectingCurrent);
    let installed = detect_installed(&ctx.host);
    let action = plan_action(&installed, &target.version);

    enter(trail, FlowState::for_action(&action));
    let install = match &action {
        PlannedAction::Skip => {
            ctx.status(
                "ok",
                &format!("{TOOL_BINARY} {} is already installed", target.version),
            );
            None
        }
        PlannedAction::Install => {
            ctx.status("step", &format!("installing {TOOL_BINARY} {}", target.version));
            Some(run_install(ctx, collaborators, &target)?)
        }
        PlannedAction::Update { from } => {
            let verb = if action.is_downgrade(&target.version) {
                "downgrading"
            } else {
                "updating"
            };
            ctx.status(
                "step",
                &format!("{verb} {TOOL_BINARY} {from} -> {}", target.version),
            );
            Some(run_install(ctx, collaborators, &target)?)
        }
    };

    enter(trail, FlowState::Verifying);
    let verification = verify_installation(&ctx.host, &settings.host.runtime_tools);
    for check in &verification.checks {
        let status = if check.passed { "ok" } else { "warn" };
        ctx.status(status, &format!("{}: {}", check.kind.as_str(), check.detail));
    }

    enter(trail, FlowState::OfferingConfiguration);
    let configuration = offer_configuration(ctx)?;

    enter(trail, FlowState::Done);
    Ok(InstallFlowReport {
        target,
        action,
        install,
        verification,
        configuration,
    })
}

fn run_install(
    ctx: &FlowContext<'_>,
    collaborators: &InstallCollaborators<'_>,
    target: &ResolvedVersion,
) -> Result<InstallOutcome> {
    let release = &ctx.settings.release;
    let request = InstallRequest {
        version: &target.version,
        arch: collaborators.arch,
        download_base_url: &release.download_base_url,
        verify_checksums: release.verify_checksums,
        workspace_parent: collaborators.workspace_parent,
    };
    let already_leaked = collaborators.cleanup.leaked_workspaces().len();
    let result = install_release(
        &ctx.host,
        collaborators.downloader,
        collaborators.cleanup,
        &request,
    );
    for path in collaborators
        .cleanup
        .leaked_workspaces()
        .iter()
        .skip(already_leaked)
    {
        ctx.status("warn", &leaked_workspace_message(path));
    }
    let outcome = result?;

    if outcome.dependencies_remediated {
        ctx.status("warn", "package dependencies were resolved before a retry");
    }
    let verified = if outcome.checksum_verified {
        ", checksum verified"
    } else {
        ""
    };
    ctx.status(
        "ok",
        &format!(
            "installed {TOOL_BINARY} {} ({}{verified})",
            outcome.version, outcome.artifact.file_name
        ),
    );
    Ok(outcome)
}

pub(crate) fn leaked_workspace_message(path: &Path) -> String {
    format!(
        "could not remove install workspace {}; delete it manually",
        path.display()
    )
}

fn offer_configuration(ctx: &FlowContext<'_>) -> Result<ConfigurationOffer> {
    let status = match ctx.host.run(&auth_status_invocation()) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "could not query authentication status");
            ctx.status("warn", "could not check authentication status; skipping login offer");
            return Ok(ConfigurationOffer::Unavailable);
        }
    };
    if status.success {
        ctx.status("ok", &format!("{TOOL_BINARY} is authenticated"));
        return Ok(ConfigurationOffer::AlreadyAuthenticated);
    }

    let login = auth_login_invocation();
    let question = format!(
        "{TOOL_BINARY} is not authenticated. Run '{}' now?",
        login.command_line()
    );
    if !ctx.prompt.confirm(&question, ctx.settings.prompt.default_answer)? {
        ctx.status(
            "step",
            &format!("skipped login; run '{}' later", login.command_line()),
        );
        return Ok(ConfigurationOffer::Declined);
    }

    match ctx.host.run(&login) {
        Ok(outcome) if outcome.success => {
            ctx.status("ok", "login completed");
            Ok(ConfigurationOffer::LoginCompleted)
        }
        Ok(_) => {
            ctx.status(
                "warn",
                &format!("login did not complete; run '{}' to retry", login.command_line()),
            );
            Ok(ConfigurationOffer::LoginFailed)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "login flow could not start");
            ctx.status(
                "warn",
                &format!("login could not start; run '{}' to retry", login.command_line()),
            );
            Ok(ConfigurationOffer::LoginFailed)
        }
    }
}

pub(crate) fn run_uninstall_flow(
    ctx: &FlowContext<'_>,
    config_dir: &Path,
) -> Result<UninstallResult> {
    let result = uninstall_tool(&ctx.host, config_dir, |version, existing| {
        confirm_config_removal(ctx, version, existing)
    })?;

    if result.status == UninstallStatus::NotInstalled {
        ctx.status("ok", &format!("{TOOL_BINARY} is not installed; nothing to remove"));
        return Ok(result);
    }

    let previous = result
        .previous
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| InstalledVersion::Unknown.to_string());
    let method = match result.removal {
        Some(RemovalMethod::DpkgFallback) => " (dpkg fallback)",
        _ => "",
    };
    ctx.status("ok", &format!("removed {TOOL_BINARY} {previous}{method}"));

    if result.config_removed {
        ctx.status(
            "ok",
            &format!("deleted configuration {}", config_dir.display()),
        );
    } else if config_dir.exists() {
        ctx.status(
            "step",
            &format!("kept configuration {}", config_dir.display()),
        );
    }

    if let Some(path) = &result.still_on_path {
        ctx.status(
            "warn",
            &format!(
                "{TOOL_BINARY} still resolves at {}; open a new shell or remove it manually",
                path.display()
            ),
        );
    }
    Ok(result)
}

fn confirm_config_removal(
    ctx: &FlowContext<'_>,
    version: &InstalledVersion,
    existing: Option<&Path>,
) -> Result<bool> {
    ctx.status("step", &format!("found {TOOL_BINARY} {version}"));
    let Some(dir) = existing else {
        return Ok(false);
    };
    ctx.prompt.confirm(
        &format!("Also delete {TOOL_BINARY} configuration at {}?", dir.display()),
        ctx.settings.prompt.default_answer,
    )
}

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use ghup_core::host_arch_token;
use ghup_installer::{
    settings_path, tool_config_dir, workspace_parent, CleanupSlot, Escalation, Host, PathProbe,
    SystemRunner,
};
use ghup_release::ReleaseClient;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod download;
mod flows;
mod prompt;
mod render;

use config::Settings;
use download::HttpArtifactDownloader;
use flows::{
    leaked_workspace_message, run_install_flow, run_uninstall_flow, FlowContext,
    InstallCollaborators,
};
use prompt::prompt_for;
use render::{
    current_output_style, render_error_lines, render_section_header, render_status_line,
    OutputStyle,
};

const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "ghup")]
#[command(about = "Install, update or remove the GitHub CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Remove gh (and optionally its configuration) instead of installing.
    #[arg(long)]
    uninstall: bool,
    /// Answer every prompt with its configured default.
    #[arg(long)]
    non_interactive: bool,
    /// Raise diagnostic verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Exact version to install, e.g. 2.40.1. Defaults to the latest release.
    #[arg(value_name = "VERSION", allow_hyphen_values = true)]
    target_version: Option<String>,
    /// Anything after VERSION. Ignored by --uninstall, rejected otherwise.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..,
        hide = true
    )]
    extra: Vec<String>,
}

impl Cli {
    /// The version argument as validation should see it. Extra words are
    /// kept so a request like `2.40.1 beta` fails as a malformed version.
    fn requested_version(&self) -> Option<String> {
        if self.extra.is_empty() {
            return self.target_version.clone();
        }
        let words: Vec<&str> = self
            .target_version
            .iter()
            .chain(&self.extra)
            .map(String::as_str)
            .collect();
        Some(words.join(" "))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let style = current_output_style();

    match run(cli, style) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            for line in render_error_lines(style, &err) {
                eprintln!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, style: OutputStyle) -> Result<()> {
    let mut settings = Settings::load(&settings_path()?)?;
    settings.apply_env_overrides(|key| std::env::var(key).ok())?;

    let cleanup = CleanupSlot::new();
    install_interrupt_handler(&cleanup, style)?;

    let non_interactive = cli.non_interactive
        || settings.prompt.non_interactive
        || !std::io::stdin().is_terminal();
    let prompt = prompt_for(non_interactive);
    let runner = SystemRunner;
    let probe = PathProbe;
    let host = Host::new(&runner, &probe, Escalation::detect(settings.host.use_sudo));
    debug!(escalation = ?host.escalation, non_interactive, "host configured");

    let emit = |line: &str| println!("{line}");
    let ctx = FlowContext {
        host,
        prompt: prompt.as_ref(),
        settings: &settings,
        style,
        emit: &emit,
    };

    if cli.uninstall {
        print_section(style, "uninstall gh");
        run_uninstall_flow(&ctx, &tool_config_dir()?)?;
        return Ok(());
    }

    print_section(style, "install gh");
    let client = ReleaseClient::new(settings.release.api_url.clone(), user_agent())?;
    let downloader = HttpArtifactDownloader::new(&client, style);
    let workspace_parent = workspace_parent();
    let collaborators = InstallCollaborators {
        releases: &client,
        downloader: &downloader,
        cleanup: &cleanup,
        arch: host_arch_token()?,
        workspace_parent: &workspace_parent,
    };

    let requested = cli.requested_version();
    let mut trail = Vec::new();
    let result = run_install_flow(&ctx, &collaborators, requested.as_deref(), &mut trail);
    debug!(
        trail = ?trail.iter().map(|state| state.as_str()).collect::<Vec<_>>(),
        "install flow finished"
    );
    result.map(|_| ())
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("GHUP_LOG").unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// SIGINT/SIGTERM release any armed workspace before the process exits. The
/// slot is shut down first so the main thread cannot arm a new one meanwhile.
fn install_interrupt_handler(cleanup: &CleanupSlot, style: OutputStyle) -> Result<()> {
    let slot = cleanup.clone();
    ctrlc::set_handler(move || {
        let already_leaked = slot.leaked_workspaces().len();
        let message = if slot.shutdown() {
            "interrupted; released install workspace"
        } else {
            "interrupted"
        };
        eprintln!("{}", render_status_line(style, "warn", message));
        for path in slot.leaked_workspaces().iter().skip(already_leaked) {
            eprintln!(
                "{}",
                render_status_line(style, "warn", &leaked_workspace_message(path))
            );
        }
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
    .context("failed to install interrupt handler")
}

fn print_section(style: OutputStyle, title: &str) {
    if let Some(line) = render_section_header(style, title) {
        println!("{line}");
    }
}

fn user_agent() -> String {
    format!("ghup/{}", env!("CARGO_PKG_VERSION"))
}

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

/// A host command before escalation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub privileged: bool,
    pub interactive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Sudo,
    Direct,
}

pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;
}

pub trait ToolProbe {
    fn locate(&self, tool: &str) -> Option<PathBuf>;

    fn is_present(&self, tool: &str) -> bool {
        self.locate(tool).is_some()
    }
}

/// The collaborators every host-facing operation goes through.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub runner: &'a dyn CommandRunner,
    pub probe: &'a dyn ToolProbe,
    pub escalation: Escalation,
}

pub struct SystemRunner;

pub struct PathProbe;

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            privileged: false,
            interactive: false,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl CommandOutcome {
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout.trim(), self.stderr.trim())
            .trim()
            .to_string()
    }
}

impl Escalation {
    pub fn detect(use_sudo: bool) -> Self {
        if use_sudo && !running_as_root() {
            Self::Sudo
        } else {
            Self::Direct
        }
    }

    pub fn apply(self, invocation: &Invocation) -> Invocation {
        if !invocation.privileged || self == Self::Direct {
            return invocation.clone();
        }
        let mut args = Vec::with_capacity(invocation.args.len() + 1);
        args.push(invocation.program.clone());
        args.extend(invocation.args.iter().cloned());
        Invocation {
            program: "sudo".to_string(),
            args,
            privileged: true,
            interactive: invocation.interactive,
        }
    }
}

impl<'a> Host<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        probe: &'a dyn ToolProbe,
        escalation: Escalation,
    ) -> Self {
        Self {
            runner,
            probe,
            escalation,
        }
    }

    pub fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        let effective = self.escalation.apply(invocation);
        debug!(command = %effective.command_line(), "running host command");
        self.runner.run(&effective)
    }

    /// How a user would run `invocation` by hand on this host.
    pub fn manual_command(&self, invocation: &Invocation) -> String {
        self.escalation.apply(invocation).command_line()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        let mut command = invocation.to_command();
        if invocation.interactive {
            let status = command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .with_context(|| {
                    format!("failed to launch '{}'", invocation.command_line())
                })?;
            return Ok(CommandOutcome {
                success: status.success(),
                code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let output = command
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to launch '{}'", invocation.command_line()))?;
        Ok(CommandOutcome {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl ToolProbe for PathProbe {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

fn running_as_root() -> bool {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| effective_uid(&status))
        .is_some_and(|uid| uid == 0)
}

pub(crate) fn effective_uid(proc_status: &str) -> Option<u32> {
    let line = proc_status.lines().find(|line| line.starts_with("Uid:"))?;
    line.split_whitespace().nth(2)?.parse().ok()
}

use std::fmt;

use crate::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    Known(Version),
    /// The tool is present but its self-report could not be parsed.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledState {
    NotInstalled,
    InstalledAt(InstalledVersion),
}

impl InstalledState {
    /// `Unknown` never matches, so an unreadable install is always replaced.
    pub fn matches(&self, target: &Version) -> bool {
        matches!(self, Self::InstalledAt(InstalledVersion::Known(current)) if current == target)
    }
}

impl fmt::Display for InstalledVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(version) => write!(f, "{version}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Install,
    Update { from: InstalledVersion },
    Skip,
}

pub fn plan_action(installed: &InstalledState, target: &Version) -> PlannedAction {
    match installed {
        InstalledState::NotInstalled => PlannedAction::Install,
        state if state.matches(target) => PlannedAction::Skip,
        InstalledState::InstalledAt(current) => PlannedAction::Update {
            from: current.clone(),
        },
    }
}

impl PlannedAction {
    pub fn is_downgrade(&self, target: &Version) -> bool {
        matches!(self, Self::Update { from: InstalledVersion::Known(current) } if current > target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Auditing,
    ResolvingVersion,
    DetectingCurrent,
    Installing,
    Updating,
    Skipping,
    Verifying,
    OfferingConfiguration,
    Done,
    Failed,
}

impl FlowState {
    pub fn for_action(action: &PlannedAction) -> Self {
        match action {
            PlannedAction::Install => Self::Installing,
            PlannedAction::Update { .. } => Self::Updating,
            PlannedAction::Skip => Self::Skipping,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auditing => "auditing",
            Self::ResolvingVersion => "resolving-version",
            Self::DetectingCurrent => "detecting-current",
            Self::Installing => "installing",
            Self::Updating => "updating",
            Self::Skipping => "skipping",
            Self::Verifying => "verifying",
            Self::OfferingConfiguration => "offering-configuration",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

mod checksum;
mod deps;
mod detect;
mod executor;
mod fs_utils;
mod host;
mod paths;
mod uninstall;
mod verify;
mod workspace;

pub use checksum::{find_listed_checksum, sha256_hex, sha256_reader_hex, verify_sha256_file};
pub use deps::{
    audit_dependencies, index_refresh_invocation, package_install_invocation, package_name_for,
    AuditReport, AuditStatus,
};
pub use detect::{detect_installed, version_report_invocation};
pub use executor::{
    dependency_fix_invocation, install_release, is_unmet_dependency_failure,
    package_file_install_invocation, Downloader, InstallOutcome, InstallRequest,
};
pub use fs_utils::remove_dir_if_exists;
pub use host::{
    CommandOutcome, CommandRunner, Escalation, Host, Invocation, PathProbe, SystemRunner,
    ToolProbe,
};
pub use paths::{
    settings_path, settings_path_from, tool_config_dir, tool_config_dir_from, workspace_parent,
};
pub use uninstall::{
    dpkg_remove_invocation, package_remove_invocation, uninstall_tool, RemovalMethod,
    UninstallResult, UninstallStatus,
};
pub use verify::{help_invocation, verify_installation, CheckKind, CheckResult, VerificationReport};
pub use workspace::{CleanupSlot, Workspace};

#[cfg(test)]
mod tests;

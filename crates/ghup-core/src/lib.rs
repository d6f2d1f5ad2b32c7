mod state;
mod tool;
mod version;

pub use state::{plan_action, FlowState, InstalledState, InstalledVersion, PlannedAction};
pub use tool::{
    arch_token, artifact_file_name, artifact_location, builtin_package_name, checksums_file_name,
    host_arch_token, ArtifactLocation, DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_RELEASES_API_URL,
    DEFAULT_REQUIRED_TOOLS, DEFAULT_RUNTIME_TOOLS, TOOL_BINARY, TOOL_PACKAGE, TOOL_VERSION_LABEL,
};
pub use version::{parse_reported_version, Version, VERSION_FORMAT_HINT};

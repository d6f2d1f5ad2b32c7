use anyhow::{anyhow, Result};

use crate::Version;

pub const TOOL_BINARY: &str = "gh";
pub const TOOL_PACKAGE: &str = "gh";
pub const TOOL_VERSION_LABEL: &str = "gh version";

pub const DEFAULT_RELEASES_API_URL: &str = "https://api.github.com/repos/cli/cli/releases?per_page=1";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://github.com/cli/cli/releases/download";

pub const DEFAULT_REQUIRED_TOOLS: &[&str] = &["gpg", "update-ca-certificates", "dpkg-deb"];
pub const DEFAULT_RUNTIME_TOOLS: &[&str] = &["git", "ssh"];

/// Logical tool name to Debian package name. Names not listed here are
/// their own package.
const PACKAGE_NAMES: &[(&str, &str)] = &[
    ("gpg", "gnupg"),
    ("update-ca-certificates", "ca-certificates"),
    ("dpkg-deb", "dpkg"),
    ("ssh", "openssh-client"),
];

pub fn builtin_package_name(tool: &str) -> &str {
    PACKAGE_NAMES
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, package)| *package)
        .unwrap_or(tool)
}

/// Architecture token used in upstream artifact names.
pub fn arch_token(arch: &str) -> Result<&'static str> {
    match arch {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        "arm" => Ok("armv6"),
        "x86" => Ok("386"),
        other => Err(anyhow!(
            "unsupported-architecture: no upstream package is published for '{other}'"
        )),
    }
}

pub fn host_arch_token() -> Result<&'static str> {
    arch_token(std::env::consts::ARCH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub file_name: String,
    pub url: String,
    pub checksums_url: String,
}

pub fn artifact_file_name(version: &Version, arch: &str) -> String {
    format!("{TOOL_PACKAGE}_{version}_linux_{arch}.deb")
}

pub fn checksums_file_name(version: &Version) -> String {
    format!("{TOOL_PACKAGE}_{version}_checksums.txt")
}

pub fn artifact_location(base_url: &str, version: &Version, arch: &str) -> ArtifactLocation {
    let base = base_url.trim_end_matches('/');
    let file_name = artifact_file_name(version, arch);
    ArtifactLocation {
        url: format!("{base}/v{version}/{file_name}"),
        checksums_url: format!("{base}/v{version}/{}", checksums_file_name(version)),
        file_name,
    }
}

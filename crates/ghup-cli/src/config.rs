use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ghup_core::{
    DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_RELEASES_API_URL, DEFAULT_REQUIRED_TOOLS,
    DEFAULT_RUNTIME_TOOLS,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub release: ReleaseSettings,
    pub host: HostSettings,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ReleaseSettings {
    pub api_url: String,
    pub download_base_url: String,
    pub verify_checksums: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HostSettings {
    pub use_sudo: bool,
    pub required_tools: Vec<String>,
    pub runtime_tools: Vec<String>,
    /// Merged over the built-in tool-to-package table.
    pub package_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PromptSettings {
    pub non_interactive: bool,
    pub default_answer: bool,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_RELEASES_API_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            verify_checksums: true,
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            use_sudo: true,
            required_tools: DEFAULT_REQUIRED_TOOLS.iter().map(|tool| tool.to_string()).collect(),
            runtime_tools: DEFAULT_RUNTIME_TOOLS.iter().map(|tool| tool.to_string()).collect(),
            package_names: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(input).map_err(|err| anyhow!("config-invalid: {err}"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `path`, treating a missing file as all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file; using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("config-invalid: failed to read {}", path.display())
                })
            }
        };
        Self::from_toml_str(&raw).map_err(|err| anyhow!("{err} (in {})", path.display()))
    }

    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env("GHUP_RELEASES_URL").filter(|value| !value.trim().is_empty()) {
            self.release.api_url = url.trim().to_string();
        }
        if let Some(url) = env("GHUP_DOWNLOAD_BASE_URL").filter(|value| !value.trim().is_empty())
        {
            self.release.download_base_url = url.trim().to_string();
        }
        if let Some(raw) = env("GHUP_NON_INTERACTIVE") {
            self.prompt.non_interactive = parse_flag(&raw).ok_or_else(|| {
                anyhow!("config-invalid: GHUP_NON_INTERACTIVE must be 1/0 or true/false, got '{raw}'")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("release.api_url", &self.release.api_url),
            ("release.download_base_url", &self.release.download_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("config-invalid: {field} must not be empty"));
            }
        }
        let tools = self
            .host
            .required_tools
            .iter()
            .chain(&self.host.runtime_tools)
            .chain(self.host.package_names.keys())
            .chain(self.host.package_names.values());
        for tool in tools {
            if tool.trim().is_empty() || tool.chars().any(char::is_whitespace) {
                return Err(anyhow!(
                    "config-invalid: tool and package names must be single words, got '{tool}'"
                ));
            }
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

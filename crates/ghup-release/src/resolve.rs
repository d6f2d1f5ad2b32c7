use anyhow::{anyhow, Result};
use ghup_core::Version;
use tracing::{debug, info};

use crate::listing::{latest_tag, parse_release_listing};

pub trait ReleaseSource {
    /// Raw body of the release-listing endpoint.
    fn fetch_release_listing(&self) -> Result<String>;

    fn describe(&self) -> String {
        "release listing".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrigin {
    Requested,
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: Version,
    pub origin: VersionOrigin,
    pub tag: Option<String>,
}

pub fn resolve_target_version(
    requested: Option<&str>,
    source: &dyn ReleaseSource,
) -> Result<ResolvedVersion> {
    if let Some(raw) = requested {
        let version = Version::parse_requested(raw)?;
        debug!(%version, "using requested version");
        return Ok(ResolvedVersion {
            version,
            origin: VersionOrigin::Requested,
            tag: None,
        });
    }

    resolve_latest_version(source)
}

pub fn resolve_latest_version(source: &dyn ReleaseSource) -> Result<ResolvedVersion> {
    let body = source.fetch_release_listing().map_err(|err| {
        anyhow!(
            "release-lookup-failed: could not query {}: {err:#}; check your network connection or proxy settings, or pass an explicit version",
            source.describe()
        )
    })?;
    let records = parse_release_listing(&body)?;
    let Some(tag) = latest_tag(&records) else {
        return Err(anyhow!(
            "release-lookup-failed: {} returned no usable release tag; check your network connection or API rate limits, or pass an explicit version",
            source.describe()
        ));
    };

    let version = Version::from_release_tag(tag)?;
    info!(tag, %version, "resolved latest release");
    Ok(ResolvedVersion {
        version,
        origin: VersionOrigin::Latest,
        tag: Some(tag.to_string()),
    })
}

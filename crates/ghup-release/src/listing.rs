use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseRecord {
    #[serde(default)]
    pub tag_name: Option<String>,
}

pub fn parse_release_listing(body: &str) -> Result<Vec<ReleaseRecord>> {
    serde_json::from_str(body).context("release-lookup-failed: release listing is not a JSON array of releases")
}

/// Tag of the most recent (first) record; `None` for an empty listing or a
/// missing, null or blank tag.
pub fn latest_tag(records: &[ReleaseRecord]) -> Option<&str> {
    records
        .first()
        .and_then(|record| record.tag_name.as_deref())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
}

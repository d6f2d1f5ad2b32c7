use std::cmp::Ordering;
use std::fmt;

use anyhow::{anyhow, Result};

/// A `major.minor.patch` release number of the managed tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

pub const VERSION_FORMAT_HINT: &str = "expected MAJOR.MINOR.PATCH with numeric components (e.g. 2.40.1, 1.61.0)";

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Strictly parses a user-supplied version: exactly three dot-separated
    /// runs of ASCII digits and nothing else.
    pub fn parse_requested(input: &str) -> Result<Self> {
        parse_triplet(input).map_err(|err| match err {
            TripletError::Malformed => anyhow!(
                "version-format-invalid: '{input}' is not a valid version; {VERSION_FORMAT_HINT}"
            ),
            TripletError::OutOfRange => anyhow!(
                "version-format-invalid: '{input}' has a component out of range; each must be at most {}",
                u64::MAX
            ),
        })
    }

    /// Normalizes a release tag such as `v2.40.1` by dropping one leading
    /// non-numeric character before parsing.
    pub fn from_release_tag(tag: &str) -> Result<Self> {
        let trimmed = tag.trim();
        let candidate = match trimmed.chars().next() {
            Some(first) if !first.is_ascii_digit() => &trimmed[first.len_utf8()..],
            _ => trimmed,
        };
        parse_triplet(candidate).map_err(|_| {
            anyhow!(
                "release-lookup-failed: latest release tag '{tag}' does not carry a version; {VERSION_FORMAT_HINT}"
            )
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripletError {
    Malformed,
    /// Well-formed digits that do not fit a `u64`.
    OutOfRange,
}

fn parse_triplet(input: &str) -> Result<Version, TripletError> {
    let mut parts = input.split('.');
    let mut components = [0_u64; 3];
    for slot in &mut components {
        let part = parts.next().ok_or(TripletError::Malformed)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TripletError::Malformed);
        }
        *slot = part.parse().map_err(|_| TripletError::OutOfRange)?;
    }
    if parts.next().is_some() {
        return Err(TripletError::Malformed);
    }
    Ok(Version::new(components[0], components[1], components[2]))
}

/// Extracts the version from the tool's self-report, e.g.
/// `gh version 2.40.1 (2023-12-13)`. The first line carrying `label`
/// followed by a numeric triplet wins.
pub fn parse_reported_version(output: &str, label: &str) -> Option<Version> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once(label)?;
        let token = rest.split_whitespace().next()?;
        let token = token.strip_prefix('v').unwrap_or(token);
        parse_triplet(token).ok()
    })
}

mod client;
mod listing;
mod resolve;

pub use client::ReleaseClient;
pub use listing::{latest_tag, parse_release_listing, ReleaseRecord};
pub use resolve::{
    resolve_latest_version, resolve_target_version, ReleaseSource, ResolvedVersion, VersionOrigin,
};

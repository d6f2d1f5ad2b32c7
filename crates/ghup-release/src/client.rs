use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::debug;

use crate::resolve::ReleaseSource;

const GITHUB_JSON: &str = "application/vnd.github+json";
const COPY_BUFFER_LEN: usize = 64 * 1024;

/// Blocking HTTP access to the release listing and release assets.
///
/// No request timeout is configured: slow links block until the transfer
/// finishes or the user interrupts.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: Client,
    api_url: String,
    user_agent: String,
}

impl ReleaseClient {
    pub fn new(api_url: impl Into<String>, user_agent: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            user_agent: user_agent.into(),
        })
    }

    fn get(&self, url: &str, accept: &str) -> Result<Response> {
        debug!(url, "http get");
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned HTTP {status}"));
        }
        Ok(response)
    }

    pub fn fetch_text(&self, url: &str) -> Result<String> {
        self.get(url, "text/plain, */*")?
            .text()
            .with_context(|| format!("failed reading response body from {url}"))
    }

    /// Streams `url` into `destination`, reporting `(received, total)` after
    /// each chunk. Bytes land in `<destination>.part` and are renamed into
    /// place only once the body has been read completely.
    pub fn download_to(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        let mut response = self.get(url, "application/octet-stream")?;
        let total = response.content_length();

        let part_path = destination.with_file_name(format!(
            "{}.part",
            destination
                .file_name()
                .and_then(|v| v.to_str())
                .unwrap_or("artifact")
        ));

        let result = copy_body(&mut response, &part_path, total, on_progress);
        let received = match result {
            Ok(received) => received,
            Err(err) => {
                let _ = fs::remove_file(&part_path);
                return Err(err);
            }
        };

        if let Some(expected) = total {
            if received != expected {
                let _ = fs::remove_file(&part_path);
                return Err(anyhow!(
                    "transfer from {url} ended after {received} of {expected} bytes"
                ));
            }
        }

        fs::rename(&part_path, destination).with_context(|| {
            format!(
                "failed to move downloaded artifact into place: {}",
                destination.display()
            )
        })?;
        Ok(received)
    }
}

pub(crate) fn copy_body(
    body: &mut dyn Read,
    part_path: &Path,
    total: Option<u64>,
    on_progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<u64> {
    let mut file = fs::File::create(part_path)
        .with_context(|| format!("failed to create {}", part_path.display()))?;
    let mut buffer = vec![0_u8; COPY_BUFFER_LEN];
    let mut received = 0_u64;
    loop {
        let read = match body.read(&mut buffer) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(err).context("transfer interrupted while reading response body")
            }
        };
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .with_context(|| format!("failed writing {}", part_path.display()))?;
        received += read as u64;
        on_progress(received, total);
    }
    file.flush()
        .with_context(|| format!("failed flushing {}", part_path.display()))?;
    Ok(received)
}

impl ReleaseSource for ReleaseClient {
    fn fetch_release_listing(&self) -> Result<String> {
        self.get(&self.api_url, GITHUB_JSON)?
            .text()
            .with_context(|| format!("failed reading release listing from {}", self.api_url))
    }

    fn describe(&self) -> String {
        format!("release listing at {}", self.api_url)
    }
}


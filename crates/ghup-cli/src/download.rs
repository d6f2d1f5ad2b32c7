use std::path::Path;

use anyhow::Result;
use ghup_installer::Downloader;
use ghup_release::ReleaseClient;

use crate::render::{OutputStyle, TerminalProgress};

pub(crate) struct HttpArtifactDownloader<'a> {
    client: &'a ReleaseClient,
    style: OutputStyle,
}

impl<'a> HttpArtifactDownloader<'a> {
    pub(crate) fn new(client: &'a ReleaseClient, style: OutputStyle) -> Self {
        Self { client, style }
    }
}

impl Downloader for HttpArtifactDownloader<'_> {
    fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let mut progress = TerminalProgress::start(self.style, "download");
        let result = self
            .client
            .download_to(url, destination, &mut |received, total| {
                progress.set(received, total)
            });
        match result {
            Ok(_) => {
                progress.finish_success();
                Ok(())
            }
            Err(err) => {
                progress.finish_abandon();
                Err(err)
            }
        }
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        self.client.fetch_text(url)
    }
}

//! Two-stage harvesting pipeline: fetch metadata, then download media.

mod download;
mod fetch;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::batch::{BatchSummary, organize_batches};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::{HttpResolver, Resolver};
use crate::source::read_urls;
use crate::store::StateStore;
use crate::types::{DownloadSummary, FetchSummary, MediaMap, ProcessingOrder, RunReport};

use download::DownloadScheduler;
use fetch::FetchScheduler;

/// Main entry point: runs the fetch and download stages over a URL list
///
/// Cheap to share by reference; each stage derives its own abort token from the
/// harvester's shutdown token, so cancelling [`Harvester::shutdown_token`] stops both
/// stages after they persist their state.
pub struct Harvester {
    config: Arc<Config>,
    store: StateStore,
    resolver: Arc<dyn Resolver>,
    client: reqwest::Client,
    shutdown: CancellationToken,
}

impl Harvester {
    /// Create a harvester using the HTTP resolver from `config.resolver`
    pub fn new(config: Config) -> Result<Self> {
        let resolver = HttpResolver::new(&config.resolver)?;
        Self::with_resolver(config, Arc::new(resolver))
    }

    /// Create a harvester with a custom [`Resolver`]
    pub fn with_resolver(config: Config, resolver: Arc<dyn Resolver>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.download.request_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            store: StateStore::new(config.paths.clone()),
            config: Arc::new(config),
            resolver,
            client,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops both stages when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State store backing this harvester
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run the whole pipeline over the URLs listed in `input`
    ///
    /// Only an unreadable input file is an error. Stage failures are logged, summarised in
    /// the report and persisted; the download stage is skipped when no records exist.
    pub async fn run(&self, input: &Path, order: ProcessingOrder) -> Result<RunReport> {
        let urls = read_urls(input, order).await?;
        tracing::info!(
            input = %input.display(),
            urls = urls.len(),
            order = ?order,
            "Starting harvest"
        );

        let (media, fetch) = self.fetch(&urls).await;

        let download = if media.is_empty() {
            tracing::info!("No data to download");
            None
        } else if self.shutdown.is_cancelled() {
            tracing::info!("Shutdown requested, skipping downloads");
            None
        } else {
            Some(self.download(media).await)
        };

        Ok(RunReport { fetch, download })
    }

    /// Fetch stage on its own: resolve unseen URLs and return the merged media map
    pub async fn fetch(&self, urls: &[String]) -> (MediaMap, FetchSummary) {
        FetchScheduler::new(
            &self.config.fetch,
            &self.store,
            Arc::clone(&self.resolver),
            &self.shutdown,
        )
        .run(urls)
        .await
    }

    /// Download stage on its own over `media`
    pub async fn download(&self, media: MediaMap) -> DownloadSummary {
        DownloadScheduler::new(
            &self.config.download,
            &self.store,
            &self.client,
            &self.shutdown,
        )
        .run(media)
        .await
    }

    /// Delete one URL's record from the media data file
    pub async fn remove_record(&self, url: &str) -> Result<bool> {
        self.store.remove_record(url).await
    }

    /// Move downloaded records into `batch_<n>` folders of `size` records
    pub async fn organize_batches(&self, size: usize) -> Result<BatchSummary> {
        organize_batches(&self.store, size).await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

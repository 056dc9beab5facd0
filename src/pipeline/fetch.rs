//! Fetch stage: resolves new URLs into media records.
//!
//! URLs already known (media data, history or fetch errors) are never sent to the
//! resolver. The rest go through a bounded pool until the attempt cap, the success cap or
//! an authorization failure stops scheduling; tasks already running are allowed to finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::FailureClass;
use crate::resolver::Resolver;
use crate::retry::with_retry;
use crate::store::{StateStore, save_logged};
use crate::types::{ContentKind, FetchErrorEntry, FetchSummary, MediaMap, MediaRecord};

/// Result of one fetch task
#[derive(Debug)]
enum FetchOutcome {
    Fetched(String, Box<MediaRecord>),
    Permanent(FetchErrorEntry),
    Transient,
    Unauthorized,
    /// Not started: cap reached or stage aborted
    Skipped,
}

/// Bounded-concurrency metadata fetcher
pub(crate) struct FetchScheduler<'a> {
    config: &'a FetchConfig,
    store: &'a StateStore,
    resolver: Arc<dyn Resolver>,
    shutdown: CancellationToken,
    abort: CancellationToken,
    fetched: AtomicUsize,
    attempts: AtomicUsize,
}

impl<'a> FetchScheduler<'a> {
    /// Create a scheduler whose abort token is a child of `shutdown`
    pub(crate) fn new(
        config: &'a FetchConfig,
        store: &'a StateStore,
        resolver: Arc<dyn Resolver>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
            shutdown: shutdown.clone(),
            abort: shutdown.child_token(),
            fetched: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fetch metadata for the unseen URLs among `urls`, persist, and return the full map
    ///
    /// Never fails: per-URL errors are classified and logged, and state is written on
    /// every exit path.
    pub(crate) async fn run(&self, urls: &[String]) -> (MediaMap, FetchSummary) {
        let mut media = self.store.load_media().await;
        let mut history = self.store.load_history().await;
        let prior_errors = self.store.load_fetch_errors().await;

        let skip = StateStore::skip_set(&media, &history, &prior_errors);
        let pending: Vec<&String> = urls
            .iter()
            .filter(|url| !skip.contains(url.as_str()))
            .take(self.config.max_total_attempts)
            .collect();

        tracing::info!(
            candidates = urls.len(),
            already_known = urls.len().saturating_sub(pending.len()),
            scheduled = pending.len(),
            "Starting fetch stage"
        );

        let outcomes: Vec<FetchOutcome> = stream::iter(pending.iter().copied())
            .map(|url| self.fetch_one(url))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut summary = FetchSummary {
            scheduled: pending.len(),
            ..Default::default()
        };
        let mut new_urls = Vec::new();
        let mut new_errors = Vec::new();

        for outcome in outcomes {
            match outcome {
                FetchOutcome::Fetched(url, record) => {
                    media.insert(url.clone(), *record);
                    new_urls.push(url);
                }
                FetchOutcome::Permanent(entry) => new_errors.push(entry),
                FetchOutcome::Transient => summary.transient_failures += 1,
                FetchOutcome::Unauthorized | FetchOutcome::Skipped => {}
            }
        }

        summary.fetched = new_urls.len();
        summary.attempts = self.attempts.load(Ordering::Relaxed);
        summary.aborted = self.abort.is_cancelled();

        let paths = self.store.paths();
        StateStore::mark_fetched(&mut history, &new_urls);
        save_logged(&paths.data_file, &media, "media data").await;
        save_logged(&paths.history_file, &history, "history").await;

        summary.permanent_failures = new_errors.len();
        if !new_errors.is_empty() {
            match self.store.save_fetch_errors(&prior_errors, &new_errors).await {
                Ok(added) => tracing::info!(added, "Saved new fetch errors"),
                Err(e) => tracing::error!(error = %e, "Failed to save fetch errors"),
            }
        }

        tracing::info!(
            fetched = summary.fetched,
            max = self.config.max_batch_size,
            attempts = summary.attempts,
            permanent_failures = summary.permanent_failures,
            transient_failures = summary.transient_failures,
            aborted = summary.aborted,
            "Fetch stage finished"
        );

        (media, summary)
    }

    async fn fetch_one(&self, url: &str) -> FetchOutcome {
        if self.abort.is_cancelled() {
            return FetchOutcome::Skipped;
        }
        if self.fetched.load(Ordering::SeqCst) >= self.config.max_batch_size {
            return FetchOutcome::Skipped;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let kind = ContentKind::from_url(url);
        tracing::debug!(url, attempt, kind = kind.as_str(), "Fetching metadata");

        // Retries are only cut short by shutdown; a sibling's 401 lets this task finish
        let result = with_retry(&self.config.retry, &self.shutdown, || {
            self.resolver.resolve(url)
        })
        .await;

        match result {
            Ok(record) => {
                let fetched = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(
                    url,
                    kind = kind.as_str(),
                    items = record.media_details.len(),
                    fetched,
                    "Fetched metadata"
                );
                FetchOutcome::Fetched(url.to_string(), Box::new(record))
            }
            Err(e) => match e.classify() {
                FailureClass::Unauthorized => {
                    tracing::error!(url, error = %e, "Unauthorized, stopping fetch");
                    self.abort.cancel();
                    FetchOutcome::Unauthorized
                }
                FailureClass::Permanent => {
                    tracing::warn!(url, error = %e, "URL permanently rejected by resolver");
                    FetchOutcome::Permanent(FetchErrorEntry {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
                FailureClass::Transient | FailureClass::Cancelled => {
                    tracing::warn!(url, error = %e, "Failed to fetch metadata");
                    FetchOutcome::Transient
                }
            },
        }
    }
}

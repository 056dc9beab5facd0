//! Download stage: turns resolved records into files under the media directory.
//!
//! Records are processed by a bounded pool; the items of one record are transferred in
//! order. An authorization failure cancels the stage token, which stops new records from
//! starting and interrupts transfers in flight. Whatever happened, the media data, history
//! and broken link files are written before the stage returns.

mod layout;
mod transfer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::error::FailureClass;
use crate::retry::with_retry;
use crate::store::{StateStore, save_logged};
use crate::types::{BrokenLinkEntry, DownloadSummary, MediaMap, MediaRecord};
use crate::utils::{all_paths_exist, existing_paths};

use layout::plan;

/// What happened to one record
#[derive(Debug)]
enum RecordOutcome {
    /// Files already on disk, nothing fetched
    Skipped,
    /// The stage was aborted before this record started; `kept` are its listed files still on disk
    NotStarted { url: String, kept: Vec<PathBuf> },
    /// The record was processed; `paths` holds the successful items in item order
    Processed {
        url: String,
        paths: Vec<PathBuf>,
        kept: Vec<PathBuf>,
        broken: Vec<BrokenLinkEntry>,
    },
}

/// Bounded-concurrency media downloader
pub(crate) struct DownloadScheduler<'a> {
    config: &'a DownloadConfig,
    media_dir: &'a Path,
    store: &'a StateStore,
    client: &'a reqwest::Client,
    abort: CancellationToken,
    items_downloaded: AtomicUsize,
}

impl<'a> DownloadScheduler<'a> {
    /// Create a scheduler whose abort token is a child of `shutdown`
    pub(crate) fn new(
        config: &'a DownloadConfig,
        store: &'a StateStore,
        client: &'a reqwest::Client,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            config,
            media_dir: &store.paths().media_dir,
            store,
            client,
            abort: shutdown.child_token(),
            items_downloaded: AtomicUsize::new(0),
        }
    }

    /// Download every record that is not already on disk, then persist state
    pub(crate) async fn run(&self, mut media: MediaMap) -> DownloadSummary {
        let outcomes: Vec<RecordOutcome> = stream::iter(media.iter())
            .map(|(url, record)| self.download_record(url, record))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut summary = DownloadSummary::default();
        let mut broken_links = Vec::new();

        for outcome in outcomes {
            match outcome {
                RecordOutcome::Skipped => summary.skipped += 1,
                RecordOutcome::NotStarted { url, kept } => {
                    if let Some(record) = media.get_mut(&url) {
                        record.local_paths = kept;
                    }
                }
                RecordOutcome::Processed {
                    url,
                    paths,
                    kept,
                    broken,
                } => {
                    broken_links.extend(broken);
                    let Some(record) = media.get_mut(&url) else {
                        continue;
                    };
                    if paths.is_empty() {
                        // Listed files that vanished are no longer downloads
                        record.local_paths = kept;
                    } else {
                        record.local_paths = paths;
                        summary.completed_records += 1;
                    }
                }
            }
        }

        summary.items_downloaded = self.items_downloaded.load(Ordering::Relaxed);
        summary.broken_links = broken_links.len();
        summary.aborted = self.abort.is_cancelled();

        self.persist(&media, &broken_links).await;

        tracing::info!(
            downloaded = summary.items_downloaded,
            records = summary.completed_records,
            skipped = summary.skipped,
            broken = summary.broken_links,
            aborted = summary.aborted,
            "Download stage finished"
        );

        summary
    }

    async fn download_record(&self, url: &str, record: &MediaRecord) -> RecordOutcome {
        if all_paths_exist(&record.local_paths).await {
            tracing::debug!(url, "Skipping already downloaded media");
            return RecordOutcome::Skipped;
        }

        let kept = existing_paths(&record.local_paths).await;
        if kept.len() < record.local_paths.len() {
            tracing::warn!(
                url,
                listed = record.local_paths.len(),
                present = kept.len(),
                "Downloaded files are missing, processing again"
            );
        }

        if self.abort.is_cancelled() {
            return RecordOutcome::NotStarted {
                url: url.to_string(),
                kept,
            };
        }

        let mut broken = Vec::new();
        let mut paths = Vec::new();

        if record.media_details.is_empty() {
            tracing::warn!(url, "No media details found");
            broken.push(BrokenLinkEntry {
                url: url.to_string(),
                reason: "No media details found".to_string(),
            });
            return RecordOutcome::Processed {
                url: url.to_string(),
                paths,
                kept,
                broken,
            };
        }

        let planned = plan(url, record, self.config, self.media_dir);
        if planned.is_empty() {
            tracing::warn!(url, "No valid video/image URLs found");
            broken.push(BrokenLinkEntry {
                url: url.to_string(),
                reason: "No valid media URLs found".to_string(),
            });
            return RecordOutcome::Processed {
                url: url.to_string(),
                paths,
                kept,
                broken,
            };
        }

        let total = planned.len();
        for item in planned {
            if self.abort.is_cancelled() {
                break;
            }

            let result = with_retry(&self.config.retry, &self.abort, || {
                transfer::fetch_to_file(self.client, &item.url, &item.target, &self.abort)
            })
            .await;

            match result {
                Ok(bytes) => {
                    self.items_downloaded.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        url,
                        index = item.index,
                        total,
                        kind = item.kind.subdir(),
                        bytes,
                        path = %item.target.display(),
                        "Downloaded media"
                    );
                    paths.push(item.target);
                }
                Err(e) => match e.classify() {
                    FailureClass::Unauthorized => {
                        tracing::error!(url, error = %e, "Unauthorized, stopping downloads");
                        self.abort.cancel();
                        break;
                    }
                    FailureClass::Cancelled => break,
                    FailureClass::Permanent | FailureClass::Transient => {
                        tracing::error!(url, index = item.index, error = %e, "Failed to download media");
                        broken.push(BrokenLinkEntry {
                            url: url.to_string(),
                            reason: format!("Media {}: {}", item.index, e),
                        });
                    }
                },
            }
        }

        RecordOutcome::Processed {
            url: url.to_string(),
            paths,
            kept,
            broken,
        }
    }

    async fn persist(&self, media: &MediaMap, broken_links: &[BrokenLinkEntry]) {
        let paths = self.store.paths();
        save_logged(&paths.data_file, media, "media data").await;

        let mut history = self.store.load_history().await;
        StateStore::mark_downloaded(&mut history, media);
        save_logged(&paths.history_file, &history, "history").await;

        save_logged(&paths.broken_links_file, broken_links, "broken links").await;
    }
}

/// Output paths the stage would use for `record`
#[cfg(test)]
pub(crate) fn planned_paths(
    url: &str,
    record: &MediaRecord,
    config: &DownloadConfig,
    media_dir: &Path,
) -> Vec<PathBuf> {
    plan(url, record, config, media_dir)
        .into_iter()
        .map(|item| item.target)
        .collect()
}

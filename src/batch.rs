//! Packs downloaded records into numbered `batch_<n>` folders for hand-off.
//!
//! Each batch holds `videos/` and `images/` with the moved media files plus `data/`, where
//! every record's document is written as `<shortcode>.json`. The media data file is updated
//! to point at the new locations, so later runs still recognise the records as downloaded.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::{StateStore, save_json};
use crate::types::MediaMap;
use crate::utils::shortcode;

/// Default number of records per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

const BATCH_PREFIX: &str = "batch_";

/// Counters reported by [`organize_batches`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Batch folders created
    pub batches: usize,
    /// Records placed into a batch
    pub records: usize,
    /// Media files moved
    pub files_moved: usize,
    /// Listed local files that no longer exist
    pub missing_files: usize,
    /// Records left partly or wholly in place because a move or write failed
    pub failed_records: usize,
}

/// Move every downloaded, not yet batched record into batches of `size` records
///
/// Numbering continues after the highest `batch_<n>` folder already present. Records are
/// taken in media-data key order. A record that fails is logged and counted, and the media
/// data file is saved with every path moved so far even when a batch folder can't be created.
pub async fn organize_batches(store: &StateStore, size: usize) -> Result<BatchSummary> {
    if size == 0 {
        return Err(Error::config("must be at least 1", "batch.size"));
    }

    let paths = store.paths();
    let mut media = store.load_media().await;

    let pending: Vec<String> = media
        .iter()
        .filter(|(_, record)| {
            record.is_downloaded()
                && record
                    .local_paths
                    .iter()
                    .all(|path| path.starts_with(&paths.media_dir))
        })
        .map(|(url, _)| url.clone())
        .collect();

    let mut summary = BatchSummary::default();
    if pending.is_empty() {
        tracing::info!("No downloaded records to batch");
        return Ok(summary);
    }

    let first = next_batch_number(&paths.batch_dir).await?;
    tracing::info!(records = pending.len(), size, first_batch = first, "Organizing batches");

    let mut folder_error = None;
    for (offset, chunk) in pending.chunks(size).enumerate() {
        let folder = batch_folder(&paths.batch_dir, first + offset);
        if let Err(e) = tokio::fs::create_dir_all(folder.join("data")).await {
            tracing::error!(batch = %folder.display(), error = %e, "Failed to create batch folder");
            folder_error = Some(e);
            break;
        }

        for url in chunk {
            if let Err(e) = place_record(&mut media, url, &folder, &mut summary).await {
                tracing::error!(url = %url, error = %e, "Failed to batch record");
                summary.failed_records += 1;
            }
        }

        summary.batches += 1;
        tracing::info!(batch = %folder.display(), records = chunk.len(), "Created batch");
    }

    store.save_media(&media).await?;
    if let Some(e) = folder_error {
        return Err(e.into());
    }

    tracing::info!(
        batches = summary.batches,
        records = summary.records,
        moved = summary.files_moved,
        missing = summary.missing_files,
        failed = summary.failed_records,
        "Batching complete"
    );
    Ok(summary)
}

async fn place_record(
    media: &mut MediaMap,
    url: &str,
    folder: &Path,
    summary: &mut BatchSummary,
) -> Result<()> {
    let Some(record) = media.get_mut(url) else {
        return Ok(());
    };

    // Paths are rewritten one by one so a failure leaves earlier moves recorded
    for path in record.local_paths.iter_mut() {
        if !tokio::fs::try_exists(&*path).await.unwrap_or(false) {
            tracing::warn!(path = %path.display(), url, "Media file not found, leaving path as is");
            summary.missing_files += 1;
            continue;
        }

        let Some(name) = path.file_name() else {
            continue;
        };
        let target = folder.join(kind_dir(path)).join(name);
        move_file(path, &target).await?;
        summary.files_moved += 1;
        *path = target;
    }

    let data_path = folder.join("data").join(format!("{}.json", shortcode(url)));
    save_json(&data_path, &*record).await?;
    summary.records += 1;
    Ok(())
}

/// `videos` or `images`, taken from the folder the file currently sits in
fn kind_dir(path: &Path) -> &'static str {
    match path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
        Some("images") => "images",
        _ => "videos",
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

async fn next_batch_number(root: &Path) -> Result<usize> {
    let mut highest = 0;
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(n) = name
            .to_str()
            .and_then(|n| n.strip_prefix(BATCH_PREFIX))
            .and_then(|n| n.parse::<usize>().ok())
        {
            highest = highest.max(n);
        }
    }
    Ok(highest + 1)
}

/// Batch folder path for batch number `n`
pub fn batch_folder(root: &Path, n: usize) -> PathBuf {
    root.join(format!("{}{}", BATCH_PREFIX, n))
}

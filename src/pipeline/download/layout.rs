//! Which items of a record get downloaded, and where they land.

use std::path::{Path, PathBuf};

use crate::config::DownloadConfig;
use crate::types::{MediaItem, MediaKind, MediaRecord};
use crate::utils::{media_filename, post_folder_name};

/// One item scheduled for transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PlannedItem {
    /// 1-based position among the eligible items
    pub index: usize,
    /// Remote location
    pub url: String,
    /// Output file
    pub target: PathBuf,
    /// Item kind, for logging
    pub kind: MediaKind,
}

/// Whether an item is a full-size video or image worth downloading
pub(crate) fn is_eligible(item: &MediaItem, config: &DownloadConfig) -> bool {
    let Some(url) = item.url.as_deref() else {
        return false;
    };
    if !matches!(item.kind, MediaKind::Video | MediaKind::Image) || url.is_empty() {
        return false;
    }
    if url.contains(&config.thumbnail_marker) {
        return false;
    }
    !matches!(item.width, Some(width) if width < config.min_width)
}

/// Eligible items of `record` with their output paths, capped at `max_media_per_post`
///
/// A single item goes into the shared `<media_dir>/images|videos/` folders; several items
/// get a dedicated `<media_dir>/<hash>_<slug>/` folder with its own kind subfolders.
pub(crate) fn plan(
    post_url: &str,
    record: &MediaRecord,
    config: &DownloadConfig,
    media_dir: &Path,
) -> Vec<PlannedItem> {
    let eligible: Vec<&MediaItem> = record
        .media_details
        .iter()
        .filter(|item| is_eligible(item, config))
        .take(config.max_media_per_post)
        .collect();

    let multiple = eligible.len() > 1;
    let base = if multiple {
        media_dir.join(post_folder_name(post_url))
    } else {
        media_dir.to_path_buf()
    };

    eligible
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let url = item.url.clone()?;
            let index = i + 1;
            let mime = item.mime_type.as_deref().unwrap_or_default();
            let target = base
                .join(item.kind.subdir())
                .join(media_filename(post_url, index, mime, multiple));
            Some(PlannedItem {
                index,
                url,
                target,
                kind: item.kind,
            })
        })
        .collect()
}

//! Media data operations.

use std::collections::HashSet;

use crate::error::Result;
use crate::types::{FetchErrorEntry, HistoryMap, MediaMap};

use super::{StateStore, load_json, save_json};

impl StateStore {
    /// Load the media data map (empty if missing or corrupt; bad records are kept, not dropped)
    pub async fn load_media(&self) -> MediaMap {
        load_json(&self.paths.data_file).await
    }

    /// Overwrite the media data file
    pub async fn save_media(&self, media: &MediaMap) -> Result<()> {
        save_json(&self.paths.data_file, media).await
    }

    /// Delete one URL's record from the media data file
    ///
    /// Returns `false` when the URL had no record. History and error files are left alone,
    /// so a removed URL is still skipped by later fetches.
    pub async fn remove_record(&self, url: &str) -> Result<bool> {
        let mut media = self.load_media().await;
        if media.remove(url).is_none() {
            tracing::warn!(url, "URL not found in media data");
            return Ok(false);
        }
        self.save_media(&media).await?;
        tracing::info!(url, "Removed media record");
        Ok(true)
    }

    /// URLs that must not be fetched again: known records, history, permanent errors
    pub fn skip_set(
        media: &MediaMap,
        history: &HistoryMap,
        fetch_errors: &[FetchErrorEntry],
    ) -> HashSet<String> {
        media
            .keys()
            .chain(history.keys())
            .cloned()
            .chain(fetch_errors.iter().map(|e| e.url.clone()))
            .collect()
    }
}

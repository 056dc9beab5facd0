//! History management operations.

use chrono::Utc;

use crate::error::Result;
use crate::types::{HistoryEntry, HistoryMap, HistoryStatus, MediaMap};

use super::{StateStore, load_json, save_json};

impl StateStore {
    /// Load the history map (empty if missing or unreadable)
    pub async fn load_history(&self) -> HistoryMap {
        load_json(&self.paths.history_file).await
    }

    /// Overwrite the history file
    pub async fn save_history(&self, history: &HistoryMap) -> Result<()> {
        save_json(&self.paths.history_file, history).await
    }

    /// Add a `fetched` entry for each URL that has no history yet
    ///
    /// Existing entries are never overwritten. Returns the number of entries added.
    pub fn mark_fetched<'a, I>(history: &mut HistoryMap, urls: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut added = 0;
        for url in urls {
            if !history.contains_key(url) {
                history.insert(url.clone(), HistoryEntry::fetched(url));
                added += 1;
            }
        }
        added
    }

    /// Mark every record with local files as `downloaded`
    ///
    /// Status, timestamp and item count are updated; other fields of an existing entry
    /// (such as the inferred content type) are kept. Returns the number of entries touched.
    pub fn mark_downloaded(history: &mut HistoryMap, media: &MediaMap) -> usize {
        let now = Utc::now();
        let mut touched = 0;
        for (url, record) in media.iter().filter(|(_, r)| r.is_downloaded()) {
            let entry = history
                .entry(url.clone())
                .or_insert_with(|| HistoryEntry::fetched(url));
            entry.status = HistoryStatus::Downloaded;
            entry.timestamp = now;
            entry.item_count = Some(record.local_paths.len());
            touched += 1;
        }
        touched
    }
}

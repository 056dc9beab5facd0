//! Fetch error and broken link files.

use std::collections::HashSet;

use crate::error::Result;
use crate::types::{BrokenLinkEntry, FetchErrorEntry};

use super::{StateStore, load_json, save_json};

impl StateStore {
    /// Load the permanent fetch errors (empty if missing or unreadable)
    pub async fn load_fetch_errors(&self) -> Vec<FetchErrorEntry> {
        load_json(&self.paths.fetch_errors_file).await
    }

    /// Merge `new_errors` into `existing` and write the result
    ///
    /// Returns the number of entries that were actually new.
    pub async fn save_fetch_errors(
        &self,
        existing: &[FetchErrorEntry],
        new_errors: &[FetchErrorEntry],
    ) -> Result<usize> {
        let merged = merge_fetch_errors(existing, new_errors);
        let added = merged.len() - merge_fetch_errors(existing, &[]).len();
        save_json(&self.paths.fetch_errors_file, &merged).await?;
        Ok(added)
    }

    /// Load the broken links written by the previous run
    pub async fn load_broken_links(&self) -> Vec<BrokenLinkEntry> {
        load_json(&self.paths.broken_links_file).await
    }

    /// Replace the broken links file with this run's entries
    pub async fn save_broken_links(&self, links: &[BrokenLinkEntry]) -> Result<()> {
        save_json(&self.paths.broken_links_file, links).await
    }
}

/// Append entries whose URL is not yet present, keeping the first reason seen for a URL
///
/// Duplicate URLs already inside `existing` are collapsed as well, so the output never
/// contains a URL twice.
pub fn merge_fetch_errors(
    existing: &[FetchErrorEntry],
    new_errors: &[FetchErrorEntry],
) -> Vec<FetchErrorEntry> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(new_errors)
        .filter(|entry| seen.insert(entry.url.as_str()))
        .cloned()
        .collect()
}

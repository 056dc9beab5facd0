//! Candidate URL input.

use std::collections::HashSet;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::{Error, Result};
use crate::types::ProcessingOrder;

/// Read candidate URLs from a newline-delimited file
///
/// Lines are trimmed, blank lines dropped and duplicates removed, keeping the first
/// occurrence. With [`ProcessingOrder::Descending`] the resulting sequence is reversed so
/// the most recently appended URLs come first.
///
/// An unreadable file is an error; callers abort the run on it.
pub async fn read_urls(path: &Path, order: ProcessingOrder) -> Result<Vec<String>> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open URL list '{}': {}", path.display(), e),
        ))
    })?;

    let mut lines = BufReader::new(file).lines();
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_string()) {
            urls.push(trimmed.to_string());
        }
    }

    if order == ProcessingOrder::Descending {
        urls.reverse();
    }

    tracing::debug!(path = %path.display(), count = urls.len(), "Loaded candidate URLs");
    Ok(urls)
}

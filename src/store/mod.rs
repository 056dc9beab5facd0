//! JSON-backed state persistence.
//!
//! Four files make up the durable state of a harvest:
//! - media data: [`MediaMap`](crate::types::MediaMap), the resolved documents plus local paths ([`media`])
//! - history: [`HistoryMap`](crate::types::HistoryMap), the audit trail and skip-set ([`history`])
//! - fetch errors: permanently invalid URLs, merged across runs ([`errors`])
//! - broken links: this run's download failures, replaced every run ([`errors`])
//!
//! Reads never fail: a missing file is empty state, an unreadable or corrupt one is logged
//! and treated as empty. A corrupt file is moved aside to `<name>.corrupt` before anything
//! can be written in its place. Writes are atomic (temporary sibling file, then rename).

use crate::config::PathsConfig;
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

mod errors;
mod history;
mod media;

pub use errors::merge_fetch_errors;

/// Typed access to the four state files
#[derive(Clone, Debug)]
pub struct StateStore {
    paths: PathsConfig,
}

impl StateStore {
    /// Create a store over the configured file locations
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Configured file locations
    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }
}

/// Load a JSON document, falling back to `T::default()` when the file is missing or bad
///
/// A file that exists but does not parse is renamed to a `.corrupt` sibling first, so the
/// next save cannot overwrite it.
pub async fn load_json<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            quarantine(path, &e).await;
            return T::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read state file, starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            quarantine(path, &e).await;
            T::default()
        }
    }
}

async fn quarantine(path: &Path, error: &dyn std::fmt::Display) {
    let target = corrupt_path(path).await;
    match tokio::fs::rename(path, &target).await {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            moved_to = %target.display(),
            error = %error,
            "Could not parse state file, starting empty"
        ),
        Err(e) => tracing::error!(
            path = %path.display(),
            error = %error,
            rename_error = %e,
            "Could not parse state file and could not move it aside"
        ),
    }
}

/// First free `<name>.corrupt`, `<name>.corrupt.1`, ... next to `path`
async fn corrupt_path(path: &Path) -> PathBuf {
    let base = sibling(path, ".corrupt");
    let mut candidate = base.clone();
    let mut n = 0u32;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        n += 1;
        candidate = sibling(&base, &format!(".{n}"));
    }
    candidate
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub async fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, body.as_bytes()).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

/// Save and log instead of failing; used on stage exit paths that must not raise
pub(crate) async fn save_logged<T>(path: &Path, value: &T, what: &str)
where
    T: Serialize + ?Sized,
{
    if let Err(e) = save_json(path, value).await {
        tracing::error!(path = %path.display(), error = %e, "Failed to save {}", what);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

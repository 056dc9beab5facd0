//! Configuration types for reel-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Locations of the state files and the media output tree
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Accumulated media records keyed by URL (default: "mediaData.json")
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Processing history keyed by URL (default: "history.json")
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    /// Permanently failing URLs (default: "fetchErrors.json")
    #[serde(default = "default_fetch_errors_file")]
    pub fetch_errors_file: PathBuf,

    /// Download failures from the latest run (default: "brokenLinks.json")
    #[serde(default = "default_broken_links_file")]
    pub broken_links_file: PathBuf,

    /// Root of the downloaded media tree (default: "media")
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Root under which `batch_<n>` folders are created (default: ".")
    #[serde(default = "default_batch_dir")]
    pub batch_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            history_file: default_history_file(),
            fetch_errors_file: default_fetch_errors_file(),
            broken_links_file: default_broken_links_file(),
            media_dir: default_media_dir(),
            batch_dir: default_batch_dir(),
        }
    }
}

impl PathsConfig {
    /// Place every state file and output directory under `root`.
    ///
    /// Handy for tests and for running several independent harvests side by side.
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            data_file: root.join(defaults.data_file),
            history_file: root.join(defaults.history_file),
            fetch_errors_file: root.join(defaults.fetch_errors_file),
            broken_links_file: root.join(defaults.broken_links_file),
            media_dir: root.join(defaults.media_dir),
            batch_dir: root.to_path_buf(),
        }
    }
}

/// Metadata fetch stage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Simultaneous resolver calls (default: 5)
    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,

    /// Successful fetches after which no new fetch starts (default: 1000)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// URLs admitted for scheduling per run (default: 1500)
    #[serde(default = "default_max_total_attempts")]
    pub max_total_attempts: usize,

    /// Retry policy applied to each resolver call
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_fetch_concurrency(),
            max_batch_size: default_max_batch_size(),
            max_total_attempts: default_max_total_attempts(),
            retry: RetryConfig::default(),
        }
    }
}

/// Media download stage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Records downloaded simultaneously; items inside a record are sequential (default: 3)
    #[serde(default = "default_download_concurrency")]
    pub concurrency: usize,

    /// Eligible items kept per record, the rest is dropped (default: 10)
    #[serde(default = "default_max_media_per_post")]
    pub max_media_per_post: usize,

    /// Items declaring a smaller width are treated as thumbnails (default: 500)
    #[serde(default = "default_min_width")]
    pub min_width: u32,

    /// Items whose URL contains this marker are treated as thumbnails (default: "thumbnail")
    #[serde(default = "default_thumbnail_marker")]
    pub thumbnail_marker: String,

    /// Per-request timeout for a single media transfer (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retry policy applied to each item transfer
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_download_concurrency(),
            max_media_per_post: default_max_media_per_post(),
            min_width: default_min_width(),
            thumbnail_marker: default_thumbnail_marker(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Connection settings for the HTTP metadata resolver
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Endpoint queried as `GET <endpoint>?url=<post url>` (default: "http://127.0.0.1:3000/resolve")
    #[serde(default = "default_resolver_endpoint")]
    pub endpoint: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_resolver_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_resolver_endpoint(),
            timeout: default_resolver_timeout(),
        }
    }
}

/// Main configuration for [`Harvester`](crate::Harvester)
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// State files and output directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Metadata fetch stage
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Media download stage
    #[serde(default)]
    pub download: DownloadConfig,

    /// HTTP resolver connection
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Load a configuration from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or disable a stage
    pub fn validate(&self) -> Result<()> {
        if self.fetch.concurrency == 0 {
            return Err(Error::config("must be at least 1", "fetch.concurrency"));
        }
        if self.download.concurrency == 0 {
            return Err(Error::config("must be at least 1", "download.concurrency"));
        }
        if self.fetch.max_batch_size == 0 {
            return Err(Error::config("must be at least 1", "fetch.max_batch_size"));
        }
        if self.fetch.max_total_attempts == 0 {
            return Err(Error::config("must be at least 1", "fetch.max_total_attempts"));
        }
        if self.download.max_media_per_post == 0 {
            return Err(Error::config("must be at least 1", "download.max_media_per_post"));
        }
        // every URL contains the empty string, so nothing would ever be downloaded
        if self.download.thumbnail_marker.is_empty() {
            return Err(Error::config("must not be empty", "download.thumbnail_marker"));
        }
        for (key, retry) in [
            ("fetch.retry.backoff_multiplier", &self.fetch.retry),
            ("download.retry.backoff_multiplier", &self.download.retry),
        ] {
            if !retry.backoff_multiplier.is_finite() {
                return Err(Error::config("must be a finite number", key));
            }
            if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&retry.backoff_multiplier) {
                return Err(Error::config(
                    format!("must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}"),
                    key,
                ));
            }
        }
        Ok(())
    }
}

/// Largest accepted `backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 100.0;

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1000 ms)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60000 ms)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("mediaData.json")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("history.json")
}

fn default_fetch_errors_file() -> PathBuf {
    PathBuf::from("fetchErrors.json")
}

fn default_broken_links_file() -> PathBuf {
    PathBuf::from("brokenLinks.json")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_batch_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_fetch_concurrency() -> usize {
    5
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_max_total_attempts() -> usize {
    1500
}

fn default_download_concurrency() -> usize {
    3
}

fn default_max_media_per_post() -> usize {
    10
}

fn default_min_width() -> u32 {
    500
}

fn default_thumbnail_marker() -> String {
    "thumbnail".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_resolver_endpoint() -> String {
    "http://127.0.0.1:3000/resolve".to_string()
}

fn default_resolver_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for retry delays)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

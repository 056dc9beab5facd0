//! Core types for reel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Media records keyed by source URL
pub type MediaMap = BTreeMap<String, MediaRecord>;

/// History entries keyed by source URL
pub type HistoryMap = BTreeMap<String, HistoryEntry>;

/// One URL's metadata document plus the local files it was downloaded to
///
/// Fields the resolver returns beyond `media_details` are kept verbatim in `extra`, so a
/// record round-trips through the data file without losing anything.
///
/// Loading is tolerant per record: `"media_details": null` reads as no items, items that do
/// not parse are dropped with a warning, and a value that cannot be read as a record at all
/// is carried through unchanged so saving the map never loses it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaRecord {
    /// Media items referenced by the post (empty when the resolver returned none)
    pub media_details: Vec<MediaItem>,

    /// Paths of successfully downloaded items, in original item order
    pub local_paths: Vec<PathBuf>,

    /// Remaining fields of the resolver's document
    pub extra: serde_json::Map<String, serde_json::Value>,

    /// Original value of a record that could not be read; written back as-is
    unreadable: Option<serde_json::Value>,
}

/// On-disk shape of a [`MediaRecord`]
#[derive(Deserialize)]
struct RecordDoc {
    #[serde(default)]
    media_details: Vec<MediaItem>,

    #[serde(
        rename = "localPaths",
        alias = "local_media_path",
        default,
        deserialize_with = "one_or_many_paths"
    )]
    local_paths: Vec<PathBuf>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct RecordDocRef<'a> {
    media_details: &'a [MediaItem],

    #[serde(rename = "localPaths", skip_serializing_if = "no_paths")]
    local_paths: &'a [PathBuf],

    #[serde(flatten)]
    extra: &'a serde_json::Map<String, serde_json::Value>,
}

fn no_paths(paths: &&[PathBuf]) -> bool {
    paths.is_empty()
}

impl From<RecordDoc> for MediaRecord {
    fn from(doc: RecordDoc) -> Self {
        Self {
            media_details: doc.media_details,
            local_paths: doc.local_paths,
            extra: doc.extra,
            unreadable: None,
        }
    }
}

impl Serialize for MediaRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.unreadable {
            Some(raw) => raw.serialize(serializer),
            None => RecordDocRef {
                media_details: &self.media_details,
                local_paths: &self.local_paths,
                extra: &self.extra,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MediaRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(MediaRecord::from_value)
    }
}

impl MediaRecord {
    /// Create a record from a list of media items
    pub fn with_items(items: Vec<MediaItem>) -> Self {
        Self {
            media_details: items,
            ..Default::default()
        }
    }

    /// Whether at least one item has been downloaded
    pub fn is_downloaded(&self) -> bool {
        !self.local_paths.is_empty()
    }

    /// Whether the stored value could not be read as a record and is kept verbatim
    pub fn is_unreadable(&self) -> bool {
        self.unreadable.is_some()
    }

    /// Read one stored record, salvaging what parses
    pub fn from_value(value: serde_json::Value) -> Self {
        let strict_err = match serde_json::from_value::<RecordDoc>(value.clone()) {
            Ok(doc) => return doc.into(),
            Err(e) => e,
        };

        let serde_json::Value::Object(mut fields) = value.clone() else {
            tracing::warn!(error = %strict_err, "Media record is not an object, keeping it unchanged");
            return Self::unreadable(value);
        };

        let items = match fields.remove("media_details") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => {
                let total = items.len();
                let parsed: Vec<MediaItem> = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect();
                if parsed.len() < total {
                    tracing::warn!(
                        dropped = total - parsed.len(),
                        "Skipping media items that do not parse"
                    );
                }
                parsed
            }
            Some(_) => {
                tracing::warn!(error = %strict_err, "Media record has unusable media_details, keeping it unchanged");
                return Self::unreadable(value);
            }
        };

        match serde_json::from_value::<RecordDoc>(serde_json::Value::Object(fields)) {
            Ok(doc) => Self {
                media_details: items,
                ..doc.into()
            },
            Err(e) => {
                tracing::warn!(error = %e, "Media record does not parse, keeping it unchanged");
                Self::unreadable(value)
            }
        }
    }

    fn unreadable(value: serde_json::Value) -> Self {
        Self {
            unreadable: Some(value),
            ..Default::default()
        }
    }
}

/// Kind of a media item as declared by the resolver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video clip
    Video,
    /// Still image
    Image,
    /// Anything else (audio, stories, ...); never downloaded
    #[serde(other)]
    Other,
}

impl MediaKind {
    /// Output subdirectory for this kind
    pub fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Image | MediaKind::Other => "images",
        }
    }
}

/// A single downloadable item embedded in a [`MediaRecord`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Declared kind
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Remote location of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Declared MIME type, used to pick a file extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Declared width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Declared height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Remaining fields of the item
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MediaItem {
    /// Create an item with the fields the downloader looks at
    pub fn new(kind: MediaKind, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            url: Some(url.into()),
            mime_type: Some(mime_type.into()),
            width: None,
            height: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Builder-style width setter
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }
}

/// Processing status recorded in history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    /// Metadata was resolved and stored
    Fetched,
    /// At least one media item is on disk
    Downloaded,
}

/// Content type inferred from the post URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Short-form video post
    Reel,
    /// Regular post (single image, video or carousel)
    Post,
}

impl ContentKind {
    /// Infer the content type from a post URL
    pub fn from_url(url: &str) -> Self {
        if url.contains("/reel/") || (url.contains("/p/") && url.contains("video")) {
            ContentKind::Reel
        } else {
            ContentKind::Post
        }
    }

    /// Lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Reel => "reel",
            ContentKind::Post => "post",
        }
    }
}

/// Audit record for a processed URL
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Latest processing status
    pub status: HistoryStatus,

    /// When the status was last changed
    pub timestamp: DateTime<Utc>,

    /// Content type inferred at fetch time
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContentKind>,

    /// Number of media files downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

impl HistoryEntry {
    /// A fresh `fetched` entry for `url`
    pub fn fetched(url: &str) -> Self {
        Self {
            status: HistoryStatus::Fetched,
            timestamp: Utc::now(),
            kind: Some(ContentKind::from_url(url)),
            item_count: None,
        }
    }
}

/// A URL the resolver permanently refused
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchErrorEntry {
    /// Offending URL
    pub url: String,
    /// Resolver message
    pub reason: String,
}

/// A post or item that failed to download in the current run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLinkEntry {
    /// Post URL
    pub url: String,
    /// What went wrong
    pub reason: String,
}

/// Order in which candidate URLs are processed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessingOrder {
    /// Input file order
    Ascending,
    /// Reverse input file order, i.e. most recently appended first
    #[default]
    Descending,
}

impl ProcessingOrder {
    /// Interpret the optional order argument; only the literal `asc` selects ascending
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("asc") => ProcessingOrder::Ascending,
            _ => ProcessingOrder::Descending,
        }
    }
}

/// Outcome counters for the fetch stage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// URLs admitted after skip filtering and the attempt cap
    pub scheduled: usize,
    /// Resolver calls actually started
    pub attempts: usize,
    /// URLs resolved successfully
    pub fetched: usize,
    /// URLs recorded as permanently invalid
    pub permanent_failures: usize,
    /// URLs that failed for other reasons
    pub transient_failures: usize,
    /// Whether an authorization failure or shutdown stopped the stage
    pub aborted: bool,
}

/// Outcome counters for the download stage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Records skipped because their files already exist
    pub skipped: usize,
    /// Records for which at least one item was downloaded this run
    pub completed_records: usize,
    /// Media files written this run
    pub items_downloaded: usize,
    /// Broken link entries recorded this run
    pub broken_links: usize,
    /// Whether an authorization failure or shutdown stopped the stage
    pub aborted: bool,
}

/// Combined result of one pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Fetch stage counters
    pub fetch: FetchSummary,
    /// Download stage counters, `None` when there was nothing to download
    pub download: Option<DownloadSummary>,
}

/// Accepts `"path"`, `["a", "b"]` or `null`
fn one_or_many_paths<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(path)) => vec![path],
        Some(OneOrMany::Many(paths)) => paths,
        None => Vec::new(),
    })
}

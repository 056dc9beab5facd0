//! Utility functions for filenames and path handling

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters of the sanitized slug kept in a filename
const SLUG_MAX_LEN: usize = 50;

/// Length of the hex hash prefix in generated names
const HASH_PREFIX_LEN: usize = 8;

/// Short, deterministic hex hash of a URL (first 8 hex chars of its MD5 digest)
///
/// ```
/// use reel_dl::utils::url_hash;
///
/// assert_eq!(url_hash("https://example.com"), url_hash("https://example.com"));
/// assert_eq!(url_hash("https://example.com").len(), 8);
/// ```
#[must_use]
pub fn url_hash(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    digest[..HASH_PREFIX_LEN].to_string()
}

/// Filesystem-safe slug derived from a URL
///
/// Strips the scheme, replaces `/ ? & =` with `_`, truncates to 50 characters and then
/// removes anything a filesystem would reject.
///
/// ```
/// use reel_dl::utils::url_slug;
///
/// assert_eq!(
///     url_slug("https://www.instagram.com/reel/DFHpq6aylJh/"),
///     "www.instagram.com_reel_DFHpq6aylJh_"
/// );
/// ```
#[must_use]
pub fn url_slug(url: &str) -> String {
    let without_scheme = SCHEME_RE.replace(url, "");
    let flattened: String = without_scheme
        .chars()
        .map(|c| match c {
            '/' | '?' | '&' | '=' => '_',
            other => other,
        })
        .take(SLUG_MAX_LEN)
        .collect();
    sanitize_filename(&flattened)
}

/// Remove characters and names that are not valid in a filename on common platforms
///
/// Illegal characters (`/ ? < > \ : * | "`) and control characters are dropped, names
/// made of dots only become empty, and Windows reserved device names are emptied.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = ILLEGAL_RE.replace_all(name, "");
    let cleaned = cleaned.trim_end_matches([' ', '.']);
    if DOTS_ONLY_RE.is_match(cleaned) || WINDOWS_RESERVED_RE.is_match(cleaned) {
        return String::new();
    }
    // 255 bytes is the common per-component limit
    let mut end = cleaned.len().min(255);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    cleaned[..end].to_string()
}

/// File extension (with leading dot) for a declared MIME type
///
/// Unknown `image/*` types map to `.jpg`; everything else unknown maps to `.mp4`.
#[must_use]
pub fn extension_from_mime(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => ".mp4",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        other if other.starts_with("image/") => ".jpg",
        _ => ".mp4",
    }
}

/// Deterministic output filename for item `index` (1-based) of the post at `url`
///
/// The zero-padded index suffix is only added when the post has several items.
///
/// ```
/// use reel_dl::utils::media_filename;
///
/// let single = media_filename("https://x.com/p/1/", 1, "image/png", false);
/// let multi = media_filename("https://x.com/p/1/", 2, "image/png", true);
/// assert!(single.ends_with("_x.com_p_1_.png"));
/// assert!(multi.ends_with("_002.png"));
/// ```
#[must_use]
pub fn media_filename(url: &str, index: usize, mime: &str, multiple: bool) -> String {
    let hash = url_hash(url);
    let slug = url_slug(url);
    let ext = extension_from_mime(mime);
    let stem = if slug.is_empty() {
        hash
    } else {
        format!("{}_{}", hash, slug)
    };
    if multiple {
        format!("{}_{:03}{}", stem, index, ext)
    } else {
        format!("{}{}", stem, ext)
    }
}

/// Name of the dedicated folder for a multi-item post
#[must_use]
pub fn post_folder_name(url: &str) -> String {
    let slug = url_slug(url);
    if slug.is_empty() {
        url_hash(url)
    } else {
        format!("{}_{}", url_hash(url), slug)
    }
}

/// Post shortcode: the last non-empty segment of the URL path
///
/// Falls back to the URL hash when the URL has no usable path.
///
/// ```
/// use reel_dl::utils::shortcode;
///
/// assert_eq!(shortcode("https://www.instagram.com/reel/DFHpq6aylJh/"), "DFHpq6aylJh");
/// ```
#[must_use]
pub fn shortcode(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(sanitize_filename)
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| url_hash(url))
}

/// True when `paths` is non-empty and every path exists on disk
pub async fn all_paths_exist(paths: &[PathBuf]) -> bool {
    if paths.is_empty() {
        return false;
    }
    for path in paths {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return false;
        }
    }
    true
}

/// The subset of `paths` still present on disk, in order
pub async fn existing_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut existing = Vec::with_capacity(paths.len());
    for path in paths {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            existing.push(path.clone());
        }
    }
    existing
}

/// Sibling path used while a file is being written
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

// Literal patterns, validated by the tests below
#[allow(clippy::expect_used)]
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("valid regex"));
#[allow(clippy::expect_used)]
static ILLEGAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[/\?<>\\:\*\|"\x00-\x1f\x80-\x9f]"#).expect("valid regex")
});
#[allow(clippy::expect_used)]
static DOTS_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.+$").expect("valid regex"));
#[allow(clippy::expect_used)]
static WINDOWS_RESERVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$").expect("valid regex")
});

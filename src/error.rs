//! Error types for reel-dl
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] - the top-level error returned by fallible operations
//! - [`ResolveError`] - failures reported by a metadata [`Resolver`](crate::resolver::Resolver)
//! - [`TransferError`] - failures while downloading a single media item
//! - [`FailureClass`] - how the schedulers react to a final (post-retry) failure

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Resolver messages that mark a URL as permanently unusable.
const UNSUPPORTED_MARKERS: &[&str] = &["Only posts/reels supported", "unsupported content type"];
const INVALID_LINK_MARKERS: &[&str] = &["check if your link is valid", "invalid link"];

/// Main error type for reel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.concurrency")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metadata resolution failed
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Media transfer failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported while resolving a URL to its metadata document
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver rejected our credentials (HTTP 401)
    #[error("401 Unauthorized: {0}")]
    Unauthorized(String),

    /// The URL points at content the resolver does not handle
    #[error("unsupported content type: {0}")]
    Unsupported(String),

    /// The URL is malformed or no longer resolves to anything
    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// The resolver answered with a non-success status
    #[error("resolver returned HTTP {status}: {body}")]
    Status {
        /// HTTP status returned by the resolver
        status: u16,
        /// Response body, used for classification
        body: String,
    },

    /// Could not reach the resolver
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The resolver answered with a document we could not parse
    #[error("malformed metadata document: {0}")]
    Decode(String),

    /// Any other resolver failure
    #[error("{0}")]
    Other(String),
}

impl ResolveError {
    /// Build an error from free-form resolver text, recognising the messages that
    /// indicate authorization failures or permanently invalid URLs.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_unauthorized_message(&message) {
            ResolveError::Unauthorized(message)
        } else if UNSUPPORTED_MARKERS.iter().any(|m| message.contains(m)) {
            ResolveError::Unsupported(message)
        } else if INVALID_LINK_MARKERS.iter().any(|m| message.contains(m)) {
            ResolveError::InvalidLink(message)
        } else {
            ResolveError::Other(message)
        }
    }

    /// Build an error from a non-success resolver response.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ResolveError::Unauthorized(body);
        }
        match ResolveError::from_message(body.clone()) {
            ResolveError::Other(_) => ResolveError::Status {
                status: status.as_u16(),
                body,
            },
            classified => classified,
        }
    }

    /// How the fetch scheduler should treat this error once retries are exhausted
    pub fn classify(&self) -> FailureClass {
        match self {
            ResolveError::Unauthorized(_) => FailureClass::Unauthorized,
            ResolveError::Unsupported(_) | ResolveError::InvalidLink(_) => FailureClass::Permanent,
            ResolveError::Status { status: 401, .. } => FailureClass::Unauthorized,
            // Text was already classified by from_message / from_status
            ResolveError::Status { .. }
            | ResolveError::Network(_)
            | ResolveError::Decode(_)
            | ResolveError::Other(_) => FailureClass::Transient,
        }
    }
}

/// Errors raised while transferring one media item to disk
#[derive(Debug, Error)]
pub enum TransferError {
    /// The media host rejected the request (HTTP 401)
    #[error("401 Unauthorized for {url}")]
    Unauthorized {
        /// Media URL that was rejected
        url: String,
    },

    /// The media host answered with another non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        /// Media URL
        url: String,
        /// Returned status code
        status: u16,
    },

    /// Writing the output file failed
    #[error("failed to write {path}: {source}")]
    Io {
        /// Output path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Connection or body streaming failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transfer was interrupted by the abort token
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// How the download scheduler should treat this error once retries are exhausted
    pub fn classify(&self) -> FailureClass {
        match self {
            TransferError::Unauthorized { .. } => FailureClass::Unauthorized,
            TransferError::Status { status: 401, .. } => FailureClass::Unauthorized,
            TransferError::Cancelled => FailureClass::Cancelled,
            TransferError::Status { .. } | TransferError::Io { .. } => FailureClass::Permanent,
            TransferError::Network(_) => FailureClass::Transient,
        }
    }
}

/// Reaction to a failure that survived the retry policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Credentials rejected: stop scheduling new work for the rest of the stage
    Unauthorized,
    /// The input itself is bad: record it so later runs skip it
    Permanent,
    /// Anything else: log it and move on
    Transient,
    /// Interrupted by the abort token, not a failure of the item itself
    Cancelled,
}

/// True when a message reports an HTTP 401 or an "unauthorized" condition.
pub fn is_unauthorized_message(message: &str) -> bool {
    message.contains("401") || message.to_lowercase().contains("unauthorized")
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_message_recognises_unauthorized_in_any_case() {
        for msg in ["Request failed with status 401", "UNAUTHORIZED", "unauthorized access"] {
            assert!(
                matches!(ResolveError::from_message(msg), ResolveError::Unauthorized(_)),
                "{msg:?} should be an authorization failure"
            );
        }
    }

    #[test]
    fn from_message_recognises_permanent_input_errors() {
        let unsupported = ResolveError::from_message("Only posts/reels supported, check if your link is valid");
        assert!(matches!(unsupported, ResolveError::Unsupported(_)));
        assert_eq!(unsupported.classify(), FailureClass::Permanent);

        let invalid = ResolveError::from_message("Not found, check if your link is valid");
        assert!(matches!(invalid, ResolveError::InvalidLink(_)));
        assert_eq!(invalid.classify(), FailureClass::Permanent);
    }

    #[test]
    fn unknown_messages_are_transient() {
        let err = ResolveError::from_message("socket hang up");
        assert!(matches!(err, ResolveError::Other(_)));
        assert_eq!(err.classify(), FailureClass::Transient);
    }

    #[test]
    fn from_status_maps_401_regardless_of_body() {
        let err = ResolveError::from_status(StatusCode::UNAUTHORIZED, String::new());
        assert_eq!(err.classify(), FailureClass::Unauthorized);
    }

    #[test]
    fn from_status_classifies_body_text() {
        let err = ResolveError::from_status(
            StatusCode::BAD_REQUEST,
            "Only posts/reels supported".to_string(),
        );
        assert_eq!(err.classify(), FailureClass::Permanent);

        let err = ResolveError::from_status(StatusCode::BAD_GATEWAY, "upstream".to_string());
        match &err {
            ResolveError::Status { status, body } => {
                assert_eq!(*status, 502);
                assert_eq!(body, "upstream");
            }
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(err.classify(), FailureClass::Transient);
    }

    #[test]
    fn transfer_errors_classify_by_status() {
        let unauthorized = TransferError::Status {
            url: "https://cdn.example/a.mp4".into(),
            status: 401,
        };
        assert_eq!(unauthorized.classify(), FailureClass::Unauthorized);

        let missing = TransferError::Status {
            url: "https://cdn.example/a.mp4".into(),
            status: 404,
        };
        assert_eq!(missing.classify(), FailureClass::Permanent);
        assert_eq!(TransferError::Cancelled.classify(), FailureClass::Cancelled);
    }

    #[test]
    fn config_helper_sets_key() {
        match Error::config("must be positive", "fetch.concurrency") {
            Error::Config { message, key } => {
                assert_eq!(message, "must be positive");
                assert_eq!(key.as_deref(), Some("fetch.concurrency"));
            }
            other => panic!("expected Config, got {other:?}"),
        }
    }
}

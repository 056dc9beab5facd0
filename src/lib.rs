//! # reel-dl
//!
//! Resumable media harvester for social post URLs.
//!
//! A run reads a list of post URLs, resolves each new one into a metadata document through a
//! [`Resolver`], then downloads the referenced videos and images to disk. Progress is kept
//! in four JSON files so that a run can be interrupted at any point and restarted without
//! re-fetching metadata or re-downloading files:
//!
//! - media data: resolved documents plus the local paths of downloaded files
//! - history: every URL processed, with status and timestamp
//! - fetch errors: URLs the resolver rejected permanently
//! - broken links: download failures of the latest run
//!
//! ## Quick Start
//!
//! ```no_run
//! use reel_dl::{Config, Harvester, ProcessingOrder};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let harvester = Harvester::new(Config::default())?;
//!
//!     // Stop scheduling on Ctrl+C; both stages still persist their state
//!     tokio::spawn(reel_dl::cancel_on_signal(harvester.shutdown_token()));
//!
//!     let report = harvester
//!         .run(Path::new("reels.txt"), ProcessingOrder::Descending)
//!         .await?;
//!     println!("fetched {} new posts", report.fetch.fetched);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch organizer for downloaded records
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fetch and download stages
pub mod pipeline;
/// Metadata resolver seam
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Candidate URL input
pub mod source;
/// JSON state persistence
pub mod store;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use batch::{BatchSummary, organize_batches};
pub use config::{Config, DownloadConfig, FetchConfig, PathsConfig, ResolverConfig, RetryConfig};
pub use error::{Error, FailureClass, ResolveError, Result, TransferError};
pub use pipeline::Harvester;
pub use resolver::{HttpResolver, Resolver};
pub use store::StateStore;
pub use types::{
    BrokenLinkEntry, ContentKind, DownloadSummary, FetchErrorEntry, FetchSummary, HistoryEntry,
    HistoryStatus, MediaItem, MediaKind, MediaRecord, ProcessingOrder, RunReport,
};

/// Cancel `token` once a termination signal arrives.
///
/// Intended to be spawned next to a [`Harvester`] run with
/// [`Harvester::shutdown_token`]: the stages stop scheduling new work, drain, and persist.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    wait_for_signal().await;
    tracing::info!("Shutdown requested, finishing in-flight work");
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

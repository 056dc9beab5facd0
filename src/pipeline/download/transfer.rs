//! Streaming transfer of one media item to disk.

use std::path::Path;

use futures::StreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;
use crate::utils::partial_path;

/// Download `url` into `target`
///
/// The body is streamed into a `.part` sibling which is renamed over `target` once the
/// body is complete. On any failure, including cancellation through `cancel`, the partial
/// file is removed and `target` is left untouched.
///
/// Returns the number of bytes written.
pub(crate) async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    target: &Path,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let part = partial_path(target);
    let result = tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = stream_into(client, url, target, &part) => result,
    };

    if result.is_err()
        && let Err(e) = tokio::fs::remove_file(&part).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %part.display(), error = %e, "Failed to delete partial file");
    }

    result
}

async fn stream_into(
    client: &reqwest::Client,
    url: &str,
    target: &Path,
    part: &Path,
) -> Result<u64, TransferError> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(TransferError::Unauthorized {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(TransferError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let io_err = |source| TransferError::Io {
        path: part.to_path_buf(),
        source,
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut file = tokio::fs::File::create(part).await.map_err(io_err)?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_err)?;
    drop(file);

    tokio::fs::rename(part, target)
        .await
        .map_err(|source| TransferError::Io {
            path: target.to_path_buf(),
            source,
        })?;

    Ok(written)
}

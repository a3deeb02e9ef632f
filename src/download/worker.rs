//! Download worker - request, streaming and save logic

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::{
    filename_from_content_disposition, sanitize_file_name, DownloadBody, DownloadOutcome,
    DownloadRequest, DownloadSession, DEFAULT_FILE_NAME,
};
use crate::error::{error_from_response, TransferError};
use crate::progress::{transfer_speed, ProgressSnapshot, TransferPhase};
use crate::view::TransferView;

/// Write buffer size for downloads (1 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Fetch the file for `session` and save it, reporting measured progress.
pub(crate) async fn fetch_file<V: TransferView + ?Sized>(
    client: &Client,
    session: &DownloadSession,
    request: &DownloadRequest,
    output_dir: &Path,
    view: &V,
    cancel: &CancellationToken,
) -> Result<DownloadOutcome, TransferError> {
    let body = serde_json::to_vec(&DownloadBody {
        password: &session.password,
    })
    .map_err(|e| TransferError::InvalidInput(format!("Failed to encode request: {}", e)))?;

    log::info!("download_start: {}", session.file_id);
    let start_time = Instant::now();

    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        result = client
            .post(session.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send() => result?,
    };

    if response.status() != StatusCode::OK {
        return Err(error_from_response(response).await);
    }

    let server_name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_content_disposition);
    let destination = resolve_destination(request, server_name.as_deref(), output_dir);

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let part_path = part_path_for(&destination);
    let result = stream_to_file(response, &part_path, start_time, view, cancel).await;

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&part_path).await {
                log::debug!(
                    "Failed to remove partial file {}: {}",
                    part_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }
    };

    tokio::fs::rename(&part_path, &destination).await?;
    log::info!(
        "download_done: {} bytes={} path={}",
        session.file_id,
        bytes,
        destination.display()
    );

    Ok(DownloadOutcome {
        file_id: session.file_id.clone(),
        path: destination,
        bytes,
    })
}

/// Stream the response body into `path` with buffered writes.
async fn stream_to_file<V: TransferView + ?Sized>(
    response: Response,
    path: &Path,
    start_time: Instant,
    view: &V,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let total_bytes = response.content_length().filter(|&len| len > 0);
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut write_buffer = Vec::with_capacity(WRITE_BUFFER_SIZE);
    let mut received: u64 = 0;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            next = stream.next() => match next {
                Some(chunk_result) => chunk_result?,
                None => break,
            },
        };

        received += chunk.len() as u64;
        write_buffer.extend_from_slice(&chunk);

        if write_buffer.len() >= WRITE_BUFFER_SIZE {
            file.write_all(&write_buffer).await?;
            write_buffer.clear();
        }

        // Percent is only meaningful with a known length.
        if let Some(total) = total_bytes {
            let elapsed = start_time.elapsed();
            view.update_progress(
                &ProgressSnapshot::new(
                    TransferPhase::Downloading,
                    received as f64 / total as f64 * 100.0,
                    transfer_speed(received, elapsed),
                )
                .with_bytes(received, Some(total)),
            );
        }
    }

    if !write_buffer.is_empty() {
        file.write_all(&write_buffer).await?;
    }
    file.flush().await?;

    Ok(received)
}

/// Where the file ends up: explicit output, then the server's name, then the
/// caller's name, then `file`.
fn resolve_destination(
    request: &DownloadRequest,
    server_name: Option<&str>,
    output_dir: &Path,
) -> PathBuf {
    let name = server_name
        .map(str::to_string)
        .or_else(|| request.file_name.as_deref().and_then(sanitize_file_name))
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    match &request.output {
        Some(output) if output.is_dir() => output.join(name),
        Some(output) => output.clone(),
        None => output_dir.join(name),
    }
}

fn part_path_for(destination: &Path) -> PathBuf {
    let mut part: OsString = destination.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_prefers_explicit_output_then_server_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = DownloadRequest::new("abc");
        request.file_name = Some("shown.txt".to_string());

        assert_eq!(
            resolve_destination(&request, Some("server.txt"), dir.path()),
            dir.path().join("server.txt")
        );
        assert_eq!(
            resolve_destination(&request, None, dir.path()),
            dir.path().join("shown.txt")
        );

        request.output = Some(dir.path().join("explicit.bin"));
        assert_eq!(
            resolve_destination(&request, Some("server.txt"), dir.path()),
            dir.path().join("explicit.bin")
        );

        request.output = Some(dir.path().to_path_buf());
        assert_eq!(
            resolve_destination(&request, Some("server.txt"), Path::new("/unused")),
            dir.path().join("server.txt")
        );
    }

    #[test]
    fn destination_falls_back_to_default_name() {
        let request = DownloadRequest::new("abc");
        assert_eq!(
            resolve_destination(&request, None, Path::new("out")),
            Path::new("out").join("file")
        );
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path_for(Path::new("/tmp/a.tar.gz")),
            PathBuf::from("/tmp/a.tar.gz.part")
        );
    }
}

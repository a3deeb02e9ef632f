use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{error_from_response, TransferError, ValidationError};
use crate::progress::{transfer_speed, ProgressSnapshot, TransferPhase};
use crate::view::TransferView;

// Read size for streaming the file part: 256KB
const CHUNK_SIZE: usize = 256 * 1024;

const MIN_RETENTION_MINUTES: u64 = 10;
const MAX_RETENTION_MINUTES: u64 = 7 * 24 * 60;

/// A local file picked for upload
#[derive(Debug, Clone, Serialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl SelectedFile {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidInput(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }
}

/// Settings entered before an upload
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Empty means no password
    pub password: String,
    /// Storage duration as typed, e.g. "3" (days), "30m", "1h", "7d"
    pub retention: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetentionUnit {
    Minutes,
    Hours,
    Days,
}

impl RetentionUnit {
    fn suffix(self) -> char {
        match self {
            RetentionUnit::Minutes => 'm',
            RetentionUnit::Hours => 'h',
            RetentionUnit::Days => 'd',
        }
    }

    fn minutes(self) -> u64 {
        match self {
            RetentionUnit::Minutes => 1,
            RetentionUnit::Hours => 60,
            RetentionUnit::Days => 24 * 60,
        }
    }
}

/// How long the server keeps an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Retention {
    pub amount: u64,
    pub unit: RetentionUnit,
}

impl Retention {
    /// Parse a storage duration. A bare number counts as days.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingRetention);
        }
        let invalid = || ValidationError::InvalidRetention(trimmed.to_string());

        let lower = trimmed.to_ascii_lowercase();
        let (digits, unit) = match lower.chars().last() {
            Some('m') => (&lower[..lower.len() - 1], RetentionUnit::Minutes),
            Some('h') => (&lower[..lower.len() - 1], RetentionUnit::Hours),
            Some('d') => (&lower[..lower.len() - 1], RetentionUnit::Days),
            _ => (lower.as_str(), RetentionUnit::Days),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u64 = digits.parse().map_err(|_| invalid())?;

        let retention = Retention { amount, unit };
        let minutes = retention.total_minutes().ok_or_else(invalid)?;
        if !(MIN_RETENTION_MINUTES..=MAX_RETENTION_MINUTES).contains(&minutes) {
            return Err(invalid());
        }
        Ok(retention)
    }

    fn total_minutes(&self) -> Option<u64> {
        self.amount.checked_mul(self.unit.minutes())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.total_minutes().unwrap_or(0) * 60)
    }

    /// Value sent in the `days` form field
    pub fn wire_value(&self) -> String {
        format!("{}{}", self.amount, self.unit.suffix())
    }
}

impl std::fmt::Display for Retention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

/// State of one upload from confirmation to response
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub file: SelectedFile,
    pub password: String,
    pub retention: Retention,
    pub started_at: DateTime<Utc>,
    pub last_reported_percent: f64,
}

impl UploadSession {
    pub fn new(file: SelectedFile, password: String, retention: Retention) -> Self {
        Self {
            file,
            password,
            retention,
            started_at: Utc::now(),
            last_reported_percent: 0.0,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub url: String,
    pub file_name: String,
    pub size: u64,
    pub retention: Retention,
    /// Whether this upload rendered a new QR code
    pub code_rendered: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Size limit advertised by the server
#[derive(Debug, Clone, Deserialize)]
pub struct MaxFileSize {
    #[serde(rename = "maxSizeBytes")]
    pub max_size_bytes: u64,
    #[serde(rename = "maxSizeMB", default)]
    pub max_size_mb: f64,
}

pub async fn fetch_max_file_size(
    client: &Client,
    config: &ClientConfig,
) -> Result<MaxFileSize, TransferError> {
    let response = client
        .get(config.endpoint("/get_max_file_size"))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| TransferError::InvalidResponse(format!("Failed to parse size limit: {}", e)))
}

/// Multipart form with the file part streamed from disk. Every chunk handed
/// to the transport publishes the running byte count on `sent`.
async fn build_form(
    session: &UploadSession,
    sent: watch::Sender<u64>,
) -> Result<Form, TransferError> {
    let file = File::open(&session.file.path).await?;

    let mut sent_bytes = 0u64;
    let stream = ReaderStream::with_capacity(file, CHUNK_SIZE).map(move |chunk_result| {
        let chunk = chunk_result?;
        sent_bytes += chunk.len() as u64;
        let _ = sent.send(sent_bytes);
        Ok::<_, io::Error>(chunk)
    });

    let part = Part::stream_with_length(Body::wrap_stream(stream), session.file.size)
        .file_name(session.file.name.clone())
        .mime_str("application/octet-stream")?;

    Ok(Form::new()
        .part("file", part)
        .text("password", session.password.clone())
        .text("days", session.retention.wire_value()))
}

/// POST the session to `/upload`, reporting progress to `view` until the
/// response arrives. Returns the share link.
pub(crate) async fn send_upload<V: TransferView + ?Sized>(
    client: &Client,
    config: &ClientConfig,
    session: &mut UploadSession,
    view: &V,
    cancel: &CancellationToken,
) -> Result<String, TransferError> {
    let (sent_tx, mut sent_rx) = watch::channel(0u64);
    let form = build_form(session, sent_tx).await?;
    let total_bytes = session.file.size;

    log::info!(
        "upload_start: {} size={} retention={}",
        session.file.name,
        total_bytes,
        session.retention
    );

    let start_time = Instant::now();
    let request = client
        .post(config.endpoint("/upload"))
        .multipart(form)
        .send();
    tokio::pin!(request);

    let report = |session: &mut UploadSession, sent: u64| {
        let elapsed = start_time.elapsed();
        let percent = config.upload_estimate.percent(sent, total_bytes, elapsed);
        session.last_reported_percent = percent;
        view.update_progress(
            &ProgressSnapshot::new(
                TransferPhase::Uploading,
                percent,
                transfer_speed(sent, elapsed),
            )
            .with_bytes(sent, Some(total_bytes)),
        );
    };

    let mut progress_open = true;
    let mut reported = 0u64;
    let response = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            changed = sent_rx.changed(), if progress_open => {
                if changed.is_err() {
                    progress_open = false;
                    continue;
                }
                reported = *sent_rx.borrow_and_update();
                report(session, reported);
            }
            result = &mut request => break result?,
        }
    };

    // The last chunk can land together with the response.
    let sent = *sent_rx.borrow();
    if sent != reported {
        report(session, sent);
    }

    if response.status() != StatusCode::OK {
        return Err(error_from_response(response).await);
    }

    let body = response.bytes().await?;
    let parsed: UploadResponse = serde_json::from_slice(&body).map_err(|e| {
        TransferError::InvalidResponse(format!("Failed to parse upload response: {}", e))
    })?;

    log::info!(
        "upload_done: {} elapsed={:.2}s",
        session.file.name,
        start_time.elapsed().as_secs_f64()
    );
    Ok(parsed.url)
}

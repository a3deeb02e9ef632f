//! Error types shared by the upload and download paths

use serde::Deserialize;
use thiserror::Error;

/// Input problems caught before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a file first")]
    NoFileSelected,
    #[error("Please select storage duration")]
    MissingRetention,
    #[error("Invalid storage duration: {0} (allowed: 10m, 30m, 1h, 1d-7d)")]
    InvalidRetention(String),
    #[error("File is too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-success status from the backend, with its `error` message.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected server response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to create QR code: {0}")]
    CodeRender(String),

    #[error("Another transfer is already in progress")]
    Busy,

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Transfer timed out")]
    TimedOut,
}

impl TransferError {
    pub fn is_validation(&self) -> bool {
        matches!(self, TransferError::Validation(_))
    }
}

/// Body the backend sends with a failure status
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Turn a failed response into `TransferError::Server`, using the `error`
/// field of its JSON body or the status line when there is none.
pub(crate) async fn error_from_response(response: reqwest::Response) -> TransferError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    TransferError::Server {
        status: status.as_u16(),
        message: server_message(status, &text),
    }
}

fn server_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.trim().is_empty() => parsed.error,
        _ => format!("Request failed: {}", status),
    }
}

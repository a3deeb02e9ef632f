//! Download request, session and outcome types

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::TransferError;

/// Fallback name when neither the server nor the caller provides one
pub const DEFAULT_FILE_NAME: &str = "file";

/// What the user asked to download
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// File id, or a full share link `<server>/download/<file_id>`
    pub target: String,
    /// Empty when the file has no password
    pub password: String,
    /// Name to save under when the server sends none
    pub file_name: Option<String>,
    /// Explicit destination file or directory
    pub output: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }
}

/// State of one download from request to saved file
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub file_id: String,
    pub server_url: String,
    pub password: String,
    pub started_at: DateTime<Utc>,
}

impl DownloadSession {
    pub fn endpoint(&self) -> String {
        file_endpoint(&self.server_url, &self.file_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub file_id: String,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadBody<'a> {
    pub password: &'a str,
}

/// `POST` endpoint serving the file payload
pub fn file_endpoint(server_url: &str, file_id: &str) -> String {
    format!(
        "{}/download/{}/file",
        server_url.trim_end_matches('/'),
        urlencoding::encode(file_id)
    )
}

/// Split user input into a file id and, for share links, the server it
/// points at.
pub fn parse_download_target(input: &str) -> Result<(String, Option<String>), TransferError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TransferError::InvalidInput("File id is required".to_string()));
    }

    if !(input.starts_with("http://") || input.starts_with("https://")) {
        return Ok((input.to_string(), None));
    }

    let invalid = || {
        TransferError::InvalidInput(format!(
            "Invalid link {}. Expected <server>/download/<file_id>",
            input
        ))
    };
    let url = Url::parse(input).map_err(|_| invalid())?;
    let file_id = url
        .path()
        .split("/download/")
        .nth(1)
        .map(|rest| rest.trim_end_matches('/'))
        .map(|rest| rest.strip_suffix("/file").unwrap_or(rest))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(invalid)?;
    let file_id = urlencoding::decode(file_id)
        .map_err(|_| invalid())?
        .into_owned();

    Ok((file_id, Some(url.origin().ascii_serialization())))
}

/// File name from a `Content-Disposition` header, preferring the RFC 5987
/// `filename*` form. Directory components are stripped.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = urlencoding::decode(encoded).ok().map(|s| s.into_owned());
            }
            "filename" => plain = Some(value.to_string()),
            _ => {}
        }
    }

    extended.or(plain).and_then(|name| sanitize_file_name(&name))
}

pub(crate) fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}

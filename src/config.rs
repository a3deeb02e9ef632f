use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TransferError;
use crate::progress::{DownloadLeadIn, UploadEstimate};

const USER_AGENT: &str = concat!("filedrop/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the sharing service, e.g. `https://share.example.com`
    pub server_url: String,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
    /// Upper bound for a whole upload or download, none by default
    pub transfer_timeout: Option<Duration>,
    pub upload_estimate: UploadEstimate,
    pub download_lead_in: DownloadLeadIn,
    /// Directory downloads are saved into when no output path is given
    pub output_dir: PathBuf,
    /// Ask the server for its size limit before uploading
    pub check_max_size: bool,
    /// Render a fresh QR code for every successful upload instead of only the first
    pub rerender_code: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(30),
            transfer_timeout: None,
            upload_estimate: UploadEstimate::default(),
            download_lead_in: DownloadLeadIn::default(),
            output_dir: PathBuf::from("."),
            check_max_size: false,
            rerender_code: false,
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Absolute URL for an API path such as `/upload`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn build_client(&self) -> Result<Client, TransferError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(TransferError::InvalidInput(format!(
                "Server URL must start with http:// or https://: {}",
                self.server_url
            )));
        }
        if self.accept_invalid_certs {
            log::warn!("TLS certificate verification is disabled");
        }
        Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(TransferError::Network)
    }
}

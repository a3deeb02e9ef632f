#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use filedrop_lib::progress::{DownloadLeadIn, ProgressSnapshot, TransferPhase};
use filedrop_lib::qr::ScannableCode;
use filedrop_lib::view::TransferView;
use filedrop_lib::ClientConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Alert(String),
    Settings,
    UploadShown(String),
    UploadClosed,
    DownloadShown(String),
    DownloadClosed,
    Progress {
        phase: TransferPhase,
        percent: f64,
        transferred: u64,
    },
    Result(String),
    Code(String),
    Error(String),
    Saved(PathBuf),
}

/// View that records every call for later assertions
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn codes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Code(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn results(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Result(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// (phase, percent) of every progress update, in order
    pub fn progress(&self) -> Vec<(TransferPhase, f64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Progress { phase, percent, .. } => Some((phase, percent)),
                _ => None,
            })
            .collect()
    }
}

impl TransferView for RecordingView {
    fn alert(&self, message: &str) {
        self.push(ViewEvent::Alert(message.to_string()));
    }

    fn show_settings(&self) {
        self.push(ViewEvent::Settings);
    }

    fn show_upload_progress(&self, file_name: &str) {
        self.push(ViewEvent::UploadShown(file_name.to_string()));
    }

    fn close_upload_progress(&self) {
        self.push(ViewEvent::UploadClosed);
    }

    fn show_download_progress(&self, file_id: &str) {
        self.push(ViewEvent::DownloadShown(file_id.to_string()));
    }

    fn close_download_progress(&self) {
        self.push(ViewEvent::DownloadClosed);
    }

    fn update_progress(&self, snapshot: &ProgressSnapshot) {
        self.push(ViewEvent::Progress {
            phase: snapshot.phase,
            percent: snapshot.percent,
            transferred: snapshot.transferred_bytes,
        });
    }

    fn show_result(&self, url: &str) {
        self.push(ViewEvent::Result(url.to_string()));
    }

    fn render_code(&self, code: &ScannableCode) {
        self.push(ViewEvent::Code(code.text.clone()));
    }

    fn show_error(&self, message: &str) {
        self.push(ViewEvent::Error(message.to_string()));
    }

    fn file_saved(&self, path: &Path) {
        self.push(ViewEvent::Saved(path.to_path_buf()));
    }
}

/// Config pointed at a mock server, with a short download lead-in.
pub fn test_config(server_url: &str, output_dir: &Path) -> ClientConfig {
    let mut config = ClientConfig::new(server_url);
    config.output_dir = output_dir.to_path_buf();
    config.download_lead_in = DownloadLeadIn::Simulated {
        duration: Duration::from_millis(200),
        tick: Duration::from_millis(20),
    };
    config
}

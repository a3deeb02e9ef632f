//! Presentation surface driven by the transfer controller
//!
//! `TransferView` is the show/hide/set-text contract the controller has with
//! whatever renders it. `ConsoleView` renders to the terminal.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::progress::ProgressSnapshot;
use crate::qr::ScannableCode;

pub trait TransferView: Send + Sync {
    /// Blocking validation message
    fn alert(&self, message: &str);
    fn show_settings(&self);
    fn show_upload_progress(&self, file_name: &str);
    fn close_upload_progress(&self);
    fn show_download_progress(&self, file_id: &str);
    fn close_download_progress(&self);
    fn update_progress(&self, snapshot: &ProgressSnapshot);
    /// Share link of a finished upload
    fn show_result(&self, url: &str);
    fn render_code(&self, code: &ScannableCode);
    fn show_error(&self, message: &str);
    fn file_saved(&self, _path: &Path) {}
}

/// Terminal view: progress on stderr, results on stdout.
pub struct ConsoleView {
    progress_enabled: bool,
    code_svg: Option<PathBuf>,
    label: Mutex<String>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self {
            progress_enabled: std::io::stderr().is_terminal(),
            code_svg: None,
            label: Mutex::new(String::new()),
        }
    }

    /// Also write every rendered code as SVG to `path`.
    pub fn with_code_svg(mut self, path: Option<PathBuf>) -> Self {
        self.code_svg = path;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    fn set_label(&self, label: &str) {
        if let Ok(mut current) = self.label.lock() {
            *current = label.to_string();
        }
    }

    fn finish_line(&self) {
        if self.progress_enabled {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr);
        }
    }
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferView for ConsoleView {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn show_settings(&self) {
        log::debug!("settings confirmed");
    }

    fn show_upload_progress(&self, file_name: &str) {
        self.set_label(&format!("Uploading {}", file_name));
    }

    fn close_upload_progress(&self) {
        self.finish_line();
    }

    fn show_download_progress(&self, file_id: &str) {
        self.set_label(&format!("Downloading {}", file_id));
    }

    fn close_download_progress(&self) {
        self.finish_line();
    }

    fn update_progress(&self, snapshot: &ProgressSnapshot) {
        if !self.progress_enabled {
            return;
        }
        let label = self.label.lock().map(|l| l.clone()).unwrap_or_default();
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "\r\x1b[2K{} {:>4} {}",
            label,
            snapshot.percent_text(),
            snapshot.speed_text()
        );
        let _ = stderr.flush();
    }

    fn show_result(&self, url: &str) {
        println!("Download link: {}", url);
    }

    fn render_code(&self, code: &ScannableCode) {
        println!("{}", code.terminal);
        if let Some(path) = &self.code_svg {
            match std::fs::write(path, &code.svg) {
                Ok(()) => log::info!("qr code written to {}", path.display()),
                Err(e) => log::warn!("Failed to write QR code to {}: {}", path.display(), e),
            }
        }
    }

    fn show_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }

    fn file_saved(&self, path: &Path) {
        println!("Saved {}", path.display());
    }
}

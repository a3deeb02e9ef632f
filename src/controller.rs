use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::download::{self, DownloadOutcome, DownloadRequest, DownloadSession};
use crate::error::{TransferError, ValidationError};
use crate::qr;
use crate::upload::{self, Retention, SelectedFile, UploadOptions, UploadOutcome, UploadSession};
use crate::view::TransferView;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferState {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "settings")]
    SettingsOrConfirm,
    #[serde(rename = "in_flight")]
    InFlight,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferState::Idle => write!(f, "idle"),
            TransferState::SettingsOrConfirm => write!(f, "settings"),
            TransferState::InFlight => write!(f, "in_flight"),
            TransferState::Success => write!(f, "success"),
            TransferState::Failed => write!(f, "failed"),
            TransferState::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl TransferState {
    fn terminal_for<T>(result: &Result<T, TransferError>) -> Self {
        match result {
            Ok(_) => TransferState::Success,
            Err(TransferError::Cancelled) => TransferState::Cancelled,
            Err(_) => TransferState::Failed,
        }
    }
}

/// Drives uploads and downloads against one server and reports to a view.
///
/// At most one transfer runs at a time; the QR code for share links is
/// rendered once per controller unless `rerender_code` is set.
pub struct TransferProgressController<V: TransferView> {
    config: ClientConfig,
    client: Client,
    view: V,
    state: Mutex<TransferState>,
    code_rendered: AtomicBool,
}

/// Holds the controller in `InFlight`; returns it to `Idle` when dropped.
struct TransferGuard<'a, V: TransferView> {
    controller: &'a TransferProgressController<V>,
}

impl<V: TransferView> TransferGuard<'_, V> {
    fn finish(self, terminal: TransferState) {
        self.controller.set_state(terminal);
    }
}

impl<V: TransferView> Drop for TransferGuard<'_, V> {
    fn drop(&mut self) {
        self.controller.set_state(TransferState::Idle);
    }
}

impl<V: TransferView> TransferProgressController<V> {
    pub fn new(config: ClientConfig, view: V) -> Result<Self, TransferError> {
        let client = config.build_client()?;
        Ok(Self::with_client(config, client, view))
    }

    pub fn with_client(config: ClientConfig, client: Client, view: V) -> Self {
        Self {
            config,
            client,
            view,
            state: Mutex::new(TransferState::Idle),
            code_rendered: AtomicBool::new(false),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn code_rendered(&self) -> bool {
        self.code_rendered.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: TransferState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            log::info!("transfer_state: {} -> {}", *state, next);
            *state = next;
        }
    }

    fn begin_transfer(&self) -> Result<TransferGuard<'_, V>, TransferError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == TransferState::InFlight {
            return Err(TransferError::Busy);
        }
        log::info!("transfer_state: {} -> {}", *state, TransferState::InFlight);
        *state = TransferState::InFlight;
        Ok(TransferGuard { controller: self })
    }

    fn reject(&self, error: ValidationError) -> TransferError {
        log::warn!("validation failed: {}", error);
        self.view.alert(&error.to_string());
        error.into()
    }

    /// Open the upload settings for the current selection.
    pub fn request_settings(&self, selection: Option<&SelectedFile>) -> Result<(), TransferError> {
        if selection.is_none() {
            return Err(self.reject(ValidationError::NoFileSelected));
        }
        if self.state() == TransferState::InFlight {
            return Err(TransferError::Busy);
        }
        self.set_state(TransferState::SettingsOrConfirm);
        self.view.show_settings();
        Ok(())
    }

    /// Upload `file` with the given settings and show the share link.
    pub async fn submit_upload(
        &self,
        file: Option<SelectedFile>,
        options: UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, TransferError> {
        let Some(file) = file else {
            return Err(self.reject(ValidationError::NoFileSelected));
        };
        let retention = Retention::parse(&options.retention).map_err(|e| self.reject(e))?;

        let guard = self.begin_transfer()?;

        if self.config.check_max_size {
            match upload::fetch_max_file_size(&self.client, &self.config).await {
                Ok(limit) if file.size > limit.max_size_bytes => {
                    guard.finish(TransferState::Failed);
                    return Err(self.reject(ValidationError::FileTooLarge {
                        size: file.size,
                        limit: limit.max_size_bytes,
                    }));
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to get max file size: {}", e),
            }
        }

        let mut session = UploadSession::new(file, options.password, retention);
        self.view.show_upload_progress(&session.file.name);

        let result = with_deadline(
            self.config.transfer_timeout,
            upload::send_upload(&self.client, &self.config, &mut session, &self.view, cancel),
        )
        .await;

        self.view.close_upload_progress();
        guard.finish(TransferState::terminal_for(&result));

        match result {
            Ok(url) => {
                self.view.show_result(&url);
                let code_rendered = self.render_code_once(&url);
                Ok(UploadOutcome {
                    url,
                    file_name: session.file.name,
                    size: session.file.size,
                    retention: session.retention,
                    code_rendered,
                })
            }
            Err(e) => {
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    fn render_code_once(&self, url: &str) -> bool {
        if !self.config.rerender_code && self.code_rendered() {
            log::debug!("qr code already rendered, keeping it");
            return false;
        }
        match qr::render_code(url) {
            Ok(code) => {
                self.view.render_code(&code);
                self.code_rendered.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Run the lead-in, then fetch and save the requested file.
    pub async fn initiate_download(
        &self,
        request: DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, TransferError> {
        let (file_id, server_override) = match download::parse_download_target(&request.target) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.view.alert(&e.to_string());
                return Err(e);
            }
        };

        let guard = self.begin_transfer()?;

        let session = DownloadSession {
            file_id,
            server_url: server_override.unwrap_or_else(|| self.config.server_url.clone()),
            password: request.password.clone(),
            started_at: chrono::Utc::now(),
        };
        self.view.show_download_progress(&session.file_id);

        let result = with_deadline(self.config.transfer_timeout, async {
            self.config
                .download_lead_in
                .run(cancel, |snapshot| self.view.update_progress(snapshot))
                .await?;
            download::fetch_file(
                &self.client,
                &session,
                &request,
                &self.config.output_dir,
                &self.view,
                cancel,
            )
            .await
        })
        .await;

        guard.finish(TransferState::terminal_for(&result));

        match result {
            Ok(outcome) => {
                self.view.file_saved(&outcome.path);
                self.view.close_download_progress();
                Ok(outcome)
            }
            Err(e) => {
                self.report_failure(&e);
                self.view.close_download_progress();
                Err(e)
            }
        }
    }

    fn report_failure(&self, error: &TransferError) {
        match error {
            TransferError::Cancelled => log::info!("transfer cancelled"),
            _ => {
                log::warn!("transfer failed: {}", error);
                self.view.show_error(&error.to_string());
            }
        }
    }
}

async fn with_deadline<T, F>(limit: Option<Duration>, transfer: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, transfer)
            .await
            .map_err(|_| TransferError::TimedOut)?,
        None => transfer.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSnapshot;
    use crate::qr::ScannableCode;
    use std::path::PathBuf;

    #[derive(Default)]
    struct AlertLog {
        alerts: Mutex<Vec<String>>,
        settings_shown: AtomicBool,
    }

    impl TransferView for AlertLog {
        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }
        fn show_settings(&self) {
            self.settings_shown.store(true, Ordering::SeqCst);
        }
        fn show_upload_progress(&self, _file_name: &str) {}
        fn close_upload_progress(&self) {}
        fn show_download_progress(&self, _file_id: &str) {}
        fn close_download_progress(&self) {}
        fn update_progress(&self, _snapshot: &ProgressSnapshot) {}
        fn show_result(&self, _url: &str) {}
        fn render_code(&self, _code: &ScannableCode) {}
        fn show_error(&self, _message: &str) {}
    }

    fn controller() -> TransferProgressController<AlertLog> {
        TransferProgressController::new(ClientConfig::default(), AlertLog::default()).unwrap()
    }

    fn selected() -> SelectedFile {
        SelectedFile {
            path: PathBuf::from("a.txt"),
            name: "a.txt".to_string(),
            size: 1,
        }
    }

    #[test]
    fn request_settings_without_file_alerts() {
        let controller = controller();
        let err = controller.request_settings(None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            *controller.view().alerts.lock().unwrap(),
            vec!["Please select a file first".to_string()]
        );
        assert!(!controller.view().settings_shown.load(Ordering::SeqCst));
        assert_eq!(controller.state(), TransferState::Idle);
    }

    #[test]
    fn request_settings_reveals_panel() {
        let controller = controller();
        controller.request_settings(Some(&selected())).unwrap();
        assert!(controller.view().settings_shown.load(Ordering::SeqCst));
        assert_eq!(controller.state(), TransferState::SettingsOrConfirm);
    }

    #[test]
    fn only_one_transfer_at_a_time() {
        let controller = controller();
        let guard = controller.begin_transfer().unwrap();
        assert_eq!(controller.state(), TransferState::InFlight);
        assert!(matches!(controller.begin_transfer(), Err(TransferError::Busy)));
        assert!(matches!(
            controller.request_settings(Some(&selected())),
            Err(TransferError::Busy)
        ));

        guard.finish(TransferState::Success);
        assert_eq!(controller.state(), TransferState::Idle);
        assert!(controller.begin_transfer().is_ok());
    }

    #[tokio::test]
    async fn busy_controller_rejects_download_without_request() {
        let controller = controller();
        let _guard = controller.begin_transfer().unwrap();
        let cancel = CancellationToken::new();
        let result = controller
            .initiate_download(DownloadRequest::new("abc"), &cancel)
            .await;
        assert!(matches!(result, Err(TransferError::Busy)));
    }

    #[tokio::test]
    async fn deadline_maps_elapsed_to_timed_out() {
        let result: Result<(), TransferError> =
            with_deadline(Some(Duration::from_millis(10)), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TransferError::TimedOut)));
    }

    #[test]
    fn state_display_matches_expected_strings() {
        assert_eq!(TransferState::Idle.to_string(), "idle");
        assert_eq!(TransferState::SettingsOrConfirm.to_string(), "settings");
        assert_eq!(TransferState::InFlight.to_string(), "in_flight");
        assert_eq!(TransferState::Success.to_string(), "success");
        assert_eq!(TransferState::Failed.to_string(), "failed");
        assert_eq!(TransferState::Cancelled.to_string(), "cancelled");
    }
}

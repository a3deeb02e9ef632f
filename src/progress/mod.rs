//! Progress model for transfers
//!
//! Provides the numbers shown while a transfer is running:
//! - `ProgressSnapshot` with percent and speed, plus display formatting
//! - Blended upload estimate (byte progress plus an assumed processing phase)
//! - Fixed-duration simulated lead-in shown before a download starts

mod estimator;
mod lead_in;
mod types;

pub use estimator::{blended_percent, transfer_speed, UploadEstimate};
pub use lead_in::{simulated_snapshot, DownloadLeadIn};
pub use types::{format_speed, ProgressSnapshot, TransferPhase};

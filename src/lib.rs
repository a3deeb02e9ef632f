//! Client for a file-sharing service with expiring, optionally
//! password-protected links.
//!
//! `TransferProgressController` runs uploads and downloads and reports
//! progress to a `TransferView`; `run` is the command-line entry point.

pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod progress;
pub mod qr;
pub mod upload;
pub mod view;

mod cli;

pub use cli::run;
pub use config::ClientConfig;
pub use controller::{TransferProgressController, TransferState};
pub use error::{TransferError, ValidationError};

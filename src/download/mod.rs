//! File download module with a lead-in phase and streamed save
//!
//! Provides download functionality for shared files with:
//! - Share-link parsing (`<server>/download/<file_id>`)
//! - Streaming the response to a `.part` file, renamed when complete
//! - Progress tracking with measured bytes and speed
//! - Target name resolution from `Content-Disposition`

mod types;
mod worker;

pub use types::{
    file_endpoint, filename_from_content_disposition, parse_download_target, DownloadOutcome,
    DownloadRequest, DownloadSession,
};
pub(crate) use worker::fetch_file;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;
use crate::controller::TransferProgressController;
use crate::download::DownloadRequest;
use crate::progress::DownloadLeadIn;
use crate::upload::{SelectedFile, UploadOptions};
use crate::view::ConsoleView;

#[derive(Debug, Parser)]
#[command(
    name = "filedrop",
    version,
    about = "Upload and download files on a filedrop server",
    after_help = "Examples:\n  filedrop -s https://share.example.com upload ./report.pdf -p secret -t 1d\n  filedrop download https://share.example.com/download/d2976312 -p secret -o ./report.pdf"
)]
struct Cli {
    /// Server URL, e.g. https://share.example.com (not needed for full download links)
    #[arg(short, long, env = "FILEDROP_SERVER", global = true)]
    server: Option<String>,

    /// Disable TLS certificate verification
    #[arg(short, long, global = true)]
    insecure: bool,

    /// Abort a transfer that takes longer than this many seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30, global = true)]
    connect_timeout: u64,

    /// Disable the progress line
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file and print its download link
    Upload {
        file: PathBuf,

        /// Password required to download the file
        #[arg(short, long, default_value = "")]
        password: String,

        /// Storage duration: 10m, 30m, 1h, 1d-7d, or a number of days
        #[arg(short = 't', long = "time", default_value = "7d")]
        retention: String,

        /// Check the server's size limit before uploading
        #[arg(long)]
        check_size: bool,

        /// Also write the link's QR code as SVG
        #[arg(long, value_name = "PATH")]
        qr_svg: Option<PathBuf>,

        /// Show plain byte progress instead of the upload-plus-processing estimate
        #[arg(long)]
        raw_progress: bool,
    },
    /// Download a file by id or share link
    Download {
        /// File id or link of the form <server>/download/<file_id>
        target: String,

        /// File password
        #[arg(short, long, default_value = "")]
        password: String,

        /// Output file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name to save under when the server does not send one
        #[arg(long)]
        name: Option<String>,

        /// Start the request immediately, without the preparation countdown
        #[arg(long)]
        no_lead_in: bool,
    },
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let server_url = match (&self.server, &self.command) {
            (Some(server), _) => server.clone(),
            // A full link carries its own server.
            (None, Command::Download { target, .. }) if target.contains("://") => {
                ClientConfig::default().server_url
            }
            (None, _) => anyhow::bail!("--server is required (or set FILEDROP_SERVER)"),
        };

        let mut config = ClientConfig::new(server_url);
        config.accept_invalid_certs = self.insecure;
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.transfer_timeout = self.timeout.map(Duration::from_secs);

        match &self.command {
            Command::Upload {
                check_size,
                raw_progress,
                ..
            } => {
                config.check_max_size = *check_size;
                if *raw_progress {
                    config.upload_estimate = crate::progress::UploadEstimate::Raw;
                }
            }
            Command::Download { no_lead_in, .. } => {
                if *no_lead_in {
                    config.download_lead_in = DownloadLeadIn::Skip;
                }
            }
        }
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, cancelling transfer");
            token.cancel();
        }
    });
}

pub async fn run() -> anyhow::Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.client_config()?;

    let qr_svg = match &cli.command {
        Command::Upload { qr_svg, .. } => qr_svg.clone(),
        Command::Download { .. } => None,
    };
    let mut view = ConsoleView::new().with_code_svg(qr_svg);
    if cli.no_progress {
        view = view.with_progress(false);
    }
    let controller = TransferProgressController::new(config, view)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let succeeded = match cli.command {
        Command::Upload {
            file,
            password,
            retention,
            ..
        } => {
            let selected = SelectedFile::from_path(&file)
                .await
                .with_context(|| format!("File not found: {}", file.display()))?;
            if controller.request_settings(Some(&selected)).is_err() {
                return Ok(ExitCode::FAILURE);
            }
            let has_password = !password.is_empty();
            let options = UploadOptions {
                password,
                retention,
            };
            match controller.submit_upload(Some(selected), options, &cancel).await {
                Ok(outcome) => {
                    if has_password {
                        println!("Password protected: yes");
                    }
                    println!("Storage duration: {}", outcome.retention);
                    true
                }
                Err(_) => false,
            }
        }
        Command::Download {
            target,
            password,
            output,
            name,
            ..
        } => {
            let request = DownloadRequest {
                target,
                password,
                file_name: name,
                output,
            };
            controller.initiate_download(request, &cancel).await.is_ok()
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

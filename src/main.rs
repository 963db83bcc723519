//! photo-transfer: one-shot Dropbox to Google Drive photo copy.
//!
//! Loads the YAML configuration, wires the desktop bridges into the
//! Dropbox and Google Drive connectors, runs a single transfer, printing progress
//! as it goes and a summary at the end. Exits non-zero when the run fails.

mod cli;
mod progress;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
use bridge_traits::http::HttpClient;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::logging::LogLevel;
use clap::Parser;
use core_runtime::config::TransferConfig;
use core_runtime::events::{EventBus, EventSeverity, EventStream, DEFAULT_EVENT_BUFFER_SIZE};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_transfer::{TransferOrchestrator, TransferReport};
use provider_dropbox::DropboxConnector;
use provider_google_drive::GoogleDriveConnector;

use cli::Cli;
use progress::report_progress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let mut logging = LoggingConfig::default()
        .with_format(cli.log_format.into())
        .with_level(level);
    if let Some(path) = &cli.log_file {
        logging = logging.with_log_file(path);
    }
    let _guard = match init_logging(logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Transfer failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<TransferReport> {
    let config = TransferConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let http_client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().context("creating HTTP client")?);
    let file_system: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());

    let source = DropboxConnector::new(
        Arc::clone(&http_client),
        Arc::clone(&file_system),
        config.source_credentials.access_token.clone(),
    );
    let destination = GoogleDriveConnector::new(
        Arc::clone(&http_client),
        Arc::clone(&file_system),
        config.destination_credentials.access_token.clone(),
    )
    .with_space(config.destination_space.clone())
    .with_folder_id(config.destination_folder_id.clone());

    let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
    let progress = EventStream::new(event_bus.subscribe())
        .filter(|event| event.severity() >= EventSeverity::Info);
    let reporter = tokio::spawn(report_progress(progress, |line| println!("{}", line)));

    let orchestrator = TransferOrchestrator::new(
        config,
        Arc::new(source),
        Arc::new(destination),
        file_system,
        event_bus,
    );

    let result = orchestrator.run().await;
    // Closes the bus so the reporter drains and exits.
    drop(orchestrator);
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Progress reporter stopped unexpectedly");
    }

    result.context("transfer run failed")
}

fn print_summary(report: &TransferReport) {
    println!("Run {} finished ({})", report.run_id, report.phase);
    println!("  copied:                   {}", report.copied);
    println!("  skipped (already known):  {}", report.skipped_known);
    println!("  skipped (no fingerprint): {}", report.skipped_unfingerprinted);
    println!("  duration:                 {:.1}s", report.duration.as_secs_f64());
    if !report.destination_index_complete {
        println!("  note: destination index is incomplete; it will resume on the next run");
    }
}

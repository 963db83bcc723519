use clap::{Parser, ValueEnum};
use core_runtime::logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "photo-transfer",
    version,
    about = "Copy photos from Dropbox to Google Drive, skipping ones already there"
)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Console log format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Also write plain-text logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

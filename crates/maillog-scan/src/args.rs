use std::path::PathBuf;

use clap::Parser;

use crate::config::{Mta, OutputFormat};

/// Command-line flags. Every value flag overrides the matching config key.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "maillog-scan", version)]
#[command(about = "Extract rejected recipient addresses from postfix or exim logs")]
pub struct ScanArgs {
    /// YAML config file (default: MAILLOG_CONFIG_PATH, then maillog.yaml in HOME or cwd)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mail log to scan
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub mta: Option<Mta>,

    /// Client-origin stage: smtpd, pickup, cleanup, opendkim or qmgr
    #[arg(long)]
    pub daemon: Option<String>,

    /// Regex fragment for the originating host field
    #[arg(long)]
    pub server: Option<String>,

    /// Regex fragment for the originating client
    #[arg(long)]
    pub search: Option<String>,

    /// Delivery status to report
    #[arg(long, value_name = "STATUS")]
    pub status: Option<String>,

    #[arg(long)]
    pub offset: Option<usize>,

    /// Maximum matching lines to take, 0 for no limit
    #[arg(long)]
    pub limit: Option<usize>,

    /// all or target-only
    #[arg(long)]
    pub record_policy: Option<String>,

    #[arg(long)]
    pub workers: Option<usize>,

    /// Overall deadline, e.g. 90 or 1m30s
    #[arg(long)]
    pub timeout: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Print each rejected address once
    #[arg(long)]
    pub distinct: bool,

    /// Print the matched queue ids instead of addresses
    #[arg(long)]
    pub ids_only: bool
}

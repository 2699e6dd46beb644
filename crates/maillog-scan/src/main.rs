mod args;
mod config;
mod core;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use maillog_helpers::{logging, shutdown};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::ScanArgs;
use crate::config::ScanConfig;
use crate::core::{ScanReport, render_report, run_scan};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    logging::init_logging(
        "maillog_scan=info,maillog_core=info,tokio=warn",
        "MAILLOG_LOG",
        "maillog-scan"
    );

    let config = ScanConfig::load(ScanArgs::parse())?;

    info!(
        "maillog-scan starting: mta={:?}, log={}, daemon={}, search={}, status={}, workers={}",
        config.mta,
        config.log_path().display(),
        config.daemon,
        config.search,
        config.target_status,
        config.workers
    );

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(shutdown::listen_shutdown(shutdown.clone()));

    let report = run_scan(&config, shutdown.clone()).await;
    shutdown.cancel();
    signals.await.context("signal listener join failed")?;
    let report = report?;

    if let ScanReport::Postfix(result) = &report {
        if result.partial {
            warn!(
                "report is partial: ids={}, records={}",
                result.ids.len(),
                result.records.len()
            );
        }
    }

    let rendered = render_report(&report, &config)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .and_then(|_| stdout.flush())
        .context("failed to write report")?;

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use maillog_core::{
    Correlation, EximReport, IdFilter, LineSource, correlate_concurrent,
    exim_prefilter, scan_exim,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::file_source::FileSource;
use crate::config::{Mta, ScanConfig};

#[derive(Debug)]
pub enum ScanReport {
    Postfix(Correlation),
    Exim(EximReport)
}

/// Loads the configured log and runs the scan for the configured MTA.
///
/// Pattern errors are reported before the log is read. `shutdown` and the
/// optional timeout both cancel the postfix correlation, which then returns
/// what it finished as a partial report. With `ids_only` the postfix scan
/// stops after collecting queue ids.
pub async fn run_scan(
    config: &ScanConfig,
    shutdown: CancellationToken
) -> Result<ScanReport> {
    match config.mta {
        Mta::Postfix => {
            let correlate_config = config.correlate_config();
            let id_filter = IdFilter::new(&correlate_config)?;
            let source = open_source(config).await?;

            if config.ids_only {
                return Ok(ScanReport::Postfix(scan_ids(id_filter, source).await?));
            }

            let scan_token = shutdown.child_token();
            if let Some(timeout) = config.timeout {
                tokio::spawn(cancel_after(timeout, scan_token.clone()));
            }

            let result = correlate_concurrent(
                Arc::new(correlate_config),
                Arc::new(source),
                config.workers,
                scan_token.clone()
            )
            .await;
            // releases the timeout task
            scan_token.cancel();

            Ok(ScanReport::Postfix(result?))
        }
        Mta::Exim => {
            let source = open_source(config).await?;
            let report = tokio::task::spawn_blocking(move || {
                source.fetch(&exim_prefilter()).map(|lines| scan_exim(lines))
            })
            .await
            .context("exim scan task join failed")??;

            info!(
                "exim scan finished: entries={}, distinct={}",
                report.entries().len(),
                report.count()
            );
            Ok(ScanReport::Exim(report))
        }
    }
}

async fn open_source(config: &ScanConfig) -> Result<FileSource> {
    let path: PathBuf = config.log_path().to_path_buf();
    let source = tokio::task::spawn_blocking(move || FileSource::open(path))
        .await
        .context("log load task join failed")??;

    info!(
        "scan starting: mta={:?}, log={}, lines={}",
        config.mta,
        source.path().display(),
        source.len()
    );
    Ok(source)
}

async fn scan_ids(
    id_filter: IdFilter,
    source: FileSource
) -> Result<Correlation> {
    let ids = tokio::task::spawn_blocking(move || {
        source
            .fetch(&id_filter.prefilter())
            .map(|lines| id_filter.scan(lines))
    })
    .await
    .context("id scan task join failed")??;

    info!("queue ids collected: ids={}", ids.len());
    Ok(Correlation { ids, ..Correlation::default() })
}

async fn cancel_after(
    timeout: Duration,
    token: CancellationToken
) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(timeout) => {
            warn!("scan deadline reached: timeout={timeout:?}");
            token.cancel();
        }
    }
}

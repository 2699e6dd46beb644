use serde::Serialize;
use tracing::{debug, info};

use crate::config::CorrelateConfig;
use crate::error::CorrelateError;
use crate::ids::IdFilter;
use crate::record::correlate_record;
use crate::reduce::{RejectedAddresses, reduce};
use crate::source::{LineFilter, LineSource};
use crate::types::{QueueIds, RecordMap};

/// Result of one correlation run.
///
/// `partial` is set when the run was cancelled before every id was
/// correlated; ids without a record are then either skipped by policy or
/// never reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Correlation {
    pub ids: QueueIds,
    pub records: RecordMap,
    pub rejected: RejectedAddresses,
    pub partial: bool
}

/// Runs the full pipeline sequentially:
/// daemon lines -> ids -> per-id lines -> records -> rejected addresses.
///
/// Configuration problems surface before the source is touched.
pub fn correlate<S>(
    config: &CorrelateConfig,
    source: &S
) -> Result<Correlation, CorrelateError>
where
    S: LineSource + ?Sized,
{
    let id_filter = IdFilter::new(config)?;
    let ids = id_filter.scan(source.fetch(&id_filter.prefilter())?);

    info!(
        "queue ids collected: daemon={}, search={}, ids={}",
        config.daemon,
        config.search,
        ids.len()
    );

    let mut records = RecordMap::default();
    for queue_id in &ids {
        let lines = source.fetch(&LineFilter::queue_id(queue_id))?;
        match correlate_record(queue_id, &lines, config)? {
            Some(record) => records.insert(record),
            None => debug!(
                "queue id without record: queue_id={}, lines={}",
                queue_id,
                lines.len()
            )
        }
    }

    let rejected = reduce(&records, &config.target_status);

    info!(
        "correlation finished: ids={}, records={}, rejected={}, status={}",
        ids.len(),
        records.len(),
        rejected.len(),
        config.target_status
    );

    Ok(Correlation { ids, records, rejected, partial: false })
}

#[cfg(feature = "tokio")]
mod concurrent {
    use std::sync::Arc;

    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;
    use tokio_util::sync::CancellationToken;
    use tracing::{debug, info, warn};

    use super::Correlation;
    use crate::config::CorrelateConfig;
    use crate::error::CorrelateError;
    use crate::ids::IdFilter;
    use crate::record::{RecordOutcome, build_record};
    use crate::reduce::reduce;
    use crate::source::{LineFilter, LineSource};
    use crate::types::{QueueId, RecordMap};

    /// Fans record correlation out over a bounded pool of blocking workers.
    ///
    /// Each worker owns one queue id and hands its record back to this
    /// coordinator, which merges results in id discovery order. Cancelling
    /// `shutdown` stops scheduling new ids and interrupts running workers
    /// between lines; the result is then flagged `partial`.
    pub async fn correlate_concurrent<S>(
        config: Arc<CorrelateConfig>,
        source: Arc<S>,
        workers: usize,
        shutdown: CancellationToken
    ) -> Result<Correlation, CorrelateError>
    where
        S: LineSource + ?Sized + 'static,
    {
        let id_filter = IdFilter::new(&config)?;

        let ids = {
            let source = source.clone();
            tokio::task::spawn_blocking(move || {
                source
                    .fetch(&id_filter.prefilter())
                    .map(|lines| id_filter.scan(lines))
            })
            .await
            .map_err(|err| {
                CorrelateError::Worker(format!("id scan task failed: {err}"))
            })??
        };

        let workers = workers.max(1);
        info!(
            "queue ids collected: daemon={}, search={}, ids={}, workers={}",
            config.daemon,
            config.search,
            ids.len(),
            workers
        );

        let workers_token = shutdown.child_token();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks: JoinSet<(usize, Result<RecordOutcome, CorrelateError>)> =
            JoinSet::new();
        let mut scheduled = 0usize;

        for (position, queue_id) in ids.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = workers_token.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let config = config.clone();
            let source = source.clone();
            let token = workers_token.clone();
            let queue_id: QueueId = queue_id.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = source
                    .fetch(&LineFilter::queue_id(&queue_id))
                    .and_then(|lines| {
                        build_record(&queue_id, &lines, &config, || {
                            token.is_cancelled()
                        })
                    });
                (position, outcome)
            });
            scheduled += 1;
        }

        let mut outcomes: Vec<(usize, RecordOutcome)> = Vec::with_capacity(scheduled);
        let mut failure: Option<CorrelateError> = None;

        while let Some(joined) = tasks.join_next().await {
            let err = match joined {
                Ok((position, Ok(outcome))) => {
                    outcomes.push((position, outcome));
                    continue;
                }
                Ok((_, Err(err))) => err,
                Err(err) => {
                    warn!("record worker join failed: error={err}");
                    CorrelateError::Worker(format!("record worker failed: {err}"))
                }
            };
            if failure.is_none() {
                // Stop the remaining workers; the error wins over partial data.
                workers_token.cancel();
                failure = Some(err);
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        outcomes.sort_by_key(|(position, _)| *position);

        let mut records = RecordMap::default();
        let mut partial = scheduled < ids.len();
        for (_, outcome) in outcomes {
            match outcome {
                RecordOutcome::Built(record) => records.insert(record),
                RecordOutcome::Skipped => {}
                RecordOutcome::Interrupted => partial = true
            }
        }

        if partial {
            warn!(
                "correlation cancelled: ids={}, scheduled={}, records={}",
                ids.len(),
                scheduled,
                records.len()
            );
        }

        let rejected = reduce(&records, &config.target_status);
        debug!(
            "concurrent correlation merged: records={}, rejected={}",
            records.len(),
            rejected.len()
        );

        Ok(Correlation { ids, records, rejected, partial })
    }
}

#[cfg(feature = "tokio")]
pub use concurrent::correlate_concurrent;

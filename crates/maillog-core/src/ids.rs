use regex::Regex;
use tracing::{debug, trace};

use crate::config::CorrelateConfig;
use crate::error::CorrelateError;
use crate::source::LineFilter;
use crate::template::{LineMatcher, Template, TemplateParams, build_matcher};
use crate::types::{QueueId, QueueIds};

/// Recovers queue ids from client-origin lines of one daemon stage.
///
/// `offset`/`limit` count matching lines (not raw lines, not distinct ids):
/// with `offset = k, limit = m` only matches at positions `[k, k + m)` are
/// recorded. `limit = 0` means unbounded.
#[derive(Debug, Clone)]
pub struct IdFilter {
    matcher: LineMatcher,
    prefilter: Regex,
    offset: usize,
    limit: usize
}

impl IdFilter {
    /// Compiles the daemon grammar. Fails before any line is read when the
    /// server/search fragments do not form a valid pattern.
    pub fn new(config: &CorrelateConfig) -> Result<Self, CorrelateError> {
        let template = Template::for_daemon(config.daemon);
        let matcher = build_matcher(
            template,
            &TemplateParams {
                server: &config.server,
                search: &config.search,
                queue_id: None
            }
        )?;

        let prefilter = Regex::new(&format!(
            r"{}\[\d+\]: [A-Za-z0-9]+: ",
            regex::escape(config.daemon.literal())
        ))
        .map_err(|err| CorrelateError::invalid(err.to_string()))?;

        debug!(
            "id filter ready: daemon={}, template={}, offset={}, limit={}",
            config.daemon,
            template.name(),
            config.offset,
            config.limit
        );

        Ok(Self {
            matcher,
            prefilter,
            offset: config.offset,
            limit: config.limit
        })
    }

    /// Cheap hint for the line source: only lines of the selected daemon.
    pub fn prefilter(&self) -> LineFilter {
        LineFilter::Pattern(self.prefilter.clone())
    }

    pub fn scan<I, S>(
        &self,
        lines: I
    ) -> QueueIds
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = QueueIds::default();
        let end = (self.limit > 0).then(|| self.offset.saturating_add(self.limit));
        let mut position = 0usize;

        for line in lines {
            let line = line.as_ref().trim_end();
            if line.trim_start().is_empty() {
                continue;
            }

            let Some(queue_id) = self.matcher.capture(line, "id") else {
                continue;
            };

            let current = position;
            position += 1;

            if current < self.offset {
                continue;
            }
            if end.is_some_and(|end| current >= end) {
                break;
            }

            if ids.insert(QueueId::new(queue_id)) {
                trace!("queue id collected: queue_id={queue_id}, position={current}");
            }
        }

        debug!(
            "id scan finished: matched_lines={}, distinct_ids={}",
            position,
            ids.len()
        );

        ids
    }
}

/// One-shot form of [`IdFilter::new`] + [`IdFilter::scan`].
pub fn filter_ids<I, S>(
    config: &CorrelateConfig,
    lines: I
) -> Result<QueueIds, CorrelateError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(IdFilter::new(config)?.scan(lines))
}

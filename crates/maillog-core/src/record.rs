use tracing::trace;

use crate::config::{CorrelateConfig, RecordPolicy, TargetStatus};
use crate::error::CorrelateError;
use crate::template::{LineMatcher, Template, TemplateParams, build_matcher};
use crate::types::{DeliveryRecord, QueueId, RecipientAttempt};

/// Field grammars bound to one queue id on the hosts matching `server`.
#[derive(Debug, Clone)]
pub struct RecordMatchers {
    scope: LineMatcher,
    from: LineMatcher,
    source: LineMatcher,
    send: LineMatcher,
    end: LineMatcher
}

impl RecordMatchers {
    pub fn new(
        queue_id: &QueueId,
        server: &str
    ) -> Result<Self, CorrelateError> {
        let params = TemplateParams { server, search: "", queue_id: Some(queue_id) };
        Ok(Self {
            scope: build_matcher(Template::Scope, &params)?,
            from: build_matcher(Template::From, &params)?,
            source: build_matcher(Template::Source, &params)?,
            send: build_matcher(Template::Send, &params)?,
            end: build_matcher(Template::End, &params)?
        })
    }

    /// Whether the line belongs to this queue id on a selected host.
    pub fn in_scope(
        &self,
        line: &str
    ) -> bool {
        self.scope.is_match(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Built(DeliveryRecord),
    /// `target-only` policy and no line carried the target status.
    Skipped,
    /// Cancellation was observed between lines.
    Interrupted
}

/// Folds the lines of one queue id into a [`DeliveryRecord`].
///
/// Lines of other queue ids or of hosts outside the server pattern are
/// ignored, so the caller may pass an unfiltered corpus. Every field grammar is tried on every line:
/// - `sender` / `source_domain`: first match wins, later lines never
///   overwrite
/// - attempts: appended in encounter order
/// - `completed`: set once, never reset
pub struct RecordBuilder {
    matchers: RecordMatchers,
    record: DeliveryRecord
}

impl RecordBuilder {
    pub fn new(
        queue_id: QueueId,
        server: &str
    ) -> Result<Self, CorrelateError> {
        Ok(Self::with_matchers(RecordMatchers::new(&queue_id, server)?, queue_id))
    }

    pub fn with_matchers(
        matchers: RecordMatchers,
        queue_id: QueueId
    ) -> Self {
        Self { matchers, record: DeliveryRecord::new(queue_id) }
    }

    pub fn feed(
        &mut self,
        raw: &str
    ) {
        let line = raw.trim_end();
        if !self.matchers.in_scope(line) {
            return;
        }

        self.record.raw_lines.push(line.to_string());

        if self.record.sender.is_empty() {
            if let Some(email) = self.matchers.from.capture(line, "email") {
                self.record.sender = email.to_string();
            }
        }

        if self.record.source_domain.is_empty() {
            if let Some(source) = self.matchers.source.capture(line, "source") {
                self.record.source_domain = source.to_string();
            }
        }

        if let Some(caps) = self.matchers.send.captures(line) {
            let attempt = RecipientAttempt {
                to: caps.name("to").map(|m| m.as_str().to_string()).unwrap_or_default(),
                original_to: caps.name("orig_to").map(|m| m.as_str().to_string()),
                status: caps
                    .name("status")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            };
            trace!(
                "recipient attempt: queue_id={}, to={}, orig_to={}, status={}",
                self.record.queue_id,
                attempt.to,
                attempt.original_to.as_deref().unwrap_or("-"),
                attempt.status
            );
            self.record.attempts.push(attempt);
        }

        if self.matchers.end.is_match(line) {
            self.record.completed = true;
        }
    }

    pub fn finish(self) -> DeliveryRecord {
        self.record
    }
}

/// True when the line reports `status=<target>` as a whole word.
pub fn has_status_token(
    line: &str,
    target: &TargetStatus
) -> bool {
    let target = target.as_str();
    line.match_indices("status=").any(|(at, key)| {
        let preceded = line[..at]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == ',');
        let rest = &line[at + key.len()..];
        preceded
            && rest.starts_with(target)
            && !rest[target.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Builds the record of one queue id, checking `cancelled` between lines.
///
/// Only lines written by hosts matching `config.server` count, so a short
/// queue id recycled on another host does not leak into the record.
pub fn build_record<S, F>(
    queue_id: &QueueId,
    lines: &[S],
    config: &CorrelateConfig,
    cancelled: F
) -> Result<RecordOutcome, CorrelateError>
where
    S: AsRef<str>,
    F: Fn() -> bool,
{
    let matchers = RecordMatchers::new(queue_id, &config.server)?;
    let target = &config.target_status;
    if config.record_policy == RecordPolicy::TargetOnly
        && !lines.iter().any(|line| {
            let line = line.as_ref();
            matchers.in_scope(line) && has_status_token(line, target)
        })
    {
        trace!(
            "record skipped without target status: queue_id={queue_id}, status={target}"
        );
        return Ok(RecordOutcome::Skipped);
    }

    let mut builder = RecordBuilder::with_matchers(matchers, queue_id.clone());
    for line in lines {
        if cancelled() {
            return Ok(RecordOutcome::Interrupted);
        }
        builder.feed(line.as_ref());
    }

    Ok(RecordOutcome::Built(builder.finish()))
}

/// Sequential form of [`build_record`]; `None` when the policy skipped the id.
pub fn correlate_record<S: AsRef<str>>(
    queue_id: &QueueId,
    lines: &[S],
    config: &CorrelateConfig
) -> Result<Option<DeliveryRecord>, CorrelateError> {
    match build_record(queue_id, lines, config, || false)? {
        RecordOutcome::Built(record) => Ok(Some(record)),
        RecordOutcome::Skipped | RecordOutcome::Interrupted => Ok(None)
    }
}

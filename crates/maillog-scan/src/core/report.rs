use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use maillog_core::{Correlation, EximRejection, EximReport, QueueId, QueueIds, RecordMap};
use serde::Serialize;

use super::runner::ScanReport;
use crate::config::{OutputFormat, ScanConfig};

#[derive(Serialize)]
struct PostfixJson<'a> {
    ids: &'a QueueIds,
    records: &'a RecordMap,
    rejected: BTreeMap<QueueId, Vec<String>>,
    rejected_last: BTreeMap<QueueId, String>,
    distinct: BTreeSet<String>,
    partial: bool
}

#[derive(Serialize)]
struct EximJson<'a> {
    entries: &'a [EximRejection],
    emails: &'a [String],
    count: usize
}

/// Renders the report for stdout. Text output is newline-terminated, one
/// value per line; an empty report renders as an empty string.
pub fn render_report(
    report: &ScanReport,
    config: &ScanConfig
) -> Result<String> {
    match (report, config.format) {
        (ScanReport::Postfix(result), OutputFormat::Json) => {
            serde_json::to_string_pretty(&postfix_json(result))
                .context("failed to encode json report")
        }
        (ScanReport::Exim(report), OutputFormat::Json) => {
            serde_json::to_string_pretty(&EximJson {
                entries: report.entries(),
                emails: report.emails(),
                count: report.count()
            })
            .context("failed to encode json report")
        }
        (ScanReport::Postfix(result), OutputFormat::Text) => {
            Ok(postfix_text(result, config))
        }
        (ScanReport::Exim(report), OutputFormat::Text) => {
            Ok(exim_text(report, config))
        }
    }
}

fn postfix_json(result: &Correlation) -> PostfixJson<'_> {
    PostfixJson {
        ids: &result.ids,
        records: &result.records,
        rejected: result.rejected.by_queue_id(),
        rejected_last: result.rejected.last_per_queue_id(),
        distinct: result.rejected.distinct(),
        partial: result.partial
    }
}

fn postfix_text(
    result: &Correlation,
    config: &ScanConfig
) -> String {
    if config.ids_only {
        return lines(result.ids.iter().map(QueueId::as_str));
    }
    if config.distinct {
        return lines(result.rejected.distinct().iter().map(String::as_str));
    }
    lines(result.rejected.entries().iter().map(|entry| entry.address.as_str()))
}

fn exim_text(
    report: &EximReport,
    config: &ScanConfig
) -> String {
    if config.ids_only {
        return lines(report.entries().iter().map(|entry| entry.message_id.as_str()));
    }
    if config.distinct {
        return lines(report.emails().iter().map(String::as_str));
    }
    lines(report.entries().iter().map(|entry| entry.email.as_str()))
}

fn lines<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.fold(String::new(), |mut out, value| {
        out.push_str(value);
        out.push('\n');
        out
    })
}

#[cfg(test)]
mod tests {
    use maillog_core::{MemorySource, correlate, scan_exim};

    use super::*;

    fn correlation() -> Correlation {
        let source = MemorySource::from_text(concat!(
            "Oct 12 08:00:01 mx1 postfix/smtpd[1]: AAA: client=localhost[127.0.0.1]\n",
            "Oct 12 08:00:01 mx1 postfix/smtpd[1]: BBB: client=localhost[127.0.0.1]\n",
            "Oct 12 08:00:02 mx1 postfix/smtp[2]: AAA: to=<x@far.example>, relay=none, delay=1, dsn=5.0.0, status=bounced (no)\n",
            "Oct 12 08:00:02 mx1 postfix/smtp[2]: AAA: to=<y@far.example>, relay=none, delay=1, dsn=5.0.0, status=bounced (no)\n",
            "Oct 12 08:00:02 mx1 postfix/smtp[2]: BBB: to=<x@far.example>, relay=none, delay=1, dsn=5.0.0, status=bounced (no)\n",
        ));
        correlate(&maillog_core::CorrelateConfig::default(), &source).unwrap()
    }

    #[test]
    fn text_lists_every_rejection_or_distinct_addresses() {
        let result = ScanReport::Postfix(correlation());

        let all = render_report(&result, &ScanConfig::default()).unwrap();
        assert_eq!(all, "x@far.example\ny@far.example\nx@far.example\n");

        let distinct = ScanConfig { distinct: true, ..ScanConfig::default() };
        assert_eq!(
            render_report(&result, &distinct).unwrap(),
            "x@far.example\ny@far.example\n"
        );

        let ids_only = ScanConfig { ids_only: true, ..ScanConfig::default() };
        assert_eq!(render_report(&result, &ids_only).unwrap(), "AAA\nBBB\n");
    }

    #[test]
    fn json_carries_all_views() {
        let result = ScanReport::Postfix(correlation());
        let config = ScanConfig { format: OutputFormat::Json, ..ScanConfig::default() };
        let rendered = render_report(&result, &config).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(json["ids"], serde_json::json!(["AAA", "BBB"]));
        assert_eq!(
            json["rejected"]["AAA"],
            serde_json::json!(["x@far.example", "y@far.example"])
        );
        assert_eq!(json["rejected_last"]["AAA"], "y@far.example");
        assert_eq!(json["distinct"], serde_json::json!(["x@far.example", "y@far.example"]));
        assert_eq!(json["partial"], false);
        assert!(json["records"]["BBB"].is_object());
    }

    #[test]
    fn exim_report_renders_emails_and_count() {
        let report = ScanReport::Exim(scan_exim([
            "2024-10-12 08:00:02 1sZabc-000Abc-7Q ** a@remote.org R=dnslookup: unrouteable",
            "2024-10-12 08:00:03 1sZabd-000Abd-8R ** a@remote.org R=dnslookup: unrouteable",
        ]));

        let text = render_report(&report, &ScanConfig::default()).unwrap();
        assert_eq!(text, "a@remote.org\na@remote.org\n");

        let config = ScanConfig { format: OutputFormat::Json, ..ScanConfig::default() };
        let json: serde_json::Value =
            serde_json::from_str(&render_report(&report, &config).unwrap()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["entries"][1]["message_id"], "1sZabd-000Abd-8R");
    }

    #[test]
    fn empty_report_renders_nothing() {
        let report = ScanReport::Postfix(Correlation::default());
        assert_eq!(render_report(&report, &ScanConfig::default()).unwrap(), "");
    }
}

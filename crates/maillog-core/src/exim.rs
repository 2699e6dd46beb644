//! Exim main log scan.
//!
//! Exim writes a failed delivery as a single `**` line, so no queue-id
//! correlation is needed:
//! `2024-10-12 08:00:02 1sZabc-000Abc-7Q ** user@example.org R=dnslookup ...`

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::source::LineFilter;

const EXIM_FAILURE: &str = r"^(?P<datetime>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) (?P<id>[a-zA-Z0-9-]+) (?P<status>..) (?P<email>[^ ]+@[^ ]+) .+$";

/// Delivery flag Exim writes for a permanent failure.
pub const EXIM_FAILURE_FLAG: &str = "**";
pub const EXIM_FAILURE_MARKER: &str = " ** ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EximRejection {
    pub datetime: String,
    pub message_id: String,
    pub status: String,
    pub email: String
}

/// Rejections keyed by Exim message id (a later line for the same id
/// replaces the earlier one) plus the distinct addresses in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EximReport {
    entries: Vec<EximRejection>,
    emails: Vec<String>
}

impl EximReport {
    pub fn entries(&self) -> &[EximRejection] {
        &self.entries
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// Number of distinct rejected addresses.
    pub fn count(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn failure_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(EXIM_FAILURE).expect("exim failure grammar is a valid pattern")
    })
}

/// Retrieval hint: only `**` lines can carry a rejection.
pub fn exim_prefilter() -> LineFilter {
    LineFilter::Contains(EXIM_FAILURE_MARKER.to_string())
}

pub fn parse_exim_line(line: &str) -> Option<EximRejection> {
    let caps = failure_regex().captures(line.trim_end())?;
    Some(EximRejection {
        datetime: caps.name("datetime")?.as_str().to_string(),
        message_id: caps.name("id")?.as_str().to_string(),
        status: caps.name("status")?.as_str().to_string(),
        email: caps.name("email")?.as_str().to_string()
    })
}

pub fn scan_exim<I, S>(lines: I) -> EximReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = EximReport::default();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut seen_emails: HashSet<String> = HashSet::new();

    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        let Some(rejection) = parse_exim_line(line) else {
            continue;
        };
        if rejection.status != EXIM_FAILURE_FLAG {
            continue;
        }

        if seen_emails.insert(rejection.email.clone()) {
            report.emails.push(rejection.email.clone());
        }

        match slots.get(&rejection.message_id) {
            Some(&slot) => report.entries[slot] = rejection,
            None => {
                slots.insert(rejection.message_id.clone(), report.entries.len());
                report.entries.push(rejection);
            }
        }
    }

    debug!(
        "exim scan finished: entries={}, distinct_emails={}",
        report.entries.len(),
        report.emails.len()
    );

    report
}

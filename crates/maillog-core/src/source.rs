use regex::Regex;

use crate::error::CorrelateError;
use crate::types::QueueId;

/// Narrowing hint passed to a [`LineSource`]. Sources may return more lines
/// than the filter admits; the engines re-check every line with their own
/// grammar.
#[derive(Debug, Clone)]
pub enum LineFilter {
    All,
    Contains(String),
    Pattern(Regex)
}

impl LineFilter {
    /// Lines carrying the `<id>: ` message prefix of one queue id.
    pub fn queue_id(queue_id: &QueueId) -> Self {
        Self::Contains(queue_id_marker(queue_id))
    }

    pub fn matches(
        &self,
        line: &str
    ) -> bool {
        match self {
            Self::All => true,
            Self::Contains(needle) => line.contains(needle.as_str()),
            Self::Pattern(regex) => regex.is_match(line)
        }
    }
}

pub(crate) fn queue_id_marker(queue_id: &QueueId) -> String {
    format!(" {queue_id}: ")
}

/// Retrieval collaborator. Implementations must keep the original line order
/// and must not de-duplicate; an empty result is not an error.
pub trait LineSource: Send + Sync {
    fn fetch(
        &self,
        filter: &LineFilter
    ) -> Result<Vec<String>, CorrelateError>;
}

impl<T: LineSource + ?Sized> LineSource for std::sync::Arc<T> {
    fn fetch(
        &self,
        filter: &LineFilter
    ) -> Result<Vec<String>, CorrelateError> {
        (**self).fetch(filter)
    }
}

impl<T: LineSource + ?Sized> LineSource for &T {
    fn fetch(
        &self,
        filter: &LineFilter
    ) -> Result<Vec<String>, CorrelateError> {
        (**self).fetch(filter)
    }
}

/// In-memory corpus, mostly for tests and for callers that already hold the
/// log text.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    lines: Vec<String>
}

impl MemorySource {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(|line| line.trim_end_matches('\r').to_string())
                .collect()
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for MemorySource {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { lines: iter.into_iter().map(Into::into).collect() }
    }
}

impl LineSource for MemorySource {
    fn fetch(
        &self,
        filter: &LineFilter
    ) -> Result<Vec<String>, CorrelateError> {
        Ok(self
            .lines
            .iter()
            .filter(|line| filter.matches(line))
            .cloned()
            .collect())
    }
}

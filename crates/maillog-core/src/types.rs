use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};

pub const STATUS_SENT: &str = "sent";
pub const STATUS_DEFERRED: &str = "deferred";
pub const STATUS_BOUNCED: &str = "bounced";
pub const STATUS_EXPIRED: &str = "expired";

/// Postfix queue id as it appears in the `<id>: ` prefix of a log message.
///
/// Only unique within the scanned corpus: postfix recycles short ids across
/// log rotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueueId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Insertion-ordered set of queue ids. Re-inserting an id is a no-op, so the
/// first sighting fixes its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueIds {
    order: Vec<QueueId>,
    seen: HashSet<QueueId>
}

impl QueueIds {
    pub fn insert(
        &mut self,
        queue_id: QueueId
    ) -> bool {
        if self.seen.contains(&queue_id) {
            return false;
        }
        self.seen.insert(queue_id.clone());
        self.order.push(queue_id);
        true
    }

    pub fn contains(
        &self,
        queue_id: &QueueId
    ) -> bool {
        self.seen.contains(queue_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueueId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueueIds {
    type Item = &'a QueueId;
    type IntoIter = std::slice::Iter<'a, QueueId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl Serialize for QueueIds {
    fn serialize<S: Serializer>(
        &self,
        serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.order)
    }
}

/// One delivery agent line (`to=<..>, [orig_to=<..>,] ... status=..`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipientAttempt {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_to: Option<String>,
    pub status: String
}

impl RecipientAttempt {
    /// Address the sender asked for: `orig_to` when postfix rewrote the
    /// recipient, otherwise `to`.
    pub fn effective_address(&self) -> &str {
        self.original_to
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub queue_id: QueueId,
    pub raw_lines: Vec<String>,
    pub sender: String,
    pub source_domain: String,
    pub attempts: Vec<RecipientAttempt>,
    pub completed: bool
}

impl DeliveryRecord {
    pub fn new(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            raw_lines: Vec::new(),
            sender: String::new(),
            source_domain: String::new(),
            attempts: Vec::new(),
            completed: false
        }
    }
}

/// Queue id -> record map that keeps records in the order their ids were
/// discovered. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMap {
    records: Vec<DeliveryRecord>,
    index: HashMap<QueueId, usize>
}

impl RecordMap {
    pub fn insert(
        &mut self,
        record: DeliveryRecord
    ) {
        match self.index.get(&record.queue_id) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.index.insert(record.queue_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(
        &self,
        queue_id: &QueueId
    ) -> Option<&DeliveryRecord> {
        self.index.get(queue_id).map(|&slot| &self.records[slot])
    }

    pub fn contains(
        &self,
        queue_id: &QueueId
    ) -> bool {
        self.index.contains_key(queue_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeliveryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordMap {
    type Item = &'a DeliveryRecord;
    type IntoIter = std::slice::Iter<'a, DeliveryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for RecordMap {
    fn serialize<S: Serializer>(
        &self,
        serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.records.iter().map(|record| (&record.queue_id, record))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_ids_keep_first_seen_order_without_duplicates() {
        let mut ids = QueueIds::default();
        assert!(ids.insert(QueueId::from("B2")));
        assert!(ids.insert(QueueId::from("A1")));
        assert!(!ids.insert(QueueId::from("B2")));

        let collected: Vec<&str> = ids.iter().map(QueueId::as_str).collect();
        assert_eq!(collected, vec!["B2", "A1"]);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn effective_address_prefers_original_recipient() {
        let rewritten = RecipientAttempt {
            to: "b@y".to_string(),
            original_to: Some("a@x".to_string()),
            status: STATUS_BOUNCED.to_string()
        };
        assert_eq!(rewritten.effective_address(), "a@x");

        let plain = RecipientAttempt {
            to: "c@z".to_string(),
            original_to: Some(String::new()),
            status: STATUS_BOUNCED.to_string()
        };
        assert_eq!(plain.effective_address(), "c@z");
    }

    #[test]
    fn record_map_replaces_in_place_and_serializes_in_discovery_order() {
        let mut map = RecordMap::default();
        map.insert(DeliveryRecord::new(QueueId::from("Z9")));
        map.insert(DeliveryRecord::new(QueueId::from("A1")));

        let mut replacement = DeliveryRecord::new(QueueId::from("Z9"));
        replacement.completed = true;
        map.insert(replacement);

        assert_eq!(map.len(), 2);
        assert!(map.get(&QueueId::from("Z9")).unwrap().completed);

        let json = serde_json::to_string(&map).unwrap();
        let z9 = json.find("\"Z9\"").unwrap();
        let a1 = json.find("\"A1\"").unwrap();
        assert!(z9 < a1);
    }
}

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::TargetStatus;
use crate::types::{DeliveryRecord, QueueId};

/// One rejected recipient, keyed by queue id and the index of the attempt
/// inside its record so several bounced recipients of one message all
/// survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub queue_id: QueueId,
    pub attempt_index: usize,
    pub address: String
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RejectedAddresses {
    entries: Vec<Rejection>
}

impl RejectedAddresses {
    pub fn entries(&self) -> &[Rejection] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue id -> rejected addresses, unique per id, in attempt order.
    pub fn by_queue_id(&self) -> BTreeMap<QueueId, Vec<String>> {
        let mut map: BTreeMap<QueueId, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            let addresses = map.entry(entry.queue_id.clone()).or_default();
            if !addresses.contains(&entry.address) {
                addresses.push(entry.address.clone());
            }
        }
        map
    }

    /// Single-slot view: the address of the last matching attempt per id.
    pub fn last_per_queue_id(&self) -> BTreeMap<QueueId, String> {
        self.entries
            .iter()
            .map(|entry| (entry.queue_id.clone(), entry.address.clone()))
            .collect()
    }

    pub fn distinct(&self) -> BTreeSet<String> {
        self.entries.iter().map(|entry| entry.address.clone()).collect()
    }
}

/// Collects every attempt whose status equals `target`, resolving each to
/// `orig_to` when postfix rewrote the recipient and to `to` otherwise.
pub fn reduce<'a, I>(
    records: I,
    target: &TargetStatus
) -> RejectedAddresses
where
    I: IntoIterator<Item = &'a DeliveryRecord>,
{
    let entries = records
        .into_iter()
        .flat_map(|record| {
            record
                .attempts
                .iter()
                .enumerate()
                .filter(|(_, attempt)| attempt.status == target.as_str())
                .map(|(attempt_index, attempt)| Rejection {
                    queue_id: record.queue_id.clone(),
                    attempt_index,
                    address: attempt.effective_address().to_string()
                })
        })
        .collect();

    RejectedAddresses { entries }
}

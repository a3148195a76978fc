//! Subject-keyed chain storage and its durable encoding.
//!
//! The durable document is a JSON object mapping subject id to an ordered
//! array of entry records.  Rehydration never fails: unreadable input is
//! trimmed to the longest prefix that can be linked safely and the losses
//! are recorded in a [`LoadReport`].

use crate::entry::Entry;
use crate::error::LedgerError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Records dropped while rehydrating a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Set when the whole document had to be discarded.
    pub document_error: Option<String>,
    /// One item per truncated or discarded chain.
    pub dropped: Vec<DroppedRecords>,
    /// Key holding an untouched copy of the document that lost records.
    pub preserved_as: Option<String>,
}

impl LoadReport {
    /// True when nothing was discarded.
    pub fn is_clean(&self) -> bool {
        self.document_error.is_none() && self.dropped.is_empty()
    }
}

/// A chain truncated at its first unreadable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecords {
    /// Subject whose chain was cut.
    pub subject_id: String,
    /// Index of the first record that could not be kept.
    pub index: usize,
    /// Number of records discarded from `index` onwards.
    pub count: usize,
    /// Why the record at `index` was rejected.
    pub reason: String,
}

/// In-memory map from subject id to that subject's chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStore {
    chains: BTreeMap<String, Vec<Entry>>,
}

impl LedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chain for `subject_id`, empty if never written.
    pub fn chain(&self, subject_id: &str) -> &[Entry] {
        self.chains
            .get(subject_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Last entry of the subject's chain.
    pub fn tail(&self, subject_id: &str) -> Option<&Entry> {
        self.chain(subject_id).last()
    }

    /// Appends `entry` to its subject's chain, creating the chain on first use.
    pub(crate) fn push(&mut self, entry: Entry) {
        self.chains
            .entry(entry.subject_id.clone())
            .or_default()
            .push(entry);
    }

    /// Iterates over subjects and their chains in subject order.
    pub fn chains(&self) -> impl Iterator<Item = (&str, &[Entry])> {
        self.chains
            .iter()
            .map(|(subject, chain)| (subject.as_str(), chain.as_slice()))
    }

    pub(crate) fn chain_map(&self) -> &BTreeMap<String, Vec<Entry>> {
        &self.chains
    }

    /// Number of subjects with at least one entry.
    pub fn subject_count(&self) -> usize {
        self.chains.len()
    }

    /// Total number of entries across all chains.
    pub fn entry_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    /// Encodes the whole store as the durable JSON document.
    pub fn to_json(&self) -> Result<String, LedgerError> {
        serde_json::to_string(&self.chains).map_err(|err| LedgerError::Encode(err.to_string()))
    }

    /// Rehydrates a store from its durable JSON document.
    pub fn from_json(raw: &str) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let object: Map<String, Value> = match serde_json::from_str(raw) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                let reason = format!("expected an object, found {}", json_kind(&other));
                warn!(%reason, "discarding achievement document");
                report.document_error = Some(reason);
                return (Self::default(), report);
            }
            Err(err) => {
                warn!(error = %err, "discarding unreadable achievement document");
                report.document_error = Some(err.to_string());
                return (Self::default(), report);
            }
        };

        let mut store = Self::default();
        for (subject_id, value) in object {
            let Value::Array(records) = value else {
                warn!(subject = %subject_id, "chain is not an array; dropping subject");
                report.dropped.push(DroppedRecords {
                    subject_id,
                    index: 0,
                    count: 1,
                    reason: "chain is not an array".to_string(),
                });
                continue;
            };
            let total = records.len();
            let (chain, failure) = rehydrate_chain(&subject_id, records);
            if let Some((index, reason)) = failure {
                warn!(
                    subject = %subject_id,
                    index,
                    dropped = total - index,
                    %reason,
                    "truncating chain at malformed entry"
                );
                report.dropped.push(DroppedRecords {
                    subject_id: subject_id.clone(),
                    index,
                    count: total - index,
                    reason,
                });
            }
            if !chain.is_empty() {
                store.chains.insert(subject_id, chain);
            }
        }
        (store, report)
    }
}

fn rehydrate_chain(subject_id: &str, records: Vec<Value>) -> (Vec<Entry>, Option<(usize, String)>) {
    let mut chain = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Entry>(record) {
            Ok(entry) if entry.subject_id == subject_id => chain.push(entry),
            Ok(entry) => {
                let reason = format!("entry belongs to {:?}", entry.subject_id);
                return (chain, Some((index, reason)));
            }
            Err(err) => return (chain, Some((index, err.to_string()))),
        }
    }
    (chain, None)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::HashAlgorithm;
    use crate::entry::build_entry;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_store() -> LedgerStore {
        let now = Utc.timestamp_opt(1_714_557_600, 0).unwrap();
        let mut store = LedgerStore::new();
        for subject in ["u1", "u2"] {
            let first = build_entry(subject, None, "welcome", 1, "Welcome", now, HashAlgorithm::Fnv1a);
            let second = build_entry(
                subject,
                Some(&first),
                "upload",
                1,
                "Upload",
                now,
                HashAlgorithm::Fnv1a,
            );
            store.push(first);
            store.push(second);
        }
        store
    }

    #[test]
    fn document_round_trips() {
        let store = sample_store();
        let (back, report) = LedgerStore::from_json(&store.to_json().unwrap());
        assert!(report.is_clean());
        assert_eq!(back, store);
        assert_eq!(back.subject_count(), 2);
        assert_eq!(back.entry_count(), 4);
    }

    #[test]
    fn unknown_subject_reads_empty() {
        let store = sample_store();
        assert!(store.chain("nobody").is_empty());
        assert!(store.tail("nobody").is_none());
    }

    #[test]
    fn malformed_entry_truncates_rest_of_chain() {
        let store = sample_store();
        let mut doc: Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        doc["u1"][1]
            .as_object_mut()
            .unwrap()
            .remove("prevHash");
        let (back, report) = LedgerStore::from_json(&doc.to_string());
        assert_eq!(back.chain("u1").len(), 1);
        assert_eq!(back.chain("u2").len(), 2);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].subject_id, "u1");
        assert_eq!(report.dropped[0].index, 1);
        assert_eq!(report.dropped[0].count, 1);
    }

    #[test]
    fn wrong_types_and_foreign_entries_are_dropped() {
        let store = sample_store();
        let mut doc: Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        doc["u1"][0]["value"] = json!("lots");
        doc["u2"][1]["userId"] = json!("u1");
        doc["u3"] = json!({"not": "a chain"});
        let (back, report) = LedgerStore::from_json(&doc.to_string());
        assert!(back.chain("u1").is_empty());
        assert_eq!(back.chain("u2").len(), 1);
        assert!(back.chain("u3").is_empty());
        assert_eq!(report.dropped.len(), 3);
        assert_eq!(back.subject_count(), 1);
    }

    #[test]
    fn garbage_document_yields_empty_store() {
        let (store, report) = LedgerStore::from_json("not json");
        assert_eq!(store.entry_count(), 0);
        assert!(report.document_error.is_some());

        let (store, report) = LedgerStore::from_json("[1, 2]");
        assert_eq!(store.entry_count(), 0);
        assert!(report
            .document_error
            .as_deref()
            .unwrap()
            .contains("an array"));
    }
}

//! Module result records, snapshots, and change events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::services::fingerprint;

/// One row of the module results table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Module number, the natural key
    pub id: String,

    /// Course name
    pub name: String,

    /// Final grade as displayed by the portal
    pub grade: String,

    /// Credits as displayed; not part of the fingerprint
    pub credits: String,

    /// Digest over `(id, name, grade)`
    pub fingerprint: String,
}

impl Record {
    /// Build a record and compute its fingerprint.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        grade: impl Into<String>,
        credits: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        let grade = grade.into();
        let fingerprint = fingerprint(&id, &name, &grade);

        Self {
            id,
            name,
            grade,
            credits: credits.into(),
            fingerprint,
        }
    }

    /// Whether the stored fingerprint still matches the record's fields.
    pub fn is_consistent(&self) -> bool {
        self.fingerprint == fingerprint(&self.id, &self.name, &self.grade)
    }
}

/// Last known record set, keyed by record id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Snapshot {
    records: BTreeMap<String, Record>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Insert or replace the record stored under its id.
    pub fn upsert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id.clone(), record)
    }

    /// Records ordered by id.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }
}

impl FromIterator<Record> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.upsert(record);
        }
        snapshot
    }
}

/// Classification of a record that is news to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    New(Record),
    Changed { old: Record, new: Record },
}

impl ChangeEvent {
    /// The record as currently shown by the portal.
    pub fn current(&self) -> &Record {
        match self {
            ChangeEvent::New(record) => record,
            ChangeEvent::Changed { new, .. } => new,
        }
    }

    pub fn previous(&self) -> Option<&Record> {
        match self {
            ChangeEvent::New(_) => None,
            ChangeEvent::Changed { old, .. } => Some(old),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_fingerprint() {
        let record = Record::new("20-00-0001", "Analysis I", "1,3", "9,0");
        assert!(record.is_consistent());
        assert_eq!(record.fingerprint.len(), 64);
    }

    #[test]
    fn test_tampered_record_is_inconsistent() {
        let mut record = Record::new("20-00-0001", "Analysis I", "1,3", "9,0");
        record.grade = "2,0".to_string();
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_snapshot_upsert_replaces_by_id() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.upsert(Record::new("A", "Algo", "4,0", "5")).is_none());
        let old = snapshot.upsert(Record::new("A", "Algo", "1,3", "5"));

        assert_eq!(old.map(|r| r.grade), Some("4,0".to_string()));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("A").map(|r| r.grade.as_str()), Some("1,3"));
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = ChangeEvent::New(Record::new("A", "Algo", "1,0", "5"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "new");
        assert_eq!(json["id"], "A");
    }
}

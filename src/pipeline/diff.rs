//! Change detection between snapshots.
//!
//! Classifies each freshly extracted record against the last known
//! snapshot as new, changed, or unchanged, and produces the next snapshot.
//!
//! > The first observation is the baseline, not news. Records missing from
//! > a later extraction are kept as they were; the detector never deletes.

use std::collections::HashSet;

use crate::logging::LogContext;
use crate::models::{ChangeEvent, Record, Snapshot};

/// Outcome of a diff: events to notify and the snapshot to persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub events: Vec<ChangeEvent>,
    pub next: Snapshot,
    /// Whether the previous snapshot was empty
    pub baseline: bool,
}

impl DiffResult {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn new_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ChangeEvent::New(_)))
            .count()
    }

    pub fn changed_count(&self) -> usize {
        self.events.len() - self.new_count()
    }
}

/// Fingerprint-based change detector.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Diff `current` against `previous`. Never fails.
    pub fn diff(&self, ctx: &LogContext, previous: &Snapshot, current: &[Record]) -> DiffResult {
        let current = Self::dedup(ctx, current);

        if previous.is_empty() {
            ctx.info(&format!(
                "No previous snapshot; recording {} record(s) as baseline",
                current.len()
            ));
            return DiffResult {
                events: Vec::new(),
                next: current.into_iter().cloned().collect(),
                baseline: true,
            };
        }

        let mut next = previous.clone();
        let mut events = Vec::new();

        for record in current {
            match previous.get(&record.id) {
                None => {
                    ctx.debug(&format!("New record {}", record.id));
                    events.push(ChangeEvent::New(record.clone()));
                    next.upsert(record.clone());
                }
                Some(old) if old.fingerprint != record.fingerprint => {
                    ctx.debug(&format!(
                        "Changed record {}: grade '{}' -> '{}'",
                        record.id, old.grade, record.grade
                    ));
                    events.push(ChangeEvent::Changed {
                        old: old.clone(),
                        new: record.clone(),
                    });
                    next.upsert(record.clone());
                }
                Some(_) => {}
            }
        }

        DiffResult {
            events,
            next,
            baseline: false,
        }
    }

    /// Keep the first record per id.
    fn dedup<'a>(ctx: &LogContext, records: &'a [Record]) -> Vec<&'a Record> {
        let mut seen = HashSet::new();
        let mut deduped = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.id.as_str()) {
                deduped.push(record);
            } else {
                ctx.warn(&format!("Duplicate record id {} ignored", record.id));
            }
        }
        deduped
    }
}

/// Convenience function to calculate diff.
pub fn calculate_diff(ctx: &LogContext, previous: &Snapshot, current: &[Record]) -> DiffResult {
    ChangeDetector::new().diff(ctx, previous, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LogContext {
        LogContext::new(0)
    }

    fn record(id: &str, grade: &str) -> Record {
        Record::new(id, format!("Course {id}"), grade, "5,0")
    }

    fn snapshot(records: &[Record]) -> Snapshot {
        records.iter().cloned().collect()
    }

    #[test]
    fn test_first_run_is_baseline() {
        let r1 = record("A", "1,0");
        let r2 = record("B", "2,0");

        let result = calculate_diff(&ctx(), &Snapshot::new(), &[r1.clone(), r2.clone()]);
        assert!(result.baseline);
        assert!(!result.has_changes());
        assert_eq!(result.next, snapshot(&[r1, r2]));
    }

    #[test]
    fn test_new_record() {
        let a = record("A", "1,0");
        let b = record("B", "2,3");

        let result = calculate_diff(&ctx(), &snapshot(&[a.clone()]), &[a.clone(), b.clone()]);
        assert_eq!(result.events, vec![ChangeEvent::New(b.clone())]);
        assert_eq!(result.next, snapshot(&[a, b]));
        assert_eq!(result.new_count(), 1);
    }

    #[test]
    fn test_changed_record() {
        let old = record("A", "4,0");
        let new = record("A", "1,3");

        let result = calculate_diff(&ctx(), &snapshot(&[old.clone()]), &[new.clone()]);
        assert_eq!(
            result.events,
            vec![ChangeEvent::Changed {
                old,
                new: new.clone()
            }]
        );
        assert_eq!(result.next, snapshot(&[new]));
        assert_eq!(result.changed_count(), 1);
    }

    #[test]
    fn test_second_diff_is_idempotent() {
        let previous = snapshot(&[record("A", "4,0")]);
        let current = vec![record("A", "1,3"), record("B", "2,0")];

        let first = calculate_diff(&ctx(), &previous, &current);
        assert_eq!(first.events.len(), 2);

        let second = calculate_diff(&ctx(), &first.next, &current);
        assert!(second.events.is_empty());
        assert_eq!(second.next, first.next);
    }

    #[test]
    fn test_absent_records_are_kept() {
        let a = record("A", "1,0");
        let b = record("B", "2,0");

        let result = calculate_diff(&ctx(), &snapshot(&[a.clone(), b.clone()]), &[a]);
        assert!(result.events.is_empty());
        assert_eq!(result.next.get("B"), Some(&b));
    }

    #[test]
    fn test_credits_change_is_not_news() {
        let old = Record::new("A", "Algo", "1,3", "5");
        let new = Record::new("A", "Algo", "1,3", "5,0");

        let result = calculate_diff(&ctx(), &snapshot(&[old.clone()]), &[new]);
        assert!(result.events.is_empty());
        assert_eq!(result.next.get("A"), Some(&old));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let a1 = record("A", "1,0");
        let a2 = record("A", "5,0");
        let existing = record("Z", "3,0");

        let result = calculate_diff(&ctx(), &snapshot(&[existing]), &[a1.clone(), a2]);
        assert_eq!(result.events, vec![ChangeEvent::New(a1.clone())]);
        assert_eq!(result.next.get("A"), Some(&a1));
    }

    #[test]
    fn test_event_order_follows_extraction() {
        let previous = snapshot(&[record("M", "4,0")]);
        let current = vec![record("Z", "1,0"), record("M", "2,0"), record("B", "1,7")];

        let result = calculate_diff(&ctx(), &previous, &current);
        let ids: Vec<&str> = result.events.iter().map(|e| e.current().id.as_str()).collect();
        assert_eq!(ids, vec!["Z", "M", "B"]);
    }
}

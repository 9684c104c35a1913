//! The bounded, ordered job working set.
//!
//! Ordering invariant: unread records always precede read records, and
//! within each partition relative arrival order is preserved (newest
//! first). Size invariant: never more than the cap; truncation drops
//! read records before unread ones, oldest first within each partition.

use crate::types::JobRecord;
use std::collections::HashSet;

/// Ordered, capped collection of job records.
#[derive(Debug, Clone)]
pub struct JobWorkingSet {
    records: Vec<JobRecord>,
    cap: usize,
}

impl JobWorkingSet {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            cap,
        }
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unread count derived from the working set itself — never from a
    /// server-side counter.
    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|j| !j.is_read).count()
    }

    /// Replace the working set wholesale from a snapshot.
    ///
    /// Idempotent: applying the same snapshot twice yields the same set.
    /// Returns `true` if the resulting set differs from the previous one.
    pub fn apply_snapshot(&mut self, jobs: Vec<JobRecord>) -> bool {
        let mut incoming = dedup_by_id(jobs);
        normalize(&mut incoming, self.cap);

        if incoming == self.records {
            return false;
        }
        self.records = incoming;
        true
    }

    /// Merge a delta of newly-discovered jobs.
    ///
    /// Records whose id is already present are ignored; if nothing new
    /// remains the call is a complete no-op. New records are prepended,
    /// then the set is re-partitioned and re-truncated. Returns the
    /// records that were actually added (for notification batching).
    pub fn apply_delta(&mut self, jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        let existing: HashSet<&str> = self.records.iter().map(|j| j.id.as_str()).collect();
        let fresh: Vec<JobRecord> = dedup_by_id(jobs)
            .into_iter()
            .filter(|j| !existing.contains(j.id.as_str()))
            .collect();

        if fresh.is_empty() {
            return fresh;
        }

        let mut merged = fresh.clone();
        merged.append(&mut self.records);
        normalize(&mut merged, self.cap);
        self.records = merged;

        fresh
    }

    /// Flip one record to read. Returns `true` if a record changed.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|j| j.id == id && !j.is_read)
        else {
            return false;
        };
        record.is_read = true;
        normalize(&mut self.records, self.cap);
        true
    }

    /// Flip every record to read. Returns `true` if anything changed.
    pub fn mark_all_read(&mut self) -> bool {
        let mut changed = false;
        for record in &mut self.records {
            if !record.is_read {
                record.is_read = true;
                changed = true;
            }
        }
        if changed {
            normalize(&mut self.records, self.cap);
        }
        changed
    }

    /// Discard everything (backend restart — the next snapshot resyncs).
    pub fn clear(&mut self) -> bool {
        if self.records.is_empty() {
            return false;
        }
        self.records.clear();
        true
    }
}

/// Re-establish the ordering and size invariants: stable-partition
/// unread-first, then truncate to the cap. Because read records sit at
/// the tail, truncation drops them first (oldest first), and only eats
/// into the unread partition once no read records remain — where it
/// likewise drops the oldest.
fn normalize(records: &mut Vec<JobRecord>, cap: usize) {
    let (mut unread, read): (Vec<JobRecord>, Vec<JobRecord>) =
        records.drain(..).partition(|j| !j.is_read);
    unread.extend(read);
    unread.truncate(cap);
    *records = unread;
}

/// Keep the first occurrence of each id, preserving order.
fn dedup_by_id(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|j| seen.insert(j.id.clone()))
        .collect()
}

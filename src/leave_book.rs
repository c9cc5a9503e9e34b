// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thread-safe leave record storage with duplicate detection.
//!
//! Each record sits behind its own lock, so a decision on one leave never
//! waits for a decision on another.

use crate::base::LeaveId;
use crate::error::LeaveError;
use crate::leave::LeaveRecord;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct BookEntry {
    /// Insertion sequence, for stable listing order.
    seq: u64,
    record: Arc<Mutex<LeaveRecord>>,
}

/// Leave records keyed by ID, listed in insertion order.
#[derive(Debug, Default)]
pub struct LeaveBook {
    records: DashMap<LeaveId, BookEntry>,
    next_seq: AtomicU64,
}

impl LeaveBook {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Adds a new record.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::Validation`] if a record with the same ID exists.
    pub fn insert(&self, record: LeaveRecord) -> Result<(), LeaveError> {
        // Entry API makes the check-and-insert atomic
        match self.records.entry(record.leave_id.clone()) {
            Entry::Occupied(entry) => Err(LeaveError::Validation(format!(
                "duplicate leave ID {}",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(BookEntry {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    record: Arc::new(Mutex::new(record)),
                });
                Ok(())
            }
        }
    }

    /// Shared handle to a record; lock it to read or decide.
    pub(crate) fn handle(&self, leave_id: &LeaveId) -> Option<Arc<Mutex<LeaveRecord>>> {
        self.records
            .get(leave_id)
            .map(|entry| Arc::clone(&entry.record))
    }

    pub fn get(&self, leave_id: &LeaveId) -> Option<LeaveRecord> {
        self.handle(leave_id).map(|record| record.lock().clone())
    }

    /// Records matching `predicate`, oldest first.
    pub fn filter(&self, predicate: impl Fn(&LeaveRecord) -> bool) -> Vec<LeaveRecord> {
        let mut matches: Vec<(u64, LeaveRecord)> = self
            .records
            .iter()
            .filter_map(|entry| {
                let record = entry.record.lock();
                predicate(&record).then(|| (entry.seq, record.clone()))
            })
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        matches.into_iter().map(|(_, record)| record).collect()
    }
}

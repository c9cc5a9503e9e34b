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

//! Leave identifier generation.

use crate::base::LeaveId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces globally unique, prefixed, human-readable identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> LeaveId;
}

/// Monotonic counter rendered as `{prefix}{n:04}`, e.g. `LID0001`.
///
/// Lock-free; concurrent callers never receive the same number.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Resumes numbering after previously issued IDs.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, prefix: &str) -> LeaveId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        LeaveId(format!("{prefix}{n:04}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ids_are_prefixed_and_padded() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id("LID"), LeaveId::from("LID0001"));
        assert_eq!(ids.next_id("LID"), LeaveId::from("LID0002"));
    }

    #[test]
    fn ids_grow_past_padding() {
        let ids = SequentialIds::starting_at(12_345);
        assert_eq!(ids.next_id("LID"), LeaveId::from("LID12345"));
    }

    #[test]
    fn concurrent_ids_are_unique() {
        let ids = Arc::new(SequentialIds::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..100).map(|_| ids.next_id("LID")).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id issued");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

/// Records invariant violations by logical round and detects
/// persistent violations: the same violation reported by two
/// consecutive invariant checks.
#[derive(Clone, Debug, Default)]
pub struct ViolationTracker {
    by_round: BTreeMap<i64, Vec<String>>,
    previous_check: BTreeSet<String>,
    persistent: BTreeSet<String>,
}

// ===== impl ViolationTracker =====

impl ViolationTracker {
    pub fn new() -> ViolationTracker {
        Default::default()
    }

    /// Records the outcome of one invariant check. An empty slice is a
    /// clean check and resets the persistence window.
    pub fn track(&mut self, violations: &[String], logical_round: i64) {
        if !violations.is_empty() {
            self.by_round
                .entry(logical_round)
                .or_default()
                .extend_from_slice(violations);
        }
        let current: BTreeSet<String> = violations.iter().cloned().collect();
        self.persistent =
            current.intersection(&self.previous_check).cloned().collect();
        self.previous_check = current;
    }

    /// Violations reported by both of the two most recent checks.
    pub fn persistent_violations(&self) -> Vec<String> {
        self.persistent.iter().cloned().collect()
    }

    /// Violations reported by the most recent check.
    pub fn last_check(&self) -> Vec<String> {
        self.previous_check.iter().cloned().collect()
    }

    // End-of-run snapshot: every violation keyed by the logical round
    // it was detected in.
    pub fn snapshot(&self) -> &BTreeMap<i64, Vec<String>> {
        &self.by_round
    }

    pub fn is_empty(&self) -> bool {
        self.by_round.is_empty()
    }
}

// ===== tests =====

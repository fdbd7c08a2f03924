//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use rewind_utils::ids::{HostId, PolicyId};

/// Ledger of the reachability policies declared over the lifetime of a
/// run, indexed by host pair. Downstream invariant checks consult it to
/// decide whether observed connectivity matches declared intent.
#[derive(Clone, Debug, Default)]
pub struct ConnectivityTracker {
    /// Answer for host pairs no policy ever mentioned.
    pub default_connected: bool,
    connected_pairs: PairMap,
    disconnected_pairs: PairMap,
    policies: BTreeSet<PolicyId>,
}

type PairMap = BTreeMap<HostId, BTreeMap<HostId, BTreeSet<PolicyRecord>>>;

// One declared policy between two concrete interfaces.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct PolicyRecord {
    src_iface: String,
    dst_iface: String,
    policy: PolicyId,
}

// ===== impl ConnectivityTracker =====

impl ConnectivityTracker {
    pub fn new(default_connected: bool) -> ConnectivityTracker {
        ConnectivityTracker {
            default_connected,
            ..Default::default()
        }
    }

    /// Whether two hosts are expected to be able to communicate:
    /// explicit connected records win, then explicit disconnected
    /// records, then the default.
    pub fn is_connected(&self, src: &HostId, dst: &HostId) -> bool {
        if pair_records(&self.connected_pairs, src, dst)
            .is_some_and(|records| !records.is_empty())
        {
            return true;
        }
        if pair_records(&self.disconnected_pairs, src, dst)
            .is_some_and(|records| !records.is_empty())
        {
            return false;
        }
        self.default_connected
    }

    // Records a policy connecting two hosts over the given interfaces.
    pub fn add_connected_hosts(
        &mut self,
        src: &HostId,
        src_iface: &str,
        dst: &HostId,
        dst_iface: &str,
        policy: PolicyId,
    ) {
        self.policies.insert(policy.clone());
        insert(
            &mut self.connected_pairs,
            src,
            dst,
            PolicyRecord {
                src_iface: src_iface.to_owned(),
                dst_iface: dst_iface.to_owned(),
                policy,
            },
        );
    }

    // Records a policy disconnecting two hosts over the given
    // interfaces.
    pub fn add_disconnected_hosts(
        &mut self,
        src: &HostId,
        src_iface: &str,
        dst: &HostId,
        dst_iface: &str,
        policy: PolicyId,
    ) {
        self.policies.insert(policy.clone());
        insert(
            &mut self.disconnected_pairs,
            src,
            dst,
            PolicyRecord {
                src_iface: src_iface.to_owned(),
                dst_iface: dst_iface.to_owned(),
                policy,
            },
        );
    }

    /// Removes connected records for a host pair. A `None` interface is
    /// a wildcard matching every interface pair. When `remove_policies`
    /// is set, policies referenced by the stripped records are dropped
    /// from the registry as well.
    pub fn remove_connected_hosts(
        &mut self,
        src: &HostId,
        src_iface: Option<&str>,
        dst: &HostId,
        dst_iface: Option<&str>,
        remove_policies: bool,
    ) {
        let removed = remove(
            &mut self.connected_pairs,
            src,
            src_iface,
            dst,
            dst_iface,
        );
        if remove_policies {
            for record in removed {
                self.policies.remove(&record.policy);
            }
        }
    }

    /// Removes disconnected records for a host pair; see
    /// [`ConnectivityTracker::remove_connected_hosts`].
    pub fn remove_disconnected_hosts(
        &mut self,
        src: &HostId,
        src_iface: Option<&str>,
        dst: &HostId,
        dst_iface: Option<&str>,
        remove_policies: bool,
    ) {
        let removed = remove(
            &mut self.disconnected_pairs,
            src,
            src_iface,
            dst,
            dst_iface,
        );
        if remove_policies {
            for record in removed {
                self.policies.remove(&record.policy);
            }
        }
    }

    /// Erases every record referencing the policy, in both ledgers, and
    /// drops it from the registry.
    pub fn remove_policy(&mut self, policy: &PolicyId) {
        for pairs in [&mut self.connected_pairs, &mut self.disconnected_pairs]
        {
            for adj in pairs.values_mut() {
                for records in adj.values_mut() {
                    records.retain(|record| record.policy != *policy);
                }
            }
        }
        self.policies.remove(policy);
    }

    // The registry of every policy id ever declared and not removed.
    pub fn policies(&self) -> &BTreeSet<PolicyId> {
        &self.policies
    }

    pub fn connected_count(&self, src: &HostId, dst: &HostId) -> usize {
        pair_records(&self.connected_pairs, src, dst)
            .map_or(0, BTreeSet::len)
    }

    pub fn disconnected_count(&self, src: &HostId, dst: &HostId) -> usize {
        pair_records(&self.disconnected_pairs, src, dst)
            .map_or(0, BTreeSet::len)
    }
}

// ===== helper functions =====

fn pair_records<'a>(
    pairs: &'a PairMap,
    src: &HostId,
    dst: &HostId,
) -> Option<&'a BTreeSet<PolicyRecord>> {
    pairs.get(src).and_then(|adj| adj.get(dst))
}

fn insert(pairs: &mut PairMap, src: &HostId, dst: &HostId, record: PolicyRecord) {
    pairs
        .entry(src.clone())
        .or_default()
        .entry(dst.clone())
        .or_default()
        .insert(record);
}

fn remove(
    pairs: &mut PairMap,
    src: &HostId,
    src_iface: Option<&str>,
    dst: &HostId,
    dst_iface: Option<&str>,
) -> Vec<PolicyRecord> {
    let Some(records) = pairs.get_mut(src).and_then(|adj| adj.get_mut(dst))
    else {
        return vec![];
    };
    let matches = |record: &PolicyRecord| {
        src_iface.is_none_or(|iface| record.src_iface == iface)
            && dst_iface.is_none_or(|iface| record.dst_iface == iface)
    };
    let removed = records.iter().filter(|r| matches(r)).cloned().collect();
    records.retain(|record| !matches(record));
    removed
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn h(id: &str) -> HostId {
        id.into()
    }

    #[test]
    fn test_add_connected_hosts() {
        let mut tracker = ConnectivityTracker::new(false);
        tracker.add_connected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        // Explicit connected records win regardless of the default.
        assert!(tracker.is_connected(&h("h1"), &h("h2")));
        assert_eq!(tracker.connected_count(&h("h1"), &h("h2")), 1);
        assert_eq!(tracker.disconnected_count(&h("h1"), &h("h2")), 0);
        assert!(tracker.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_add_disconnected_hosts() {
        let mut tracker = ConnectivityTracker::new(true);
        tracker.add_disconnected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        assert!(!tracker.is_connected(&h("h1"), &h("h2")));
        assert_eq!(tracker.connected_count(&h("h1"), &h("h2")), 0);
        assert_eq!(tracker.disconnected_count(&h("h1"), &h("h2")), 1);
        assert!(tracker.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_remove_connected_hosts() {
        let mut tracker1 = ConnectivityTracker::new(false);
        let mut tracker2 = ConnectivityTracker::new(false);
        for tracker in [&mut tracker1, &mut tracker2] {
            tracker.add_connected_hosts(
                &h("h1"),
                "h1-eth0",
                &h("h2"),
                "h2-eth0",
                "p1".into(),
            );
        }

        tracker1.remove_connected_hosts(
            &h("h1"),
            Some("h1-eth0"),
            &h("h2"),
            Some("h2-eth0"),
            true,
        );
        tracker2.remove_connected_hosts(
            &h("h1"),
            Some("h1-eth0"),
            &h("h2"),
            Some("h2-eth0"),
            false,
        );

        for tracker in [&tracker1, &tracker2] {
            assert!(!tracker.is_connected(&h("h1"), &h("h2")));
            assert_eq!(tracker.connected_count(&h("h1"), &h("h2")), 0);
        }
        // Only the remove_policies=true variant drops the registry
        // entry.
        assert!(!tracker1.policies().contains(&"p1".into()));
        assert!(tracker2.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_remove_connected_hosts_wildcard() {
        let mut tracker = ConnectivityTracker::new(false);
        tracker.add_connected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        tracker.remove_connected_hosts(&h("h1"), None, &h("h2"), None, true);

        assert!(!tracker.is_connected(&h("h1"), &h("h2")));
        assert_eq!(tracker.connected_count(&h("h1"), &h("h2")), 0);
        assert!(!tracker.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_remove_disconnected_hosts_wildcard() {
        let mut tracker = ConnectivityTracker::new(true);
        tracker.add_disconnected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        tracker.remove_disconnected_hosts(
            &h("h1"),
            None,
            &h("h2"),
            None,
            true,
        );

        assert!(tracker.is_connected(&h("h1"), &h("h2")));
        assert_eq!(tracker.disconnected_count(&h("h1"), &h("h2")), 0);
        assert!(!tracker.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_non_matching_interface_is_kept() {
        let mut tracker = ConnectivityTracker::new(false);
        tracker.add_connected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        tracker.remove_connected_hosts(
            &h("h1"),
            Some("h1-eth1"),
            &h("h2"),
            None,
            true,
        );

        assert!(tracker.is_connected(&h("h1"), &h("h2")));
        assert_eq!(tracker.connected_count(&h("h1"), &h("h2")), 1);
    }

    #[test]
    fn test_remove_policy() {
        let mut tracker = ConnectivityTracker::new(true);
        tracker.add_disconnected_hosts(
            &h("h1"),
            "h1-eth0",
            &h("h2"),
            "h2-eth0",
            "p1".into(),
        );

        tracker.remove_policy(&"p1".into());

        // Every effect of the policy is erased.
        assert!(tracker.is_connected(&h("h1"), &h("h2")));
        assert!(!tracker.policies().contains(&"p1".into()));
    }

    #[test]
    fn test_default_connected() {
        let tracker1 = ConnectivityTracker::new(true);
        let tracker2 = ConnectivityTracker::new(false);
        assert!(tracker1.is_connected(&h("h1"), &h("h2")));
        assert!(!tracker2.is_connected(&h("h1"), &h("h2")));
    }
}

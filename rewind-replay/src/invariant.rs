//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use itertools::Itertools;
use rewind_events::codec::InvariantNames;
use rewind_topology::NodeId;
use rewind_topology::graph::{host_node_id, switch_node_id};

use crate::simulation::Simulation;

/// An invariant check: runs synchronously against the simulation and
/// returns violation strings (empty means the invariant holds).
pub type InvariantCheck = fn(&Simulation) -> Vec<String>;

/// Static registry of named invariant checks.
///
/// Checks are identified by name only; traces carrying executable
/// check code are refused at decode time. The registry is an explicit
/// object (not process-global) so tests can extend it independently.
pub struct InvariantRegistry {
    checks: BTreeMap<String, InvariantCheck>,
}

// ===== impl InvariantRegistry =====

impl InvariantRegistry {
    // Creates a registry with the built-in checks registered.
    pub fn new() -> InvariantRegistry {
        let mut registry = InvariantRegistry {
            checks: Default::default(),
        };
        registry.register("check_connectivity", check_connectivity);
        registry.register("check_liveness", check_liveness);
        registry
    }

    pub fn register(&mut self, name: &str, check: InvariantCheck) {
        self.checks.insert(name.to_owned(), check);
    }

    pub fn get(&self, name: &str) -> Option<InvariantCheck> {
        self.checks.get(name).copied()
    }
}

impl Default for InvariantRegistry {
    fn default() -> InvariantRegistry {
        InvariantRegistry::new()
    }
}

impl InvariantNames for InvariantRegistry {
    fn contains_invariant(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }
}

// ===== built-in checks =====

/// Verifies that every host pair the connectivity tracker declares
/// connected is actually reachable over live links and non-crashed
/// switches.
pub fn check_connectivity(sim: &Simulation) -> Vec<String> {
    let mut violations = vec![];

    // Node ids of crashed switches; links through them don't count.
    let crashed: BTreeSet<NodeId> = sim
        .topology
        .switches()
        .filter(|switch| sim.switch_is_crashed(switch.dpid))
        .map(switch_node_id)
        .collect();

    // Undirected reachability adjacency over live links, keyed by the
    // owning host/switch nodes.
    let mut adjacencies: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for link in sim.topology.links() {
        if sim.link_is_severed(link) {
            continue;
        }
        let a = link.src.node.clone();
        let b = link.dst.node.clone();
        if crashed.contains(&a) || crashed.contains(&b) {
            continue;
        }
        adjacencies.entry(a.clone()).or_default().push(b.clone());
        adjacencies.entry(b).or_default().push(a);
    }

    let hosts: Vec<_> = sim.topology.hosts().collect();
    for (src, dst) in hosts
        .iter()
        .cartesian_product(&hosts)
        .filter(|(src, dst)| src.hid != dst.hid)
        .filter(|(src, dst)| {
            sim.connectivity.is_connected(&src.hid, &dst.hid)
        })
    {
        if !reachable(&adjacencies, &host_node_id(src), &host_node_id(dst)) {
            violations.push(format!("host {src} cannot reach host {dst}"));
        }
    }
    violations
}

/// Verifies that every controller the harness manages is still alive.
pub fn check_liveness(sim: &Simulation) -> Vec<String> {
    sim.crashed_controllers()
        .iter()
        .map(|cid| format!("controller {cid} is down"))
        .collect()
}

// ===== helper functions =====

fn reachable(
    adjacencies: &BTreeMap<NodeId, Vec<NodeId>>,
    from: &NodeId,
    to: &NodeId,
) -> bool {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::from([from.clone()]);
    while let Some(node) = queue.pop_front() {
        if node == *to {
            return true;
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        if let Some(neighbors) = adjacencies.get(&node) {
            queue.extend(neighbors.iter().cloned());
        }
    }
    false
}

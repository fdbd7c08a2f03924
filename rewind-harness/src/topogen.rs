//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_topology::{Host, HostInterface, Link, Switch, TopologyGraph};
use rewind_utils::ids::{Dpid, PortNo};
use rewind_utils::mac_addr::MacAddr;

// Invalid topology generator specification.
#[derive(Debug, Eq, PartialEq)]
pub struct InvalidTopologySpec(pub String);

// ===== global functions =====

/// Builds the initial topology from the generator specification in the
/// configuration file: `linear,<n>` (a chain of n switches) or
/// `mesh,<n>` (a full mesh), each switch with one attached host.
pub fn generate(spec: &str) -> Result<TopologyGraph, InvalidTopologySpec> {
    let (shape, count) = spec
        .split_once(',')
        .ok_or_else(|| InvalidTopologySpec(spec.to_owned()))?;
    let count: u16 = count
        .trim()
        .parse()
        .map_err(|_| InvalidTopologySpec(spec.to_owned()))?;
    if count == 0 {
        return Err(InvalidTopologySpec(spec.to_owned()));
    }
    match shape.trim() {
        "linear" => Ok(linear(count)),
        "mesh" => Ok(mesh(count)),
        _ => Err(InvalidTopologySpec(spec.to_owned())),
    }
}

// ===== helper functions =====

// A chain s1 - s2 - ... - sn. Port 1 faces the previous switch, port 2
// the next one, port 3 the host.
fn linear(count: u16) -> TopologyGraph {
    let mut topology = TopologyGraph::new();
    let switches: Vec<_> = (1..=count)
        .map(|i| Switch::with_ports(Dpid(i as u64), &format!("s{i}"), 3))
        .collect();
    for switch in &switches {
        topology.add_switch(switch.clone()).unwrap();
    }
    for (host, switch, port_no) in hosts_for(&switches, PortNo(3)) {
        let iface = host.interfaces[0].clone();
        topology.add_host(host.clone()).unwrap();
        topology
            .add_link(Link::access(&host, &iface, &switch, port_no), true)
            .unwrap();
    }
    for pair in switches.windows(2) {
        let link =
            Link::between_switches(&pair[0], PortNo(2), &pair[1], PortNo(1));
        topology.add_link(link, true).unwrap();
    }
    topology
}

// A full mesh of n switches. Switch i reaches peer j through port j
// (or j-1 when j > i); the host hangs off port n.
fn mesh(count: u16) -> TopologyGraph {
    let mut topology = TopologyGraph::new();
    let switches: Vec<_> = (1..=count)
        .map(|i| Switch::with_ports(Dpid(i as u64), &format!("s{i}"), count))
        .collect();
    for switch in &switches {
        topology.add_switch(switch.clone()).unwrap();
    }
    for (host, switch, port_no) in hosts_for(&switches, PortNo(count)) {
        let iface = host.interfaces[0].clone();
        topology.add_host(host.clone()).unwrap();
        topology
            .add_link(Link::access(&host, &iface, &switch, port_no), true)
            .unwrap();
    }
    for i in 1..=count {
        for j in (i + 1)..=count {
            let port_i = PortNo(j - 1);
            let port_j = PortNo(i);
            let link = Link::between_switches(
                &switches[(i - 1) as usize],
                port_i,
                &switches[(j - 1) as usize],
                port_j,
            );
            topology.add_link(link, true).unwrap();
        }
    }
    topology
}

// One host per switch, attached at the given port.
fn hosts_for(
    switches: &[Switch],
    port_no: PortNo,
) -> Vec<(Host, Switch, PortNo)> {
    switches
        .iter()
        .enumerate()
        .map(|(index, switch)| {
            let i = index + 1;
            let mut hw_addr = [0u8; 6];
            hw_addr[5] = i as u8;
            hw_addr[4] = (i >> 8) as u8;
            let host = Host::new(
                format!("h{i}").as_str().into(),
                format!("h{i}"),
                vec![HostInterface::new(
                    format!("h{i}-eth0"),
                    MacAddr::from(hw_addr),
                    vec![format!("10.0.0.{i}").parse().unwrap()],
                )],
            );
            (host, switch.clone(), port_no)
        })
        .collect()
}

// ===== impl InvalidTopologySpec =====

impl std::fmt::Display for InvalidTopologySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid topology generator spec: {}", self.0)
    }
}

impl std::error::Error for InvalidTopologySpec {}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear() {
        let topology = generate("linear,3").unwrap();
        assert_eq!(topology.switches().count(), 3);
        assert_eq!(topology.hosts().count(), 3);
        // 2 trunks + 3 access links.
        assert_eq!(topology.links().count(), 5);
    }

    #[test]
    fn test_mesh() {
        let topology = generate("mesh,3").unwrap();
        assert_eq!(topology.switches().count(), 3);
        // 3 trunks + 3 access links.
        assert_eq!(topology.links().count(), 6);
    }

    #[test]
    fn test_invalid_spec() {
        assert!(generate("ring,3").is_err());
        assert!(generate("linear").is_err());
        assert!(generate("mesh,0").is_err());
    }
}

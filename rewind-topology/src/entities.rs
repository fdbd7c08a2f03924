//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use derive_new::new;
use rewind_utils::ids::{Dpid, HostId, PortNo};
use rewind_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// A simulated end host and its network interfaces.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct Host {
    pub hid: HostId,
    pub name: String,
    pub interfaces: Vec<HostInterface>,
}

/// One interface of a simulated host.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct HostInterface {
    pub name: String,
    pub hw_addr: MacAddr,
    pub ips: Vec<IpAddr>,
}

/// A simulated OpenFlow switch and its physical ports.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Switch {
    pub dpid: Dpid,
    pub name: String,
    pub ports: BTreeMap<PortNo, Port>,
}

/// One physical port of a simulated switch.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct Port {
    pub port_no: PortNo,
    pub name: String,
    pub hw_addr: MacAddr,
}

/// A network (or access) link between two attachment points.
///
/// Endpoints may reference either a switch port or a host interface;
/// which one is resolved against the graph when the link is added.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct Link {
    pub src: LinkEnd,
    pub dst: LinkEnd,
}

/// One endpoint of a link: the owning node plus the port or interface
/// identity on it. Recorded traces name endpoints in two schemes
/// (start/end vs node1/node2); both normalize to this form.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct LinkEnd {
    /// Node id of the owning switch or host.
    pub node: NodeId,
    /// Name of the port or interface; may be empty.
    pub port_name: String,
    /// Port number, for switch ports.
    pub port_no: Option<PortNo>,
}

// ===== impl Switch =====

impl Switch {
    // Creates a switch with sequentially numbered ports 1..=nports,
    // named the conventional way ("s1-1", "s1-2", ...).
    pub fn with_ports(dpid: Dpid, name: &str, nports: u16) -> Switch {
        let ports = (1..=nports)
            .map(|port_no| {
                let mut hw_addr = [0u8; 6];
                hw_addr[..4].copy_from_slice(
                    &(dpid.0 as u32).to_be_bytes(),
                );
                hw_addr[4..].copy_from_slice(&port_no.to_be_bytes());
                (
                    PortNo(port_no),
                    Port::new(
                        PortNo(port_no),
                        format!("{name}-{port_no}"),
                        MacAddr::from(hw_addr),
                    ),
                )
            })
            .collect();
        Switch {
            dpid,
            name: name.to_owned(),
            ports,
        }
    }
}

impl std::fmt::Display for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ===== impl Host =====

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ===== impl Link =====

impl Link {
    // Link between two switch ports.
    pub fn between_switches(
        src_switch: &Switch,
        src_port: PortNo,
        dst_switch: &Switch,
        dst_port: PortNo,
    ) -> Link {
        let end = |switch: &Switch, port_no: PortNo| {
            let port_name = switch
                .ports
                .get(&port_no)
                .map(|port| port.name.clone())
                .unwrap_or_default();
            LinkEnd::new(
                NodeId::from(switch.name.as_str()),
                port_name,
                Some(port_no),
            )
        };
        Link::new(end(src_switch, src_port), end(dst_switch, dst_port))
    }

    // Access link between a host interface and a switch port.
    pub fn access(
        host: &Host,
        iface: &HostInterface,
        switch: &Switch,
        port_no: PortNo,
    ) -> Link {
        let port_name = switch
            .ports
            .get(&port_no)
            .map(|port| port.name.clone())
            .unwrap_or_default();
        Link::new(
            LinkEnd::new(
                NodeId::from(host.name.as_str()),
                iface.name.clone(),
                None,
            ),
            LinkEnd::new(
                NodeId::from(switch.name.as_str()),
                port_name,
                Some(port_no),
            ),
        )
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <-> {}", self.src, self.dst)
    }
}

// ===== impl LinkEnd =====

impl std::fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port_no {
            Some(port_no) => write!(f, "{}:{}", self.node, port_no),
            None => write!(f, "{}:{}", self.node, self.port_name),
        }
    }
}

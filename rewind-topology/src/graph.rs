//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use rewind_utils::ids::{Dpid, HostId};
use serde::{Deserialize, Serialize};

use crate::entities::{Host, HostInterface, Link, LinkEnd, Port, Switch};
use crate::error::Error;

/// Stable identifier of a node in the topology graph.
///
/// Hosts and switches are keyed by name, interfaces by their interface
/// name, and switch ports by the port name (or `<switch>-<port_no>`
/// when the port carries no usable name).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

// Node types of the topology graph.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeType {
    Host,
    Switch,
    Port,
    Interface,
}

// Edge types of the topology graph. Internal links are the virtual
// switch<->port and host<->interface attachments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeType {
    Link,
    InternalLink,
}

// Entity stored on a graph node.
#[derive(Clone, Debug)]
enum NodeEntity {
    Host(Host),
    Switch(Switch),
    Port(Port),
    Interface(HostInterface),
}

#[derive(Clone, Debug)]
struct NodeAttrs {
    ntype: NodeType,
    entity: NodeEntity,
}

#[derive(Clone, Debug)]
struct EdgeAttrs {
    etype: EdgeType,
    bidir: bool,
    link: Option<Link>,
}

/// The authoritative model of the simulated network: a directed
/// multigraph with typed nodes (hosts, switches, ports, interfaces)
/// and typed edges (network links vs internal attachments).
///
/// Entities are owned by the graph and keyed by stable ids; every
/// cross-reference is an id resolved through a lookup, never a shared
/// pointer.
#[derive(Clone, Debug, Default)]
pub struct TopologyGraph {
    nodes: BTreeMap<NodeId, NodeAttrs>,
    edges: BTreeMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>,
}

// ===== impl NodeId =====

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> NodeId {
        NodeId(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> NodeId {
        NodeId(id)
    }
}

// ===== impl TopologyGraph =====

impl TopologyGraph {
    pub fn new() -> TopologyGraph {
        Default::default()
    }

    /// Adds a host, auto-creating an INTERFACE node for each of its
    /// interfaces plus the internal attachment edges in both
    /// directions.
    pub fn add_host(&mut self, host: Host) -> Result<NodeId, Error> {
        let hid = host_node_id(&host);
        if self.nodes.contains_key(&hid) {
            return Err(Error::DuplicateNode(hid));
        }
        for iface in &host.interfaces {
            let iface_id = interface_node_id(iface);
            self.insert_node(
                iface_id.clone(),
                NodeType::Interface,
                NodeEntity::Interface(iface.clone()),
            )?;
            self.insert_internal_link(&hid, &iface_id);
        }
        self.insert_node(
            hid.clone(),
            NodeType::Host,
            NodeEntity::Host(host),
        )?;
        Ok(hid)
    }

    /// Adds a switch, auto-creating a PORT node for each of its ports
    /// plus the internal attachment edges in both directions.
    pub fn add_switch(&mut self, switch: Switch) -> Result<NodeId, Error> {
        let sid = switch_node_id(&switch);
        if self.nodes.contains_key(&sid) {
            return Err(Error::DuplicateNode(sid));
        }
        for port in switch.ports.values() {
            let port_id = port_node_id(&sid, port);
            self.insert_node(
                port_id.clone(),
                NodeType::Port,
                NodeEntity::Port(port.clone()),
            )?;
            self.insert_internal_link(&sid, &port_id);
        }
        self.insert_node(
            sid.clone(),
            NodeType::Switch,
            NodeEntity::Switch(switch),
        )?;
        Ok(sid)
    }

    /// Removes a host, cascading removal of its interfaces and of
    /// every link incident to them.
    pub fn remove_host(&mut self, hid: &HostId) -> Result<(), Error> {
        let host = self
            .get_host(hid)
            .cloned()
            .ok_or_else(|| Error::UnknownHost(hid.clone()))?;
        for iface in &host.interfaces {
            self.remove_node(&interface_node_id(iface))?;
        }
        self.remove_node(&host_node_id(&host))
    }

    /// Removes a switch, cascading removal of its ports and of every
    /// link incident to them.
    pub fn remove_switch(&mut self, dpid: Dpid) -> Result<(), Error> {
        let switch = self
            .get_switch(dpid)
            .cloned()
            .ok_or(Error::UnknownSwitch(dpid))?;
        let sid = switch_node_id(&switch);
        for port in switch.ports.values() {
            self.remove_node(&port_node_id(&sid, port))?;
        }
        self.remove_node(&sid)
    }

    /// Adds a link connecting two ports/interfaces. A bidirectional
    /// link is stored as two symmetric edges marked `bidir`.
    pub fn add_link(&mut self, link: Link, bidir: bool) -> Result<(), Error> {
        let src = self.resolve_end(&link.src)?;
        let dst = self.resolve_end(&link.dst)?;
        let attrs = EdgeAttrs {
            etype: EdgeType::Link,
            bidir,
            link: Some(link),
        };
        if bidir {
            self.insert_edge(&dst, &src, attrs.clone());
        }
        self.insert_edge(&src, &dst, attrs);
        Ok(())
    }

    /// Removes a link; the symmetric edge of a bidirectional link is
    /// removed along with it.
    pub fn remove_link(&mut self, link: &Link) -> Result<(), Error> {
        let src = self.resolve_end(&link.src)?;
        let dst = self.resolve_end(&link.dst)?;
        let attrs = self
            .edge(&src, &dst)
            .ok_or_else(|| Error::LinkNotFound(src.clone(), dst.clone()))?;
        if attrs.etype != EdgeType::Link {
            return Err(Error::NotALink(src, dst));
        }
        let bidir = attrs.bidir;
        self.remove_edge(&src, &dst);
        if bidir && self.edge(&dst, &src).is_some() {
            self.remove_edge(&dst, &src);
        }
        Ok(())
    }

    /// Returns the link connecting two nodes, if any. An edge of any
    /// other type between the pair is a data-model breach.
    pub fn get_link(
        &self,
        node1: &NodeId,
        node2: &NodeId,
    ) -> Result<Option<&Link>, Error> {
        let Some(attrs) = self.edge(node1, node2) else {
            return Ok(None);
        };
        if attrs.etype != EdgeType::Link {
            return Err(Error::NotALink(node1.clone(), node2.clone()));
        }
        Ok(attrs.link.as_ref())
    }

    // Returns true if the link's edge exists in the graph.
    pub fn has_link(&self, link: &Link) -> Result<bool, Error> {
        let src = self.resolve_end(&link.src)?;
        let dst = self.resolve_end(&link.dst)?;
        Ok(self.get_link(&src, &dst)?.is_some())
    }

    pub fn has_edge(&self, node1: &NodeId, node2: &NodeId) -> bool {
        self.edge(node1, node2).is_some()
    }

    // Returns all links connected to any interface of the host.
    pub fn get_host_links(&self, hid: &HostId) -> Result<Vec<Link>, Error> {
        let host = self
            .get_host(hid)
            .ok_or_else(|| Error::UnknownHost(hid.clone()))?;
        let mut links = vec![];
        for iface in &host.interfaces {
            self.collect_links(&interface_node_id(iface), &mut links);
        }
        Ok(links)
    }

    // Returns all links connected to any port of the switch.
    pub fn get_switch_links(&self, dpid: Dpid) -> Result<Vec<Link>, Error> {
        let switch =
            self.get_switch(dpid).ok_or(Error::UnknownSwitch(dpid))?;
        let sid = switch_node_id(switch);
        let mut links = vec![];
        for port in switch.ports.values() {
            self.collect_links(&port_node_id(&sid, port), &mut links);
        }
        Ok(links)
    }

    /// Adds a port to an existing switch (host migrations create new
    /// virtual ingress ports).
    pub fn add_port(&mut self, dpid: Dpid, port: Port) -> Result<NodeId, Error> {
        let switch =
            self.get_switch(dpid).ok_or(Error::UnknownSwitch(dpid))?;
        let sid = switch_node_id(switch);
        let port_id = port_node_id(&sid, &port);
        self.insert_node(
            port_id.clone(),
            NodeType::Port,
            NodeEntity::Port(port.clone()),
        )?;
        self.insert_internal_link(&sid, &port_id);
        if let Some(NodeAttrs {
            entity: NodeEntity::Switch(switch),
            ..
        }) = self.nodes.get_mut(&sid)
        {
            switch.ports.insert(port.port_no, port);
        }
        Ok(port_id)
    }

    /// Removes a port from a switch, cascading removal of every link
    /// incident to it.
    pub fn remove_port(
        &mut self,
        dpid: Dpid,
        port_no: rewind_utils::ids::PortNo,
    ) -> Result<(), Error> {
        let switch =
            self.get_switch(dpid).ok_or(Error::UnknownSwitch(dpid))?;
        let sid = switch_node_id(switch);
        let port = switch
            .ports
            .get(&port_no)
            .ok_or_else(|| Error::UnknownNode(sid.clone()))?
            .clone();
        self.remove_node(&port_node_id(&sid, &port))?;
        if let Some(NodeAttrs {
            entity: NodeEntity::Switch(switch),
            ..
        }) = self.nodes.get_mut(&sid)
        {
            switch.ports.remove(&port_no);
        }
        Ok(())
    }

    pub fn get_host(&self, hid: &HostId) -> Option<&Host> {
        self.hosts().find(|host| host.hid == *hid)
    }

    pub fn get_switch(&self, dpid: Dpid) -> Option<&Switch> {
        self.switches().find(|switch| switch.dpid == dpid)
    }

    pub fn has_host(&self, hid: &HostId) -> bool {
        self.get_host(hid).is_some()
    }

    pub fn has_switch(&self, dpid: Dpid) -> bool {
        self.get_switch(dpid).is_some()
    }

    pub fn has_node(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node_type(&self, node: &NodeId) -> Option<NodeType> {
        self.nodes.get(node).map(|attrs| attrs.ntype)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.nodes.values().filter_map(|attrs| match &attrs.entity {
            NodeEntity::Host(host) => Some(host),
            _ => None,
        })
    }

    pub fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.nodes.values().filter_map(|attrs| match &attrs.entity {
            NodeEntity::Switch(switch) => Some(switch),
            _ => None,
        })
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.nodes.values().filter_map(|attrs| match &attrs.entity {
            NodeEntity::Port(port) => Some(port),
            _ => None,
        })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &HostInterface> {
        self.nodes.values().filter_map(|attrs| match &attrs.entity {
            NodeEntity::Interface(iface) => Some(iface),
            _ => None,
        })
    }

    /// Iterates over the network links in the graph. A bidirectional
    /// link is yielded once.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.edges.iter().flat_map(|(src, adj)| {
            adj.iter().filter_map(move |(dst, attrs)| {
                if attrs.etype != EdgeType::Link {
                    return None;
                }
                // Yield the symmetric twin of a bidir link only once.
                if attrs.bidir && src > dst {
                    return None;
                }
                attrs.link.as_ref()
            })
        })
    }

    // Resolves a link endpoint to the graph node it attaches to.
    //
    // The endpoint may be named in the PORT scheme or the INTERFACE
    // scheme; both candidate ids are probed and exactly one must be
    // present in the graph.
    fn resolve_end(&self, end: &LinkEnd) -> Result<NodeId, Error> {
        let port_id = if !end.port_name.is_empty()
            && end.port_name.contains(end.node.as_str())
        {
            NodeId::from(end.port_name.as_str())
        } else if let Some(port_no) = end.port_no {
            NodeId::from(format!("{}-{}", end.node, port_no))
        } else {
            NodeId::from(end.port_name.as_str())
        };
        let iface_id = NodeId::from(end.port_name.as_str());

        let as_port = (self.node_type(&port_id) == Some(NodeType::Port))
            .then_some(port_id);
        let as_iface =
            (self.node_type(&iface_id) == Some(NodeType::Interface))
                .then_some(iface_id);
        match (as_port, as_iface) {
            (Some(port_id), None) => Ok(port_id),
            (None, Some(iface_id)) => Ok(iface_id),
            (Some(..), Some(..)) => {
                Err(Error::AmbiguousLinkEndpoint(end.node.clone()))
            }
            (None, None) => Err(Error::UnknownLinkEndpoint(end.node.clone())),
        }
    }

    fn insert_node(
        &mut self,
        id: NodeId,
        ntype: NodeType,
        entity: NodeEntity,
    ) -> Result<(), Error> {
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.nodes.insert(id, NodeAttrs { ntype, entity });
        Ok(())
    }

    fn insert_internal_link(&mut self, node1: &NodeId, node2: &NodeId) {
        let attrs = EdgeAttrs {
            etype: EdgeType::InternalLink,
            bidir: true,
            link: None,
        };
        self.insert_edge(node1, node2, attrs.clone());
        self.insert_edge(node2, node1, attrs);
    }

    fn insert_edge(&mut self, src: &NodeId, dst: &NodeId, attrs: EdgeAttrs) {
        self.edges
            .entry(src.clone())
            .or_default()
            .insert(dst.clone(), attrs);
    }

    fn edge(&self, src: &NodeId, dst: &NodeId) -> Option<&EdgeAttrs> {
        self.edges.get(src).and_then(|adj| adj.get(dst))
    }

    fn remove_edge(&mut self, src: &NodeId, dst: &NodeId) {
        if let Some(adj) = self.edges.get_mut(src) {
            adj.remove(dst);
            if adj.is_empty() {
                self.edges.remove(src);
            }
        }
    }

    // Removes a node together with all of its in/out edges.
    fn remove_node(&mut self, node: &NodeId) -> Result<(), Error> {
        if !self.nodes.contains_key(node) {
            return Err(Error::UnknownNode(node.clone()));
        }
        self.edges.remove(node);
        for adj in self.edges.values_mut() {
            adj.remove(node);
        }
        self.edges.retain(|_, adj| !adj.is_empty());
        self.nodes.remove(node);
        Ok(())
    }

    fn collect_links(&self, node: &NodeId, links: &mut Vec<Link>) {
        let out_edges = self
            .edges
            .get(node)
            .into_iter()
            .flat_map(|adj| adj.values());
        let in_edges = self
            .edges
            .values()
            .filter_map(|adj| adj.get(node));
        for attrs in out_edges.chain(in_edges) {
            if attrs.etype == EdgeType::Link
                && let Some(link) = &attrs.link
                && !links.contains(link)
            {
                links.push(link.clone());
            }
        }
    }
}

// ===== global functions =====

pub fn host_node_id(host: &Host) -> NodeId {
    if !host.name.is_empty() {
        NodeId::from(host.name.as_str())
    } else {
        NodeId::from(host.hid.as_str())
    }
}

pub fn switch_node_id(switch: &Switch) -> NodeId {
    if !switch.name.is_empty() {
        NodeId::from(switch.name.as_str())
    } else {
        NodeId::from(switch.dpid.to_string())
    }
}

pub fn interface_node_id(iface: &HostInterface) -> NodeId {
    NodeId::from(iface.name.as_str())
}

pub fn port_node_id(sid: &NodeId, port: &Port) -> NodeId {
    if !port.name.is_empty() && port.name.contains(sid.as_str()) {
        NodeId::from(port.name.as_str())
    } else {
        NodeId::from(format!("{}-{}", sid, port.port_no))
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use rewind_utils::ids::PortNo;

    use super::*;

    fn host(name: &str, ifaces: u16) -> Host {
        let interfaces = (0..ifaces)
            .map(|i| {
                let hw_addr = [0xde, 0xad, 0, 0, 0, i as u8].into();
                HostInterface::new(
                    format!("{name}-eth{i}"),
                    hw_addr,
                    vec![],
                )
            })
            .collect();
        Host::new(name.into(), name.to_owned(), interfaces)
    }

    fn two_switch_graph() -> (TopologyGraph, Switch, Switch) {
        let mut graph = TopologyGraph::new();
        let s1 = Switch::with_ports(Dpid(1), "s1", 2);
        let s2 = Switch::with_ports(Dpid(2), "s2", 2);
        graph.add_switch(s1.clone()).unwrap();
        graph.add_switch(s2.clone()).unwrap();
        (graph, s1, s2)
    }

    #[test]
    fn test_add_host_creates_interfaces() {
        let mut graph = TopologyGraph::new();
        graph.add_host(host("h1", 2)).unwrap();

        assert!(graph.has_host(&"h1".into()));
        assert_eq!(graph.interfaces().count(), 2);
        // The internal attachments exist in both directions.
        assert!(graph.has_edge(&"h1".into(), &"h1-eth0".into()));
        assert!(graph.has_edge(&"h1-eth0".into(), &"h1".into()));
        // And they are not network links.
        assert_eq!(
            graph.get_link(&"h1".into(), &"h1-eth0".into()),
            Err(Error::NotALink("h1".into(), "h1-eth0".into()))
        );
    }

    #[test]
    fn test_add_switch_creates_ports() {
        let (graph, ..) = two_switch_graph();
        assert!(graph.has_switch(Dpid(1)));
        assert_eq!(graph.ports().count(), 4);
        assert_eq!(graph.node_type(&"s1-1".into()), Some(NodeType::Port));
    }

    #[test]
    fn test_remove_host_cascades() {
        let mut graph = TopologyGraph::new();
        let h1 = host("h1", 1);
        let s1 = Switch::with_ports(Dpid(1), "s1", 2);
        graph.add_host(h1.clone()).unwrap();
        graph.add_switch(s1.clone()).unwrap();
        let access =
            Link::access(&h1, &h1.interfaces[0], &s1, PortNo(1));
        graph.add_link(access, false).unwrap();

        graph.remove_host(&"h1".into()).unwrap();

        // No node or edge referring to the host or its interfaces
        // survives.
        assert!(!graph.has_node(&"h1".into()));
        assert!(!graph.has_node(&"h1-eth0".into()));
        assert_eq!(graph.links().count(), 0);
        assert_eq!(
            graph.remove_host(&"h1".into()),
            Err(Error::UnknownHost("h1".into()))
        );
    }

    #[test]
    fn test_remove_switch_cascades() {
        let (mut graph, s1, s2) = two_switch_graph();
        graph
            .add_link(Link::between_switches(&s1, PortNo(1), &s2, PortNo(1)), true)
            .unwrap();
        graph
            .add_link(Link::between_switches(&s1, PortNo(2), &s2, PortNo(2)), false)
            .unwrap();

        graph.remove_switch(Dpid(1)).unwrap();

        assert!(!graph.has_switch(Dpid(1)));
        assert!(!graph.has_node(&"s1-1".into()));
        assert_eq!(graph.links().count(), 0);
        assert!(graph.get_switch_links(Dpid(2)).unwrap().is_empty());
    }

    #[test]
    fn test_bidirectional_link() {
        let (mut graph, s1, s2) = two_switch_graph();
        let link = Link::between_switches(&s1, PortNo(1), &s2, PortNo(1));
        graph.add_link(link.clone(), true).unwrap();

        // Both directed edges exist.
        assert!(graph.has_edge(&"s1-1".into(), &"s2-1".into()));
        assert!(graph.has_edge(&"s2-1".into(), &"s1-1".into()));
        assert!(graph.has_link(&link).unwrap());
        assert_eq!(graph.links().count(), 1);

        // Removing the link removes both edges.
        graph.remove_link(&link).unwrap();
        assert!(!graph.has_edge(&"s1-1".into(), &"s2-1".into()));
        assert!(!graph.has_edge(&"s2-1".into(), &"s1-1".into()));
        assert!(!graph.has_link(&link).unwrap());
    }

    #[test]
    fn test_unidirectional_link() {
        let (mut graph, s1, s2) = two_switch_graph();
        let link = Link::between_switches(&s1, PortNo(1), &s2, PortNo(1));
        graph.add_link(link.clone(), false).unwrap();

        assert!(graph.has_edge(&"s1-1".into(), &"s2-1".into()));
        assert!(!graph.has_edge(&"s2-1".into(), &"s1-1".into()));
        assert!(
            graph
                .get_link(&"s1-1".into(), &"s2-1".into())
                .unwrap()
                .is_some()
        );
        assert!(
            graph
                .get_link(&"s1-2".into(), &"s2-2".into())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_link_endpoint_resolution() {
        let mut graph = TopologyGraph::new();
        let h1 = host("h1", 1);
        let s1 = Switch::with_ports(Dpid(1), "s1", 2);
        graph.add_host(h1.clone()).unwrap();
        graph.add_switch(s1.clone()).unwrap();

        // Interface-scheme endpoint resolves to the INTERFACE node.
        let access = Link::access(&h1, &h1.interfaces[0], &s1, PortNo(1));
        graph.add_link(access.clone(), true).unwrap();
        assert!(graph.has_edge(&"h1-eth0".into(), &"s1-1".into()));

        // An endpoint matching nothing in the graph is an error.
        let bogus = Link::new(
            LinkEnd::new("s9".into(), "s9-1".to_owned(), Some(PortNo(1))),
            LinkEnd::new("s1".into(), "s1-2".to_owned(), Some(PortNo(2))),
        );
        assert_eq!(
            graph.add_link(bogus, false),
            Err(Error::UnknownLinkEndpoint("s9".into()))
        );
    }

    #[test]
    fn test_switch_links_roundtrip() {
        let (mut graph, s1, s2) = two_switch_graph();
        let link = Link::between_switches(&s1, PortNo(1), &s2, PortNo(1));
        graph.add_link(link.clone(), true).unwrap();

        let before = graph.get_switch_links(Dpid(1)).unwrap();
        assert_eq!(before, vec![link.clone()]);

        graph.remove_link(&link).unwrap();
        assert!(graph.get_switch_links(Dpid(1)).unwrap().is_empty());

        graph.add_link(link.clone(), true).unwrap();
        assert_eq!(graph.get_switch_links(Dpid(1)).unwrap(), before);
    }
}

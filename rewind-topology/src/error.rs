//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::ids::{Dpid, HostId};
use tracing::error;

use crate::graph::NodeId;

// Topology errors.
//
// `NotALink` and `AmbiguousLinkEndpoint` are data-model breaches and
// abort the run; the rest surface as failed events.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    DuplicateNode(NodeId),
    UnknownNode(NodeId),
    UnknownHost(HostId),
    UnknownSwitch(Dpid),
    UnknownLinkEndpoint(NodeId),
    AmbiguousLinkEndpoint(NodeId),
    LinkNotFound(NodeId, NodeId),
    NotALink(NodeId, NodeId),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::DuplicateNode(node)
            | Error::UnknownNode(node)
            | Error::UnknownLinkEndpoint(node)
            | Error::AmbiguousLinkEndpoint(node) => {
                error!(%node, "{}", self);
            }
            Error::UnknownHost(hid) => {
                error!(host = %hid, "{}", self);
            }
            Error::UnknownSwitch(dpid) => {
                error!(%dpid, "{}", self);
            }
            Error::LinkNotFound(node1, node2)
            | Error::NotALink(node1, node2) => {
                error!(%node1, %node2, "{}", self);
            }
        }
    }

    // Whether this error is a data-model breach that must abort the
    // run rather than fail a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NotALink(..) | Error::AmbiguousLinkEndpoint(..)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateNode(..) => {
                write!(f, "node already exists in the topology")
            }
            Error::UnknownNode(..) => {
                write!(f, "node doesn't exist in the topology")
            }
            Error::UnknownHost(..) => {
                write!(f, "host doesn't exist in the topology")
            }
            Error::UnknownSwitch(..) => {
                write!(f, "switch doesn't exist in the topology")
            }
            Error::UnknownLinkEndpoint(..) => {
                write!(f, "link endpoint matches no port or interface")
            }
            Error::AmbiguousLinkEndpoint(..) => {
                write!(f, "link endpoint matches both a port and an interface")
            }
            Error::LinkNotFound(..) => {
                write!(f, "link is not part of the topology")
            }
            Error::NotALink(..) => {
                write!(f, "edge exists but is not a network link")
            }
        }
    }
}

impl std::error::Error for Error {}

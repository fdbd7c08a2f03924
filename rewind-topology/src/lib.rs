//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod connectivity;
pub mod entities;
pub mod error;
pub mod graph;

pub use connectivity::ConnectivityTracker;
pub use entities::{Host, HostInterface, Link, LinkEnd, Port, Switch};
pub use error::Error;
pub use graph::{EdgeType, NodeId, NodeType, TopologyGraph};

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Datapath identifier uniquely naming a switch.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

// Stable string identifying a controller process in the harness.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct ControllerId(String);

// Stable string identifying a simulated host.
//
// Recorded traces carry host ids either as strings or as bare integers;
// both normalize to the string form.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct HostId(String);

// OpenFlow 1.0 physical port number.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct PortNo(pub u16);

// Reachability policy identifier (an intent id in practice).
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct PolicyId(String);

// ===== impl Dpid =====

impl std::fmt::Display for Dpid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Dpid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Dpid)
    }
}

// ===== impl ControllerId =====

impl ControllerId {
    pub fn new(id: impl Into<String>) -> ControllerId {
        ControllerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ControllerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ControllerId {
    fn from(id: &str) -> ControllerId {
        ControllerId(id.to_owned())
    }
}

// ===== impl HostId =====

impl HostId {
    pub fn new(id: impl Into<String>) -> HostId {
        HostId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HostId {
    fn from(id: &str) -> HostId {
        HostId(id.to_owned())
    }
}

// ===== impl PortNo =====

impl std::fmt::Display for PortNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== impl PolicyId =====

impl PolicyId {
    pub fn new(id: impl Into<String>) -> PolicyId {
        PolicyId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PolicyId {
    fn from(id: &str) -> PolicyId {
        PolicyId(id.to_owned())
    }
}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use rewind_events::input::IntentSpec;
use rewind_topology::{ConnectivityTracker, Link, TopologyGraph};
use rewind_utils::fingerprint::DpFingerprint;
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use rewind_utils::label::LabelAllocator;

use crate::buffer::{FlowModGates, OpenFlowBuffer};
use crate::error::CollabError;
use crate::invariant::InvariantRegistry;
use crate::pending::ConnectionId;
use crate::sync::SyncChannel;
use crate::violation::ViolationTracker;
use crate::worker::WorkerPool;

/// Contract of the external controller process manager.
pub trait ControllerManager: Send {
    /// Causes all switches to open connections to their parent
    /// controller(s).
    fn connect_to_controllers(&mut self) -> Result<(), CollabError>;
    fn crash_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError>;
    fn recover_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError>;
    fn block_peers(
        &mut self,
        cid1: &ControllerId,
        cid2: &ControllerId,
    ) -> Result<(), CollabError>;
    fn unblock_peers(
        &mut self,
        cid1: &ControllerId,
        cid2: &ControllerId,
    ) -> Result<(), CollabError>;
    /// Asks the controller to install an intent; false means the
    /// request was not accepted yet.
    fn add_intent(
        &mut self,
        cid: &ControllerId,
        intent: &IntentSpec,
    ) -> Result<bool, CollabError>;
    fn remove_intent(
        &mut self,
        cid: &ControllerId,
        intent_id: &str,
    ) -> Result<bool, CollabError>;
    fn send_link_notification(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError>;
}

/// Contract of the external dataplane patch panel.
pub trait PatchPanel: Send {
    /// Severs a network link; false means the link was already down.
    fn sever_link(&mut self, link: &Link) -> Result<bool, CollabError>;
    fn repair_link(&mut self, link: &Link) -> Result<(), CollabError>;
    /// Injects a recorded packet at a host's access-link interface.
    fn inject(
        &mut self,
        host_id: Option<&HostId>,
        iface: &str,
        packet_b64: &str,
    ) -> Result<(), CollabError>;
    /// Whether an in-flight packet with the fingerprint is buffered at
    /// the given switch port.
    fn buffered_dp_event(
        &self,
        fingerprint: &DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
    ) -> bool;
    fn drop_dp_event(
        &mut self,
        fingerprint: &DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
    ) -> Result<(), CollabError>;
    fn permit_dp_event(
        &mut self,
        fingerprint: &DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
    ) -> Result<(), CollabError>;
}

/// Contract of the simulated-switch operations.
pub trait SwitchOps: Send {
    fn crash_switch(&mut self, dpid: Dpid) -> Result<(), CollabError>;
    fn recover_switch(&mut self, dpid: Dpid) -> Result<(), CollabError>;
    fn migrate_host(
        &mut self,
        old_dpid: Dpid,
        old_port_no: PortNo,
        new_dpid: Dpid,
        new_port_no: PortNo,
        host_id: &HostId,
    ) -> Result<(), CollabError>;
    fn ping(
        &mut self,
        src: &HostId,
        dst: &HostId,
    ) -> Result<bool, CollabError>;
}

/// The mutable world the replayer drives: the topology and trackers it
/// owns, the message gates, and the contracts of the external
/// collaborators.
///
/// All mutation is serialized through the replayer main loop;
/// background workers only enqueue observations.
pub struct Simulation {
    pub topology: TopologyGraph,
    pub connectivity: ConnectivityTracker,
    pub buffer: OpenFlowBuffer,
    pub flow_mod_gates: FlowModGates,
    pub sync: SyncChannel,
    pub violations: ViolationTracker,
    pub labels: LabelAllocator,
    pub invariants: InvariantRegistry,
    pub workers: WorkerPool,
    pub controllers: Box<dyn ControllerManager>,
    pub patch_panel: Box<dyn PatchPanel>,
    pub switch_ops: Box<dyn SwitchOps>,
    crashed_switches: BTreeSet<Dpid>,
    crashed_controllers: BTreeSet<ControllerId>,
    severed_links: BTreeSet<(String, String)>,
}

// ===== impl Simulation =====

impl Simulation {
    pub fn new(
        topology: TopologyGraph,
        connectivity: ConnectivityTracker,
        invariants: InvariantRegistry,
        controllers: Box<dyn ControllerManager>,
        patch_panel: Box<dyn PatchPanel>,
        switch_ops: Box<dyn SwitchOps>,
    ) -> Simulation {
        Simulation {
            topology,
            connectivity,
            buffer: OpenFlowBuffer::new(),
            flow_mod_gates: FlowModGates::new(),
            sync: SyncChannel::new(),
            violations: ViolationTracker::new(),
            labels: LabelAllocator::new(),
            invariants,
            workers: WorkerPool::new(),
            controllers,
            patch_panel,
            switch_ops,
            crashed_switches: Default::default(),
            crashed_controllers: Default::default(),
            severed_links: Default::default(),
        }
    }

    // Blocks a control channel end to end: the buffer defers releases
    // and the I/O worker suspends inbound forwarding.
    pub fn block_control_channel(&mut self, conn: &ConnectionId) {
        self.buffer.block(conn);
        self.workers.block(conn);
    }

    pub fn unblock_control_channel(&mut self, conn: &ConnectionId) {
        self.buffer.unblock(conn);
        self.workers.unblock(conn);
    }

    pub fn mark_switch_crashed(&mut self, dpid: Dpid) {
        self.crashed_switches.insert(dpid);
    }

    pub fn mark_switch_recovered(&mut self, dpid: Dpid) {
        self.crashed_switches.remove(&dpid);
    }

    pub fn switch_is_crashed(&self, dpid: Dpid) -> bool {
        self.crashed_switches.contains(&dpid)
    }

    pub fn mark_controller_crashed(&mut self, cid: &ControllerId) {
        self.crashed_controllers.insert(cid.clone());
    }

    pub fn mark_controller_recovered(&mut self, cid: &ControllerId) {
        self.crashed_controllers.remove(cid);
    }

    pub fn crashed_controllers(&self) -> &BTreeSet<ControllerId> {
        &self.crashed_controllers
    }

    pub fn mark_link_severed(&mut self, link: &Link) {
        self.severed_links.insert(link_key(link));
    }

    pub fn mark_link_repaired(&mut self, link: &Link) {
        self.severed_links.remove(&link_key(link));
    }

    pub fn link_is_severed(&self, link: &Link) -> bool {
        self.severed_links.contains(&link_key(link))
    }
}

// ===== helper functions =====

// Orientation-independent identity of a link, for the severed-links
// ledger.
fn link_key(link: &Link) -> (String, String) {
    let a = link.src.to_string();
    let b = link.dst.to_string();
    if a <= b { (a, b) } else { (b, a) }
}

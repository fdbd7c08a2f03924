//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_events::input::IntentSpec;
use rewind_replay::error::CollabError;
use rewind_replay::simulation::{ControllerManager, PatchPanel, SwitchOps};
use rewind_topology::Link;
use rewind_utils::fingerprint::DpFingerprint;
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use tracing::debug;

/// Detached collaborator backends: every operation is logged and
/// succeeds without touching any real process or dataplane.
///
/// Deployments wire the real controller manager, patch panel, and
/// switch backends in their place; detached mode lets a trace be
/// dry-run end to end (timeouts and all) without external processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Detached;

// ===== impl Detached =====

impl ControllerManager for Detached {
    fn connect_to_controllers(&mut self) -> Result<(), CollabError> {
        debug!("detached: connect to controllers");
        Ok(())
    }

    fn crash_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError> {
        debug!(%cid, "detached: crash controller");
        Ok(())
    }

    fn recover_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError> {
        debug!(%cid, "detached: recover controller");
        Ok(())
    }

    fn block_peers(
        &mut self,
        cid1: &ControllerId,
        cid2: &ControllerId,
    ) -> Result<(), CollabError> {
        debug!(%cid1, %cid2, "detached: block controller pair");
        Ok(())
    }

    fn unblock_peers(
        &mut self,
        cid1: &ControllerId,
        cid2: &ControllerId,
    ) -> Result<(), CollabError> {
        debug!(%cid1, %cid2, "detached: unblock controller pair");
        Ok(())
    }

    fn add_intent(
        &mut self,
        cid: &ControllerId,
        intent: &IntentSpec,
    ) -> Result<bool, CollabError> {
        debug!(%cid, intent_id = %intent.intent_id, "detached: add intent");
        Ok(true)
    }

    fn remove_intent(
        &mut self,
        cid: &ControllerId,
        intent_id: &str,
    ) -> Result<bool, CollabError> {
        debug!(%cid, %intent_id, "detached: remove intent");
        Ok(true)
    }

    fn send_link_notification(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError> {
        debug!(%cid, "detached: link notification");
        Ok(())
    }
}

impl PatchPanel for Detached {
    fn sever_link(&mut self, link: &Link) -> Result<bool, CollabError> {
        debug!(%link, "detached: sever link");
        Ok(true)
    }

    fn repair_link(&mut self, link: &Link) -> Result<(), CollabError> {
        debug!(%link, "detached: repair link");
        Ok(())
    }

    fn inject(
        &mut self,
        host_id: Option<&HostId>,
        iface: &str,
        _packet_b64: &str,
    ) -> Result<(), CollabError> {
        debug!(host = ?host_id, %iface, "detached: inject packet");
        Ok(())
    }

    fn buffered_dp_event(
        &self,
        _fingerprint: &DpFingerprint,
        _dpid: Dpid,
        _port_no: PortNo,
    ) -> bool {
        false
    }

    fn drop_dp_event(
        &mut self,
        _fingerprint: &DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
    ) -> Result<(), CollabError> {
        debug!(%dpid, %port_no, "detached: drop dataplane packet");
        Ok(())
    }

    fn permit_dp_event(
        &mut self,
        _fingerprint: &DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
    ) -> Result<(), CollabError> {
        debug!(%dpid, %port_no, "detached: permit dataplane packet");
        Ok(())
    }
}

impl SwitchOps for Detached {
    fn crash_switch(&mut self, dpid: Dpid) -> Result<(), CollabError> {
        debug!(%dpid, "detached: crash switch");
        Ok(())
    }

    fn recover_switch(&mut self, dpid: Dpid) -> Result<(), CollabError> {
        debug!(%dpid, "detached: recover switch");
        Ok(())
    }

    fn migrate_host(
        &mut self,
        old_dpid: Dpid,
        old_port_no: PortNo,
        new_dpid: Dpid,
        new_port_no: PortNo,
        host_id: &HostId,
    ) -> Result<(), CollabError> {
        debug!(%host_id, %old_dpid, %old_port_no, %new_dpid, %new_port_no,
            "detached: migrate host");
        Ok(())
    }

    fn ping(
        &mut self,
        src: &HostId,
        dst: &HostId,
    ) -> Result<bool, CollabError> {
        debug!(%src, %dst, "detached: ping");
        Ok(true)
    }
}

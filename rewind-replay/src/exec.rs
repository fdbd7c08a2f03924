//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_events::input::{InputEvent, IntentSpec};
use rewind_events::internal::InternalEvent;
use rewind_events::Event;
use rewind_topology::graph::{port_node_id, switch_node_id};
use rewind_topology::{Link, Port};
use rewind_utils::ids::{Dpid, HostId, PortNo};
use tracing::{info, warn};

use crate::buffer::Pending;
use crate::error::{CollabError, Error};
use crate::pending::{ConnectionId, PendingReceive, PendingSend, PendingStateChange};
use crate::simulation::Simulation;

// Result of one proceed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The event took effect; the replayer may advance.
    Done,
    /// Not ready yet; retry until the event deadline.
    Retry,
    /// The event cannot take effect (e.g. it references a removed
    /// entity); mark it and advance.
    Failed,
}

// ===== global functions =====

// Executes a single logical round of an input event.
pub fn proceed_input(
    sim: &mut Simulation,
    event: &Event,
    input: &InputEvent,
    logical_round: i64,
) -> Result<Outcome, Error> {
    match input {
        InputEvent::ConnectToControllers => {
            Ok(collab_unit(sim.controllers.connect_to_controllers()))
        }
        InputEvent::SwitchFailure { dpid } => {
            if !sim.topology.has_switch(*dpid) {
                warn!(%dpid, "cannot fail unknown switch");
                return Ok(Outcome::Failed);
            }
            info!(%event, %dpid, "crashing switch");
            let outcome = collab_unit(sim.switch_ops.crash_switch(*dpid));
            if outcome == Outcome::Done {
                sim.mark_switch_crashed(*dpid);
            }
            Ok(outcome)
        }
        InputEvent::SwitchRecovery { dpid } => {
            if !sim.topology.has_switch(*dpid) {
                warn!(%dpid, "cannot recover unknown switch");
                return Ok(Outcome::Failed);
            }
            info!(%event, %dpid, "recovering switch");
            let outcome = collab_unit(sim.switch_ops.recover_switch(*dpid));
            if outcome == Outcome::Done {
                sim.mark_switch_recovered(*dpid);
            }
            Ok(outcome)
        }
        InputEvent::LinkFailure {
            start_dpid,
            start_port_no,
            end_dpid,
            end_port_no,
        } => {
            let Some(link) = find_switch_link(
                sim,
                *start_dpid,
                *start_port_no,
                *end_dpid,
                *end_port_no,
            )?
            else {
                return Ok(Outcome::Failed);
            };
            info!(%event, %link, "severing link");
            match sim.patch_panel.sever_link(&link) {
                Ok(true) => {
                    sim.mark_link_severed(&link);
                    Ok(Outcome::Done)
                }
                Ok(false) => Ok(Outcome::Retry),
                Err(error) => Ok(collab_failed(error)),
            }
        }
        InputEvent::LinkRecovery {
            start_dpid,
            start_port_no,
            end_dpid,
            end_port_no,
        } => {
            let Some(link) = find_switch_link(
                sim,
                *start_dpid,
                *start_port_no,
                *end_dpid,
                *end_port_no,
            )?
            else {
                return Ok(Outcome::Failed);
            };
            info!(%event, %link, "repairing link");
            let outcome = collab_unit(sim.patch_panel.repair_link(&link));
            if outcome == Outcome::Done {
                sim.mark_link_repaired(&link);
            }
            Ok(outcome)
        }
        InputEvent::ControllerFailure { controller_id } => {
            info!(%event, %controller_id, "crashing controller");
            let outcome =
                collab_unit(sim.controllers.crash_controller(controller_id));
            if outcome == Outcome::Done {
                sim.mark_controller_crashed(controller_id);
            }
            Ok(outcome)
        }
        InputEvent::ControllerRecovery { controller_id } => {
            info!(%event, %controller_id, "recovering controller");
            let outcome = collab_unit(
                sim.controllers.recover_controller(controller_id),
            );
            if outcome == Outcome::Done {
                sim.mark_controller_recovered(controller_id);
            }
            Ok(outcome)
        }
        InputEvent::HostMigration {
            old_ingress_dpid,
            old_ingress_port_no,
            new_ingress_dpid,
            new_ingress_port_no,
            host_id,
        } => {
            let outcome = collab_unit(sim.switch_ops.migrate_host(
                *old_ingress_dpid,
                *old_ingress_port_no,
                *new_ingress_dpid,
                *new_ingress_port_no,
                host_id,
            ));
            if outcome != Outcome::Done {
                return Ok(outcome);
            }
            migrate_host_topology(
                sim,
                *old_ingress_dpid,
                *old_ingress_port_no,
                *new_ingress_dpid,
                *new_ingress_port_no,
                host_id,
            )
        }
        InputEvent::TrafficInjection { dp_event, host_id } => {
            let Some(dp_event) = dp_event else {
                warn!(%event, "no dataplane event recorded");
                return Ok(Outcome::Failed);
            };
            Ok(collab_unit(sim.patch_panel.inject(
                host_id.as_ref(),
                &dp_event.interface.name,
                &dp_event.packet,
            )))
        }
        // WaitTime is a replayer suspension point, not an execution.
        InputEvent::WaitTime { .. } => Ok(Outcome::Done),
        InputEvent::CheckInvariants { invariant_name } => {
            let Some(check) = sim.invariants.get(invariant_name) else {
                // Decode already validated the name; stay defensive.
                warn!(%invariant_name, "invariant check disappeared");
                return Ok(Outcome::Failed);
            };
            let violations = check(sim);
            if violations.is_empty() {
                info!(%invariant_name, "no correctness violations");
            } else {
                warn!(%invariant_name, ?violations,
                    "correctness violations detected");
            }
            sim.violations.track(&violations, logical_round);
            Ok(Outcome::Done)
        }
        InputEvent::ControlChannelBlock {
            dpid,
            controller_id,
        } => {
            if !sim.topology.has_switch(*dpid) {
                return Ok(Outcome::Failed);
            }
            // Blocking an already-blocked channel succeeds.
            let conn = ConnectionId::new(*dpid, controller_id.clone());
            sim.block_control_channel(&conn);
            Ok(Outcome::Done)
        }
        InputEvent::ControlChannelUnblock {
            dpid,
            controller_id,
        } => {
            if !sim.topology.has_switch(*dpid) {
                return Ok(Outcome::Failed);
            }
            let conn = ConnectionId::new(*dpid, controller_id.clone());
            sim.unblock_control_channel(&conn);
            Ok(Outcome::Done)
        }
        InputEvent::DataplaneDrop {
            fingerprint,
            dpid,
            port_no,
            passive,
            ..
        } => {
            // Passive drops are handled by the recorder-side dataplane
            // checker and always succeed here.
            if *passive {
                return Ok(Outcome::Done);
            }
            if !sim.patch_panel.buffered_dp_event(fingerprint, *dpid, *port_no)
            {
                return Ok(Outcome::Retry);
            }
            Ok(collab_unit(sim.patch_panel.drop_dp_event(
                fingerprint,
                *dpid,
                *port_no,
            )))
        }
        InputEvent::BlockControllerPair { cid1, cid2 } => {
            Ok(collab_unit(sim.controllers.block_peers(cid1, cid2)))
        }
        InputEvent::UnblockControllerPair { cid1, cid2 } => {
            Ok(collab_unit(sim.controllers.unblock_peers(cid1, cid2)))
        }
        InputEvent::LinkDiscovery { controller_id, .. } => Ok(collab_unit(
            sim.controllers.send_link_notification(controller_id),
        )),
        InputEvent::AddIntent(intent) => {
            info!(%event, intent_id = %intent.intent_id, "adding intent");
            match sim.controllers.add_intent(&intent.cid, intent) {
                Ok(false) => Ok(Outcome::Retry),
                Err(error) => Ok(collab_failed(error)),
                Ok(true) => {
                    track_intent_connectivity(sim, intent);
                    Ok(Outcome::Done)
                }
            }
        }
        InputEvent::RemoveIntent { cid, intent_id, .. } => {
            info!(%event, %intent_id, "removing intent");
            match sim.controllers.remove_intent(cid, intent_id) {
                Ok(false) => Ok(Outcome::Retry),
                Err(error) => Ok(collab_failed(error)),
                Ok(true) => {
                    sim.connectivity
                        .remove_policy(&intent_id.as_str().into());
                    Ok(Outcome::Done)
                }
            }
        }
        InputEvent::PingEvent {
            src_host_id,
            dst_host_id,
        } => match sim.switch_ops.ping(src_host_id, dst_host_id) {
            Ok(true) => Ok(Outcome::Done),
            Ok(false) => Ok(Outcome::Retry),
            Err(error) => Ok(collab_failed(error)),
        },
        InputEvent::NopInput => Ok(Outcome::Done),
    }
}

// Executes a single logical round of an internal event: check whether
// the matching observation arrived and release it.
pub fn proceed_internal(
    sim: &mut Simulation,
    event: &Event,
    internal: &InternalEvent,
) -> Result<Outcome, Error> {
    match internal {
        InternalEvent::ControlMessageSend(msg) => {
            let pending = PendingSend::new(
                msg.dpid,
                msg.controller_id.clone(),
                msg.fingerprint.clone(),
            );
            if !sim.buffer.message_send_waiting(&pending) {
                return Ok(Outcome::Retry);
            }
            sim.buffer.schedule(&Pending::Send(pending))?;
            Ok(Outcome::Done)
        }
        InternalEvent::ControlMessageReceive(msg) => {
            let pending = PendingReceive::new(
                msg.dpid,
                msg.controller_id.clone(),
                msg.fingerprint.clone(),
            );
            if !sim.buffer.message_receipt_waiting(&pending) {
                return Ok(Outcome::Retry);
            }
            sim.buffer.schedule(&Pending::Receive(pending))?;
            Ok(Outcome::Done)
        }
        InternalEvent::ProcessFlowMod(msg) => {
            let pending = PendingReceive::new(
                msg.dpid,
                msg.controller_id.clone(),
                msg.fingerprint.clone(),
            );
            if !sim.flow_mod_gates.message_receipt_waiting(&pending) {
                return Ok(Outcome::Retry);
            }
            sim.flow_mod_gates.schedule(&pending)?;
            Ok(Outcome::Done)
        }
        InternalEvent::ControllerStateChange {
            controller_id,
            inner_fingerprint,
            name,
            value,
        } => {
            let pending = PendingStateChange::new(
                controller_id.clone(),
                event.event_time,
                inner_fingerprint.clone(),
                name.clone(),
                value.clone(),
            );
            if !sim.sync.state_change_pending(&pending) {
                return Ok(Outcome::Retry);
            }
            sim.sync.ack_pending_state_change(&pending)?;
            Ok(Outcome::Done)
        }
        InternalEvent::DeterministicValue {
            controller_id,
            value,
            ..
        } => {
            if !sim.sync.pending_deterministic_value_request(controller_id) {
                return Ok(Outcome::Retry);
            }
            sim.sync
                .send_deterministic_value(controller_id, value.clone())?;
            Ok(Outcome::Done)
        }
        InternalEvent::DataplanePermit {
            fingerprint,
            dpid,
            port_no,
            passive,
        } => {
            if *passive {
                return Ok(Outcome::Done);
            }
            if !sim.patch_panel.buffered_dp_event(fingerprint, *dpid, *port_no)
            {
                return Ok(Outcome::Retry);
            }
            Ok(collab_unit(sim.patch_panel.permit_dp_event(
                fingerprint,
                *dpid,
                *port_no,
            )))
        }
    }
}

// ===== helper functions =====

fn collab_unit(result: Result<(), CollabError>) -> Outcome {
    match result {
        Ok(()) => Outcome::Done,
        Err(error) => collab_failed(error),
    }
}

// Maps a collaborator error to the event outcome: unknown entities
// fail the event, transient conditions retry.
fn collab_failed(error: CollabError) -> Outcome {
    error.log();
    match error {
        CollabError::UnknownEntity(..) => Outcome::Failed,
        CollabError::Timeout(..) | CollabError::Io(..) => Outcome::Retry,
    }
}

// Looks up the topology link between two switch ports. A non-LINK edge
// between the endpoints is a fatal data-model breach.
fn find_switch_link(
    sim: &Simulation,
    start_dpid: Dpid,
    start_port_no: PortNo,
    end_dpid: Dpid,
    end_port_no: PortNo,
) -> Result<Option<Link>, Error> {
    let (Some(start), Some(end)) = (
        sim.topology.get_switch(start_dpid),
        sim.topology.get_switch(end_dpid),
    ) else {
        warn!(%start_dpid, %end_dpid, "link references unknown switch");
        return Ok(None);
    };
    let (Some(start_port), Some(end_port)) = (
        start.ports.get(&start_port_no),
        end.ports.get(&end_port_no),
    ) else {
        warn!(%start_dpid, %end_dpid, "link references unknown port");
        return Ok(None);
    };
    let node1 = port_node_id(&switch_node_id(start), start_port);
    let node2 = port_node_id(&switch_node_id(end), end_port);
    match sim.topology.get_link(&node1, &node2) {
        Ok(Some(link)) => Ok(Some(link.clone())),
        Ok(None) => {
            warn!(%node1, %node2, "no link between ports");
            Ok(None)
        }
        Err(error) => {
            error.log();
            Err(error.into())
        }
    }
}

// Moves the host's access link in the topology: the old ingress port
// goes away, a fresh virtual port appears on the new switch.
fn migrate_host_topology(
    sim: &mut Simulation,
    old_dpid: Dpid,
    old_port_no: PortNo,
    new_dpid: Dpid,
    new_port_no: PortNo,
    host_id: &HostId,
) -> Result<Outcome, Error> {
    let Some(host) = sim.topology.get_host(host_id).cloned() else {
        warn!(%host_id, "cannot migrate unknown host");
        return Ok(Outcome::Failed);
    };
    let Some(iface) = host.interfaces.first().cloned() else {
        warn!(%host_id, "host has no interfaces");
        return Ok(Outcome::Failed);
    };
    if sim.topology.get_switch(new_dpid).is_none() {
        warn!(%new_dpid, "cannot migrate host to unknown switch");
        return Ok(Outcome::Failed);
    }

    // Take down the old ingress port (links cascade away with it).
    if sim.topology.get_switch(old_dpid).is_some()
        && let Err(error) = sim.topology.remove_port(old_dpid, old_port_no)
    {
        error.log();
    }

    // Create the new virtual ingress port if it doesn't exist yet.
    let new_switch = sim.topology.get_switch(new_dpid).unwrap().clone();
    if !new_switch.ports.contains_key(&new_port_no) {
        let port = Port::new(
            new_port_no,
            format!("{}-{}", new_switch.name, new_port_no),
            Default::default(),
        );
        sim.topology.add_port(new_dpid, port)?;
    }
    let new_switch = sim.topology.get_switch(new_dpid).unwrap().clone();
    let access = Link::access(&host, &iface, &new_switch, new_port_no);
    sim.topology.add_link(access, true)?;
    Ok(Outcome::Done)
}

// Feeds an accepted intent into the connectivity tracker, resolving
// the endpoint hosts by interface MAC address.
fn track_intent_connectivity(sim: &mut Simulation, intent: &IntentSpec) {
    let mut src = None;
    let mut dst = None;
    for host in sim.topology.hosts() {
        for iface in &host.interfaces {
            if iface.hw_addr == intent.src_mac {
                src = Some((host.hid.clone(), iface.name.clone()));
            }
            if iface.hw_addr == intent.dst_mac {
                dst = Some((host.hid.clone(), iface.name.clone()));
            }
        }
    }
    let (Some((src_hid, src_iface)), Some((dst_hid, dst_iface))) = (src, dst)
    else {
        warn!(intent_id = %intent.intent_id,
            "intent endpoints match no host interface");
        return;
    };
    sim.connectivity.add_connected_hosts(
        &src_hid,
        &src_iface,
        &dst_hid,
        &dst_iface,
        intent.intent_id.as_str().into(),
    );
}

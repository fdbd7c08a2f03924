//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::fingerprint::{
    DpFingerprint, Fingerprint, FingerprintValue,
};
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use rewind_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

/// Events the replayer injects into the simulation.
#[derive(Clone, Debug)]
pub enum InputEvent {
    /// Logged at the beginning of the execution. Causes all switches to
    /// open TCP connections to their parent controller(s).
    ConnectToControllers,
    /// Crashes a switch, severing its TCP connection with the
    /// controller(s).
    SwitchFailure { dpid: Dpid },
    /// Recovers a crashed switch, reconnecting it to the controller(s).
    SwitchRecovery { dpid: Dpid },
    /// Cuts a link between switches. Packets forwarded over the link
    /// are dropped until a LinkRecovery occurs.
    LinkFailure {
        start_dpid: Dpid,
        start_port_no: PortNo,
        end_dpid: Dpid,
        end_port_no: PortNo,
    },
    /// Recovers a failed link between switches.
    LinkRecovery {
        start_dpid: Dpid,
        start_port_no: PortNo,
        end_dpid: Dpid,
        end_port_no: PortNo,
    },
    /// Kills a controller process.
    ControllerFailure { controller_id: ControllerId },
    /// Reboots a crashed controller with its original command line.
    ControllerRecovery { controller_id: ControllerId },
    /// Migrates a host to a new ingress switch and port.
    HostMigration {
        old_ingress_dpid: Dpid,
        old_ingress_port_no: PortNo,
        new_ingress_dpid: Dpid,
        new_ingress_port_no: PortNo,
        host_id: HostId,
    },
    /// Injects a dataplane packet at the given host's access link.
    TrafficInjection {
        dp_event: Option<DataplaneEvent>,
        host_id: Option<HostId>,
    },
    /// Pauses the simulation for the given number of seconds.
    /// Controller processes continue running during this time.
    WaitTime { wait_time: f64 },
    /// Runs the named invariant check before proceeding.
    CheckInvariants { invariant_name: String },
    /// Queues all messages on the switch<->controller connection until
    /// a ControlChannelUnblock occurs.
    ControlChannelBlock {
        dpid: Dpid,
        controller_id: ControllerId,
    },
    /// Lifts a ControlChannelBlock; queued messages are flushed.
    ControlChannelUnblock {
        dpid: Dpid,
        controller_id: ControllerId,
    },
    /// Removes an in-flight dataplane packet with the given fingerprint
    /// from the network.
    DataplaneDrop {
        fingerprint: DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
        host_id: Option<HostId>,
        /// Recorder-mode dependent: a passive drop is handled by the
        /// dataplane checker and always succeeds here.
        passive: bool,
    },
    /// Blocks connectivity between two controllers.
    BlockControllerPair {
        cid1: ControllerId,
        cid2: ControllerId,
    },
    /// Unblocks connectivity between two controllers.
    UnblockControllerPair {
        cid1: ControllerId,
        cid2: ControllerId,
    },
    /// Notifies a controller of a discovered link. Kept for old traces.
    LinkDiscovery {
        controller_id: ControllerId,
        link_attrs: Vec<FingerprintValue>,
    },
    /// Asks a controller to install a reachability intent.
    AddIntent(IntentSpec),
    /// Asks a controller to withdraw a previously installed intent.
    RemoveIntent {
        cid: ControllerId,
        intent_id: String,
        intent_ip: String,
        intent_port: i64,
        intent_url: String,
    },
    /// Pings between two hosts.
    PingEvent {
        src_host_id: HostId,
        dst_host_id: HostId,
    },
    /// Does nothing. Useful for fenceposting.
    NopInput,
}

/// Full description of a reachability intent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IntentSpec {
    pub cid: ControllerId,
    pub intent_id: String,
    pub src_dpid: String,
    pub dst_dpid: String,
    pub src_port: i64,
    pub dst_port: i64,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub static_path: bool,
    pub intent_type: String,
    pub intent_ip: String,
    pub intent_port: i64,
    pub intent_url: String,
}

/// A recorded dataplane packet and the access-link interface it entered
/// the network through.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DataplaneEvent {
    pub interface: InterfaceSpec,
    /// Base64 encoded packet contents.
    pub packet: String,
}

// Identity of a host interface as recorded in the trace.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceSpec {
    pub name: String,
    pub hw_addr: MacAddr,
    #[serde(default)]
    pub ips: Vec<String>,
}

// ===== impl InputEvent =====

impl InputEvent {
    pub fn class_tag(&self) -> &'static str {
        match self {
            InputEvent::ConnectToControllers => "ConnectToControllers",
            InputEvent::SwitchFailure { .. } => "SwitchFailure",
            InputEvent::SwitchRecovery { .. } => "SwitchRecovery",
            InputEvent::LinkFailure { .. } => "LinkFailure",
            InputEvent::LinkRecovery { .. } => "LinkRecovery",
            InputEvent::ControllerFailure { .. } => "ControllerFailure",
            InputEvent::ControllerRecovery { .. } => "ControllerRecovery",
            InputEvent::HostMigration { .. } => "HostMigration",
            InputEvent::TrafficInjection { .. } => "TrafficInjection",
            InputEvent::WaitTime { .. } => "WaitTime",
            InputEvent::CheckInvariants { .. } => "CheckInvariants",
            InputEvent::ControlChannelBlock { .. } => "ControlChannelBlock",
            InputEvent::ControlChannelUnblock { .. } => {
                "ControlChannelUnblock"
            }
            InputEvent::DataplaneDrop { .. } => "DataplaneDrop",
            InputEvent::BlockControllerPair { .. } => "BlockControllerPair",
            InputEvent::UnblockControllerPair { .. } => {
                "UnblockControllerPair"
            }
            InputEvent::LinkDiscovery { .. } => "LinkDiscovery",
            InputEvent::AddIntent(..) => "AddIntent",
            InputEvent::RemoveIntent { .. } => "RemoveIntent",
            InputEvent::PingEvent { .. } => "PingEvent",
            InputEvent::NopInput => "NOPInput",
        }
    }

    // Whether the trace pruner may drop this event by default.
    pub fn prunable_default(&self) -> bool {
        !matches!(self, InputEvent::ConnectToControllers)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let tag = self.class_tag();
        match self {
            InputEvent::ConnectToControllers
            | InputEvent::WaitTime { .. }
            | InputEvent::CheckInvariants { .. }
            | InputEvent::NopInput => Fingerprint::tagged(tag, []),
            InputEvent::SwitchFailure { dpid }
            | InputEvent::SwitchRecovery { dpid } => {
                Fingerprint::tagged(tag, [dpid.0.into()])
            }
            InputEvent::LinkFailure {
                start_dpid,
                start_port_no,
                end_dpid,
                end_port_no,
            }
            | InputEvent::LinkRecovery {
                start_dpid,
                start_port_no,
                end_dpid,
                end_port_no,
            } => Fingerprint::tagged(
                tag,
                [
                    start_dpid.0.into(),
                    start_port_no.0.into(),
                    end_dpid.0.into(),
                    end_port_no.0.into(),
                ],
            ),
            InputEvent::ControllerFailure { controller_id }
            | InputEvent::ControllerRecovery { controller_id } => {
                Fingerprint::tagged(tag, [controller_id.as_str().into()])
            }
            InputEvent::HostMigration {
                old_ingress_dpid,
                old_ingress_port_no,
                new_ingress_dpid,
                new_ingress_port_no,
                host_id,
            } => Fingerprint::tagged(
                tag,
                [
                    old_ingress_dpid.0.into(),
                    old_ingress_port_no.0.into(),
                    new_ingress_dpid.0.into(),
                    new_ingress_port_no.0.into(),
                    host_id.as_str().into(),
                ],
            ),
            InputEvent::TrafficInjection { dp_event, host_id } => {
                let dp_event = match dp_event {
                    Some(dp_event) => dp_event.fingerprint_value(),
                    None => FingerprintValue::Null,
                };
                let host_id = match host_id {
                    Some(host_id) => host_id.as_str().into(),
                    None => FingerprintValue::Null,
                };
                Fingerprint::tagged(tag, [dp_event, host_id])
            }
            InputEvent::ControlChannelBlock {
                dpid,
                controller_id,
            }
            | InputEvent::ControlChannelUnblock {
                dpid,
                controller_id,
            } => Fingerprint::tagged(
                tag,
                [dpid.0.into(), controller_id.as_str().into()],
            ),
            InputEvent::DataplaneDrop {
                fingerprint,
                dpid,
                port_no,
                ..
            } => Fingerprint::tagged(
                tag,
                [
                    FingerprintValue::Dp(*fingerprint),
                    dpid.0.into(),
                    port_no.0.into(),
                ],
            ),
            InputEvent::BlockControllerPair { cid1, cid2 }
            | InputEvent::UnblockControllerPair { cid1, cid2 } => {
                Fingerprint::tagged(
                    tag,
                    [cid1.as_str().into(), cid2.as_str().into()],
                )
            }
            InputEvent::LinkDiscovery {
                controller_id,
                link_attrs,
            } => Fingerprint::tagged(
                tag,
                [
                    controller_id.as_str().into(),
                    FingerprintValue::List(link_attrs.clone()),
                ],
            ),
            InputEvent::AddIntent(intent) => Fingerprint::tagged(
                tag,
                [
                    intent.cid.as_str().into(),
                    intent.intent_id.as_str().into(),
                    intent.src_dpid.as_str().into(),
                    intent.dst_dpid.as_str().into(),
                    intent.src_port.into(),
                    intent.dst_port.into(),
                    intent.src_mac.to_string().into(),
                    intent.dst_mac.to_string().into(),
                    intent.static_path.into(),
                    intent.intent_type.as_str().into(),
                    intent.intent_ip.as_str().into(),
                    intent.intent_port.into(),
                    intent.intent_url.as_str().into(),
                ],
            ),
            InputEvent::RemoveIntent {
                cid,
                intent_id,
                intent_ip,
                intent_port,
                intent_url,
            } => Fingerprint::tagged(
                tag,
                [
                    cid.as_str().into(),
                    intent_id.as_str().into(),
                    intent_ip.as_str().into(),
                    (*intent_port).into(),
                    intent_url.as_str().into(),
                ],
            ),
            InputEvent::PingEvent {
                src_host_id,
                dst_host_id,
            } => Fingerprint::tagged(
                tag,
                [src_host_id.as_str().into(), dst_host_id.as_str().into()],
            ),
        }
    }
}

// ===== impl DataplaneEvent =====

impl DataplaneEvent {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap()
    }

    // The canonical-object form embedded in traffic-injection
    // fingerprints.
    pub fn fingerprint_value(&self) -> FingerprintValue {
        FingerprintValue::from_object(&self.to_value())
    }
}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::fingerprint::{
    DpFingerprint, Fingerprint, FingerprintValue, OfFingerprint,
};
use rewind_utils::ids::{ControllerId, Dpid, PortNo};
use rewind_utils::openflow::OfMessage;
use rewind_utils::time::SyncTime;
use serde_json::{Value, json};

/// Events observed happening inside the controllers under test. The
/// replayer verifies that a matching observation has occurred before it
/// moves past one of these.
#[derive(Clone, Debug)]
pub enum InternalEvent {
    /// A switch was allowed to send an OpenFlow message to a
    /// controller.
    ControlMessageSend(ControlMessage),
    /// A switch was allowed to receive an OpenFlow message from a
    /// controller.
    ControlMessageReceive(ControlMessage),
    /// A switch was allowed to apply a buffered flow_mod to its flow
    /// table.
    ProcessFlowMod(ControlMessage),
    /// A visible state change inside a controller (e.g. mastership
    /// change), obtained via the sync protocol.
    ControllerStateChange {
        controller_id: ControllerId,
        /// The format string passed to the controller's logging
        /// library, without interpolated values.
        inner_fingerprint: FingerprintValue,
        name: String,
        value: SyncValue,
    },
    /// A controller asked the harness for a deterministic value (e.g.
    /// gettimeofday).
    DeterministicValue {
        controller_id: ControllerId,
        name: String,
        value: SyncValue,
    },
    /// A dataplane packet was permitted to move between two ports.
    DataplanePermit {
        fingerprint: DpFingerprint,
        dpid: Dpid,
        port_no: PortNo,
        /// Recorder-mode dependent: a passive permit is handled by the
        /// dataplane checker and is always whitelisted.
        passive: bool,
    },
}

/// A gated OpenFlow message on one switch<->controller connection.
#[derive(Clone, Debug)]
pub struct ControlMessage {
    pub dpid: Dpid,
    pub controller_id: ControllerId,
    pub fingerprint: OfFingerprint,
    /// Base64 encoded packed OpenFlow message.
    pub b64_packet: String,
}

/// A value traveling over the controller sync channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Time(SyncTime),
    List(Vec<SyncValue>),
}

// ===== impl InternalEvent =====

impl InternalEvent {
    pub fn class_tag(&self) -> &'static str {
        match self {
            InternalEvent::ControlMessageSend(..) => "ControlMessageSend",
            InternalEvent::ControlMessageReceive(..) => {
                "ControlMessageReceive"
            }
            InternalEvent::ProcessFlowMod(..) => "ProcessFlowMod",
            InternalEvent::ControllerStateChange { .. } => {
                "ControllerStateChange"
            }
            InternalEvent::DeterministicValue { .. } => "DeterministicValue",
            InternalEvent::DataplanePermit { .. } => "DataplanePermit",
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let tag = self.class_tag();
        match self {
            InternalEvent::ControlMessageSend(msg)
            | InternalEvent::ControlMessageReceive(msg)
            | InternalEvent::ProcessFlowMod(msg) => Fingerprint::tagged(
                tag,
                [
                    FingerprintValue::Of(msg.fingerprint.clone()),
                    msg.dpid.0.into(),
                    msg.controller_id.as_str().into(),
                ],
            ),
            InternalEvent::ControllerStateChange {
                controller_id,
                inner_fingerprint,
                ..
            } => Fingerprint::tagged(
                tag,
                [
                    inner_fingerprint.clone(),
                    controller_id.as_str().into(),
                ],
            ),
            InternalEvent::DeterministicValue { .. } => {
                Fingerprint::tagged(tag, [])
            }
            InternalEvent::DataplanePermit {
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
        }
    }
}

// ===== impl ControlMessage =====

impl ControlMessage {
    // Decodes the captured packet blob, if one was recorded.
    pub fn packet(&self) -> Option<OfMessage> {
        if self.b64_packet.is_empty() {
            return None;
        }
        OfMessage::from_base64(&self.b64_packet).ok()
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "s {} <-> c {} [{}]",
            self.dpid, self.controller_id, self.fingerprint
        )
    }
}

// ===== impl SyncValue =====

impl SyncValue {
    pub fn to_value(&self) -> Value {
        match self {
            SyncValue::Null => Value::Null,
            SyncValue::Bool(b) => Value::Bool(*b),
            SyncValue::Int(n) => json!(n),
            SyncValue::Str(s) => Value::String(s.clone()),
            SyncValue::Time(time) => json!([time.secs, time.usecs]),
            SyncValue::List(items) => {
                Value::Array(items.iter().map(SyncValue::to_value).collect())
            }
        }
    }

    // Decodes a recorded value; `gettimeofday` values are recognized as
    // timestamps so that replayed controllers get a typed SyncTime back.
    pub fn from_value(name: &str, value: &Value) -> Option<SyncValue> {
        if name == "gettimeofday"
            && let Ok(time) = serde_json::from_value::<SyncTime>(value.clone())
        {
            return Some(SyncValue::Time(time));
        }
        SyncValue::decode(value)
    }

    fn decode(value: &Value) -> Option<SyncValue> {
        match value {
            Value::Null => Some(SyncValue::Null),
            Value::Bool(b) => Some(SyncValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(SyncValue::Int),
            Value::String(s) => Some(SyncValue::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(SyncValue::decode)
                .collect::<Option<Vec<_>>>()
                .map(SyncValue::List),
            Value::Object(..) => None,
        }
    }
}

impl std::fmt::Display for SyncValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

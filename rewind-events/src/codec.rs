//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::fingerprint::{Fingerprint, FingerprintValue};
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use rewind_utils::label::{Label, LabelAllocator};
use rewind_utils::time::SyncTime;
use serde_json::{Map, Value, json};

use crate::error::DecodeError;
use crate::input::{DataplaneEvent, InputEvent, IntentSpec};
use crate::internal::{ControlMessage, InternalEvent, SyncValue};
use crate::{Event, EventKind, SpecialEvent};

/// Invariant check name used when an older trace omits the field.
pub const DFLT_INVARIANT_CHECK: &str = "check_connectivity";

/// View of the invariant-check registry needed at decode time: a
/// `CheckInvariants` naming an unknown check is refused while loading
/// the trace, not when the replay reaches it.
pub trait InvariantNames {
    fn contains_invariant(&self, name: &str) -> bool;
}

/// Decode-time context: the label allocator enforcing process-wide
/// label uniqueness and the registry of known invariant checks. Passed
/// explicitly so traces can be decoded concurrently without shared
/// state.
pub struct TraceContext<'a> {
    pub labels: &'a mut LabelAllocator,
    pub invariants: &'a dyn InvariantNames,
}

// ===== global functions =====

// Encodes an event into its trace JSON object.
pub fn encode(event: &Event) -> Value {
    let mut map = Map::new();
    map.insert("class".to_owned(), event.class_tag().into());
    map.insert("label".to_owned(), event.label.to_string().into());
    map.insert(
        "event_time".to_owned(),
        json!([event.event_time.secs, event.event_time.usecs]),
    );
    map.insert("logical_round".to_owned(), json!(event.logical_round));
    map.insert(
        "dependent_labels".to_owned(),
        Value::Array(
            event
                .dependent_labels
                .iter()
                .map(|label| label.to_string().into())
                .collect(),
        ),
    );
    map.insert("prunable".to_owned(), event.prunable.into());
    map.insert("timed_out".to_owned(), event.timed_out.into());
    if matches!(event.kind, EventKind::Internal(..))
        || matches!(event.kind, EventKind::Input(InputEvent::ConnectToControllers))
    {
        map.insert(
            "timeout_disallowed".to_owned(),
            event.timeout_disallowed.into(),
        );
    }
    map.insert("fingerprint".to_owned(), event.fingerprint().to_value());
    match &event.kind {
        EventKind::Input(input) => encode_input(input, &mut map),
        EventKind::Internal(internal) => encode_internal(internal, &mut map),
        EventKind::Special(special) => encode_special(special, &mut map),
    }
    Value::Object(map)
}

// Decodes an event from its trace JSON object, dispatching on the
// `class` tag. Unknown fields are tolerated; missing required fields
// are an error naming the field.
pub fn decode(
    value: &Value,
    ctx: &mut TraceContext<'_>,
) -> Result<Event, DecodeError> {
    let map = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let class = get_str(map, "class")?;
    let label = get_str(map, "label")?
        .parse::<Label>()
        .map_err(|_| DecodeError::InvalidField("label"))?;
    ctx.labels.register(label)?;
    let event_time: SyncTime =
        serde_json::from_value(get(map, "event_time")?.clone())
            .map_err(|_| DecodeError::InvalidField("event_time"))?;
    let logical_round = get_i64(map, "logical_round")?;
    let dependent_labels = match map.get("dependent_labels") {
        None => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(|s| s.parse::<Label>().ok())
                    .ok_or(DecodeError::InvalidField("dependent_labels"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(DecodeError::InvalidField("dependent_labels"));
        }
    };
    let timeout_disallowed =
        opt_bool(map, "timeout_disallowed")?.unwrap_or(false);
    let timed_out = opt_bool(map, "timed_out")?.unwrap_or(false);

    let kind = decode_kind(class, map, ctx)?;
    let prunable_default = match &kind {
        EventKind::Input(input) => input.prunable_default(),
        EventKind::Internal(..) => false,
        EventKind::Special(..) => true,
    };
    let prunable = opt_bool(map, "prunable")?.unwrap_or(prunable_default);

    Ok(Event {
        label,
        event_time,
        logical_round,
        dependent_labels,
        prunable,
        timeout_disallowed,
        timed_out,
        kind,
    })
}

// ===== helper functions =====

fn encode_input(input: &InputEvent, map: &mut Map<String, Value>) {
    match input {
        InputEvent::ConnectToControllers
        | InputEvent::NopInput => (),
        InputEvent::SwitchFailure { dpid }
        | InputEvent::SwitchRecovery { dpid } => {
            map.insert("dpid".to_owned(), json!(dpid.0));
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
        } => {
            map.insert("start_dpid".to_owned(), json!(start_dpid.0));
            map.insert("start_port_no".to_owned(), json!(start_port_no.0));
            map.insert("end_dpid".to_owned(), json!(end_dpid.0));
            map.insert("end_port_no".to_owned(), json!(end_port_no.0));
        }
        InputEvent::ControllerFailure { controller_id }
        | InputEvent::ControllerRecovery { controller_id } => {
            map.insert(
                "controller_id".to_owned(),
                controller_id.as_str().into(),
            );
        }
        InputEvent::HostMigration {
            old_ingress_dpid,
            old_ingress_port_no,
            new_ingress_dpid,
            new_ingress_port_no,
            host_id,
        } => {
            map.insert(
                "old_ingress_dpid".to_owned(),
                json!(old_ingress_dpid.0),
            );
            map.insert(
                "old_ingress_port_no".to_owned(),
                json!(old_ingress_port_no.0),
            );
            map.insert(
                "new_ingress_dpid".to_owned(),
                json!(new_ingress_dpid.0),
            );
            map.insert(
                "new_ingress_port_no".to_owned(),
                json!(new_ingress_port_no.0),
            );
            map.insert("host_id".to_owned(), host_id.as_str().into());
        }
        InputEvent::TrafficInjection { dp_event, host_id } => {
            if let Some(dp_event) = dp_event {
                map.insert("dp_event".to_owned(), dp_event.to_value());
            }
            if let Some(host_id) = host_id {
                map.insert("host_id".to_owned(), host_id.as_str().into());
            }
        }
        InputEvent::WaitTime { wait_time } => {
            map.insert("wait_time".to_owned(), json!(wait_time));
        }
        InputEvent::CheckInvariants { invariant_name } => {
            map.insert(
                "invariant_name".to_owned(),
                invariant_name.as_str().into(),
            );
            map.insert("invariant_check".to_owned(), Value::Null);
        }
        InputEvent::ControlChannelBlock {
            dpid,
            controller_id,
        }
        | InputEvent::ControlChannelUnblock {
            dpid,
            controller_id,
        } => {
            map.insert("dpid".to_owned(), json!(dpid.0));
            map.insert(
                "controller_id".to_owned(),
                controller_id.as_str().into(),
            );
        }
        InputEvent::DataplaneDrop {
            dpid,
            host_id,
            passive,
            ..
        } => {
            map.insert("dpid".to_owned(), json!(dpid.0));
            if let Some(host_id) = host_id {
                map.insert("host_id".to_owned(), host_id.as_str().into());
            }
            map.insert("passive".to_owned(), (*passive).into());
        }
        InputEvent::BlockControllerPair { cid1, cid2 }
        | InputEvent::UnblockControllerPair { cid1, cid2 } => {
            map.insert("cid1".to_owned(), cid1.as_str().into());
            map.insert("cid2".to_owned(), cid2.as_str().into());
        }
        InputEvent::LinkDiscovery {
            controller_id,
            link_attrs,
        } => {
            map.insert(
                "controller_id".to_owned(),
                controller_id.as_str().into(),
            );
            map.insert(
                "link_attrs".to_owned(),
                Value::Array(
                    link_attrs
                        .iter()
                        .map(FingerprintValue::to_value)
                        .collect(),
                ),
            );
        }
        InputEvent::AddIntent(intent) => {
            map.insert("request_type".to_owned(), "AddIntent".into());
            map.insert("cid".to_owned(), intent.cid.as_str().into());
            map.insert(
                "intent_id".to_owned(),
                intent.intent_id.as_str().into(),
            );
            map.insert("src_dpid".to_owned(), intent.src_dpid.as_str().into());
            map.insert("dst_dpid".to_owned(), intent.dst_dpid.as_str().into());
            map.insert("src_port".to_owned(), json!(intent.src_port));
            map.insert("dst_port".to_owned(), json!(intent.dst_port));
            map.insert(
                "src_mac".to_owned(),
                intent.src_mac.to_string().into(),
            );
            map.insert(
                "dst_mac".to_owned(),
                intent.dst_mac.to_string().into(),
            );
            map.insert("static_path".to_owned(), intent.static_path.into());
            map.insert(
                "intent_type".to_owned(),
                intent.intent_type.as_str().into(),
            );
            map.insert(
                "intent_ip".to_owned(),
                intent.intent_ip.as_str().into(),
            );
            map.insert("intent_port".to_owned(), json!(intent.intent_port));
            map.insert(
                "intent_url".to_owned(),
                intent.intent_url.as_str().into(),
            );
        }
        InputEvent::RemoveIntent {
            cid,
            intent_id,
            intent_ip,
            intent_port,
            intent_url,
        } => {
            map.insert("request_type".to_owned(), "RemoveIntent".into());
            map.insert("cid".to_owned(), cid.as_str().into());
            map.insert("intent_id".to_owned(), intent_id.as_str().into());
            map.insert("intent_ip".to_owned(), intent_ip.as_str().into());
            map.insert("intent_port".to_owned(), json!(intent_port));
            map.insert("intent_url".to_owned(), intent_url.as_str().into());
        }
        InputEvent::PingEvent {
            src_host_id,
            dst_host_id,
        } => {
            map.insert("src_host_id".to_owned(), src_host_id.as_str().into());
            map.insert("dst_host_id".to_owned(), dst_host_id.as_str().into());
        }
    }
}

fn encode_internal(internal: &InternalEvent, map: &mut Map<String, Value>) {
    match internal {
        InternalEvent::ControlMessageSend(msg)
        | InternalEvent::ControlMessageReceive(msg)
        | InternalEvent::ProcessFlowMod(msg) => {
            map.insert("dpid".to_owned(), json!(msg.dpid.0));
            map.insert(
                "controller_id".to_owned(),
                msg.controller_id.as_str().into(),
            );
            map.insert(
                "b64_packet".to_owned(),
                msg.b64_packet.as_str().into(),
            );
        }
        InternalEvent::ControllerStateChange {
            controller_id,
            name,
            value,
            ..
        } => {
            map.insert(
                "controller_id".to_owned(),
                controller_id.as_str().into(),
            );
            map.insert("name".to_owned(), name.as_str().into());
            map.insert("value".to_owned(), value.to_value());
        }
        InternalEvent::DeterministicValue {
            controller_id,
            name,
            value,
        } => {
            map.insert(
                "controller_id".to_owned(),
                controller_id.as_str().into(),
            );
            map.insert("name".to_owned(), name.as_str().into());
            map.insert("value".to_owned(), value.to_value());
        }
        InternalEvent::DataplanePermit { passive, .. } => {
            map.insert("passive".to_owned(), (*passive).into());
        }
    }
}

fn encode_special(special: &SpecialEvent, map: &mut Map<String, Value>) {
    match special {
        SpecialEvent::InvariantViolation {
            violations,
            persistent,
        } => {
            map.insert(
                "violations".to_owned(),
                Value::Array(
                    violations.iter().map(|v| v.as_str().into()).collect(),
                ),
            );
            map.insert("persistent".to_owned(), (*persistent).into());
        }
    }
}

fn decode_kind(
    class: &str,
    map: &Map<String, Value>,
    ctx: &mut TraceContext<'_>,
) -> Result<EventKind, DecodeError> {
    let kind = match class {
        "ConnectToControllers" => {
            EventKind::Input(InputEvent::ConnectToControllers)
        }
        "SwitchFailure" => EventKind::Input(InputEvent::SwitchFailure {
            dpid: get_dpid(map, "dpid")?,
        }),
        "SwitchRecovery" => EventKind::Input(InputEvent::SwitchRecovery {
            dpid: get_dpid(map, "dpid")?,
        }),
        "LinkFailure" => EventKind::Input(InputEvent::LinkFailure {
            start_dpid: get_dpid(map, "start_dpid")?,
            start_port_no: get_port(map, "start_port_no")?,
            end_dpid: get_dpid(map, "end_dpid")?,
            end_port_no: get_port(map, "end_port_no")?,
        }),
        "LinkRecovery" => EventKind::Input(InputEvent::LinkRecovery {
            start_dpid: get_dpid(map, "start_dpid")?,
            start_port_no: get_port(map, "start_port_no")?,
            end_dpid: get_dpid(map, "end_dpid")?,
            end_port_no: get_port(map, "end_port_no")?,
        }),
        "ControllerFailure" => {
            EventKind::Input(InputEvent::ControllerFailure {
                controller_id: get_controller_id(map, "controller_id")?,
            })
        }
        "ControllerRecovery" => {
            EventKind::Input(InputEvent::ControllerRecovery {
                controller_id: get_controller_id(map, "controller_id")?,
            })
        }
        "HostMigration" => EventKind::Input(InputEvent::HostMigration {
            old_ingress_dpid: get_dpid(map, "old_ingress_dpid")?,
            old_ingress_port_no: get_port(map, "old_ingress_port_no")?,
            new_ingress_dpid: get_dpid(map, "new_ingress_dpid")?,
            new_ingress_port_no: get_port(map, "new_ingress_port_no")?,
            host_id: get_host_id(map, "host_id")?,
        }),
        "TrafficInjection" => {
            let dp_event = match map.get("dp_event") {
                None | Some(Value::Null) => None,
                Some(value) => Some(
                    serde_json::from_value::<DataplaneEvent>(value.clone())
                        .map_err(|_| DecodeError::InvalidField("dp_event"))?,
                ),
            };
            let host_id = match map.get("host_id") {
                None | Some(Value::Null) => None,
                Some(_) => Some(get_host_id(map, "host_id")?),
            };
            EventKind::Input(InputEvent::TrafficInjection {
                dp_event,
                host_id,
            })
        }
        "WaitTime" => EventKind::Input(InputEvent::WaitTime {
            wait_time: get_f64(map, "wait_time")?,
        }),
        "CheckInvariants" => {
            // Marshalled function bodies from the legacy format are a
            // code-execution hazard and are refused outright.
            if let Some(legacy) = map.get("invariant_check")
                && !legacy.is_null()
            {
                return Err(DecodeError::LegacyInvariantCheck);
            }
            let invariant_name = match map.get("invariant_name") {
                None => DFLT_INVARIANT_CHECK.to_owned(),
                Some(value) => value
                    .as_str()
                    .ok_or(DecodeError::InvalidField("invariant_name"))?
                    .to_owned(),
            };
            if !ctx.invariants.contains_invariant(&invariant_name) {
                return Err(DecodeError::UnknownInvariant(invariant_name));
            }
            EventKind::Input(InputEvent::CheckInvariants { invariant_name })
        }
        "ControlChannelBlock" => {
            EventKind::Input(InputEvent::ControlChannelBlock {
                dpid: get_dpid(map, "dpid")?,
                controller_id: get_controller_id(map, "controller_id")?,
            })
        }
        "ControlChannelUnblock" => {
            EventKind::Input(InputEvent::ControlChannelUnblock {
                dpid: get_dpid(map, "dpid")?,
                controller_id: get_controller_id(map, "controller_id")?,
            })
        }
        "DataplaneDrop" => {
            let (fingerprint, dpid, port_no) = decode_dp_fingerprint(map)?;
            let host_id = match map.get("host_id") {
                None | Some(Value::Null) => None,
                Some(_) => Some(get_host_id(map, "host_id")?),
            };
            EventKind::Input(InputEvent::DataplaneDrop {
                fingerprint,
                dpid,
                port_no,
                host_id,
                passive: opt_bool(map, "passive")?.unwrap_or(true),
            })
        }
        "BlockControllerPair" => {
            EventKind::Input(InputEvent::BlockControllerPair {
                cid1: get_controller_id(map, "cid1")?,
                cid2: get_controller_id(map, "cid2")?,
            })
        }
        "UnblockControllerPair" => {
            EventKind::Input(InputEvent::UnblockControllerPair {
                cid1: get_controller_id(map, "cid1")?,
                cid2: get_controller_id(map, "cid2")?,
            })
        }
        "LinkDiscovery" => {
            let link_attrs = match get(map, "link_attrs")? {
                Value::Array(items) => items
                    .iter()
                    .map(FingerprintValue::from_value)
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err(DecodeError::InvalidField("link_attrs")),
            };
            EventKind::Input(InputEvent::LinkDiscovery {
                controller_id: get_controller_id(map, "controller_id")?,
                link_attrs,
            })
        }
        "AddIntent" => EventKind::Input(InputEvent::AddIntent(IntentSpec {
            cid: get_controller_id(map, "cid")?,
            intent_id: get_id_string(map, "intent_id")?,
            src_dpid: get_id_string(map, "src_dpid")?,
            dst_dpid: get_id_string(map, "dst_dpid")?,
            src_port: get_i64(map, "src_port")?,
            dst_port: get_i64(map, "dst_port")?,
            src_mac: get_mac(map, "src_mac")?,
            dst_mac: get_mac(map, "dst_mac")?,
            static_path: get_bool(map, "static_path")?,
            intent_type: get_id_string(map, "intent_type")?,
            intent_ip: get_id_string(map, "intent_ip")?,
            intent_port: get_i64(map, "intent_port")?,
            intent_url: get_id_string(map, "intent_url")?,
        })),
        "RemoveIntent" => EventKind::Input(InputEvent::RemoveIntent {
            cid: get_controller_id(map, "cid")?,
            intent_id: get_id_string(map, "intent_id")?,
            intent_ip: get_id_string(map, "intent_ip")?,
            intent_port: get_i64(map, "intent_port")?,
            intent_url: get_id_string(map, "intent_url")?,
        }),
        "PingEvent" => EventKind::Input(InputEvent::PingEvent {
            src_host_id: get_host_id(map, "src_host_id")?,
            dst_host_id: get_host_id(map, "dst_host_id")?,
        }),
        "NOPInput" => EventKind::Input(InputEvent::NopInput),
        "ControlMessageSend" => EventKind::Internal(
            InternalEvent::ControlMessageSend(decode_control_message(map)?),
        ),
        "ControlMessageReceive" => EventKind::Internal(
            InternalEvent::ControlMessageReceive(decode_control_message(map)?),
        ),
        "ProcessFlowMod" => EventKind::Internal(
            InternalEvent::ProcessFlowMod(decode_control_message(map)?),
        ),
        "ControllerStateChange" => {
            let inner_fingerprint = match get(map, "fingerprint")? {
                Value::String(s) => FingerprintValue::Str(s.clone()),
                value @ Value::Array(..) => {
                    let fingerprint = Fingerprint::from_value(value)?;
                    fingerprint
                        .values()
                        .get(1)
                        .cloned()
                        .ok_or(DecodeError::InvalidField("fingerprint"))?
                }
                _ => return Err(DecodeError::InvalidField("fingerprint")),
            };
            let name = get_str(map, "name")?.to_owned();
            let value = SyncValue::from_value(&name, get(map, "value")?)
                .ok_or(DecodeError::InvalidField("value"))?;
            EventKind::Internal(InternalEvent::ControllerStateChange {
                controller_id: get_controller_id(map, "controller_id")?,
                inner_fingerprint,
                name,
                value,
            })
        }
        "DeterministicValue" => {
            let name = get_str(map, "name")?.to_owned();
            let value = SyncValue::from_value(&name, get(map, "value")?)
                .ok_or(DecodeError::InvalidField("value"))?;
            EventKind::Internal(InternalEvent::DeterministicValue {
                controller_id: get_controller_id(map, "controller_id")?,
                name,
                value,
            })
        }
        "DataplanePermit" => {
            let (fingerprint, dpid, port_no) = decode_dp_fingerprint(map)?;
            EventKind::Internal(InternalEvent::DataplanePermit {
                fingerprint,
                dpid,
                port_no,
                passive: opt_bool(map, "passive")?.unwrap_or(true),
            })
        }
        "InvariantViolation" => {
            let violations = match get(map, "violations")? {
                // A single string is one violation, not a list of
                // single characters.
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_owned).ok_or(
                            DecodeError::InvalidField("violations"),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err(DecodeError::InvalidField("violations")),
            };
            EventKind::Special(SpecialEvent::InvariantViolation {
                violations,
                persistent: opt_bool(map, "persistent")?.unwrap_or(true),
            })
        }
        class => return Err(DecodeError::UnknownClass(class.to_owned())),
    };
    Ok(kind)
}

// Decodes the shared fields of a gated control-message event. The
// fingerprint field carries the tuple (class, OFFingerprint, dpid,
// controller id); a bare OFFingerprint object is accepted for
// compatibility with directly-recorded observations.
fn decode_control_message(
    map: &Map<String, Value>,
) -> Result<ControlMessage, DecodeError> {
    let dpid = get_dpid(map, "dpid")?;
    let controller_id = get_controller_id(map, "controller_id")?;
    let fingerprint = match get(map, "fingerprint")? {
        value @ Value::Array(..) => {
            let fingerprint = Fingerprint::from_value(value)?;
            fingerprint
                .values()
                .iter()
                .find_map(|value| match value {
                    FingerprintValue::Of(of) => Some(of.clone()),
                    _ => None,
                })
                .ok_or(DecodeError::InvalidField("fingerprint"))?
        }
        value @ Value::Object(..) => {
            match FingerprintValue::from_value(value)? {
                FingerprintValue::Of(of) => of,
                _ => return Err(DecodeError::InvalidField("fingerprint")),
            }
        }
        _ => return Err(DecodeError::InvalidField("fingerprint")),
    };
    let b64_packet = match map.get("b64_packet") {
        None => String::new(),
        Some(value) => value
            .as_str()
            .ok_or(DecodeError::InvalidField("b64_packet"))?
            .to_owned(),
    };
    Ok(ControlMessage {
        dpid,
        controller_id,
        fingerprint,
        b64_packet,
    })
}

// Decodes a dataplane event fingerprint tuple (class, DPFingerprint,
// dpid, port no); the class tag may be absent in older traces.
fn decode_dp_fingerprint(
    map: &Map<String, Value>,
) -> Result<(rewind_utils::fingerprint::DpFingerprint, Dpid, PortNo), DecodeError>
{
    let fingerprint = Fingerprint::from_value(get(map, "fingerprint")?)?;
    let values = fingerprint.values();
    let offset = match values.first() {
        Some(FingerprintValue::Str(..)) => 1,
        _ => 0,
    };
    let dp = match values.get(offset) {
        Some(FingerprintValue::Dp(dp)) => *dp,
        _ => return Err(DecodeError::InvalidField("fingerprint")),
    };
    let dpid = match values.get(offset + 1) {
        Some(FingerprintValue::Int(dpid)) if *dpid >= 0 => Dpid(*dpid as u64),
        _ => return Err(DecodeError::InvalidField("fingerprint")),
    };
    let port_no = match values.get(offset + 2) {
        Some(FingerprintValue::Int(port_no)) => u16::try_from(*port_no)
            .map(PortNo)
            .map_err(|_| DecodeError::InvalidField("fingerprint"))?,
        _ => return Err(DecodeError::InvalidField("fingerprint")),
    };
    Ok((dp, dpid, port_no))
}

fn get<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, DecodeError> {
    map.get(field).ok_or(DecodeError::MissingField(field))
}

fn get_str<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    get(map, field)?
        .as_str()
        .ok_or(DecodeError::InvalidField(field))
}

fn get_i64(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<i64, DecodeError> {
    get(map, field)?
        .as_i64()
        .ok_or(DecodeError::InvalidField(field))
}

fn get_f64(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<f64, DecodeError> {
    get(map, field)?
        .as_f64()
        .ok_or(DecodeError::InvalidField(field))
}

fn get_bool(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<bool, DecodeError> {
    get(map, field)?
        .as_bool()
        .ok_or(DecodeError::InvalidField(field))
}

fn opt_bool(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<bool>, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or(DecodeError::InvalidField(field)),
    }
}

fn get_dpid(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Dpid, DecodeError> {
    let value = get(map, field)?;
    match value {
        Value::Number(n) => {
            n.as_u64().map(Dpid).ok_or(DecodeError::InvalidField(field))
        }
        // Some recorders emit dpids as decimal strings.
        Value::String(s) => {
            s.parse().map_err(|_| DecodeError::InvalidField(field))
        }
        _ => Err(DecodeError::InvalidField(field)),
    }
}

fn get_port(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<PortNo, DecodeError> {
    get(map, field)?
        .as_u64()
        .and_then(|n| u16::try_from(n).ok())
        .map(PortNo)
        .ok_or(DecodeError::InvalidField(field))
}

// Accepts both string and bare-integer id forms.
fn get_id_string(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<String, DecodeError> {
    match get(map, field)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(DecodeError::InvalidField(field)),
    }
}

fn get_controller_id(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<ControllerId, DecodeError> {
    get_id_string(map, field).map(ControllerId::new)
}

fn get_host_id(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<HostId, DecodeError> {
    get_id_string(map, field).map(HostId::new)
}

fn get_mac(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<rewind_utils::mac_addr::MacAddr, DecodeError> {
    get_str(map, field)?
        .parse()
        .map_err(|_| DecodeError::InvalidField(field))
}

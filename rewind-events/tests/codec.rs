//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_events::codec::{self, InvariantNames, TraceContext};
use rewind_events::error::DecodeError;
use rewind_events::input::{
    DataplaneEvent, InputEvent, IntentSpec, InterfaceSpec,
};
use rewind_events::internal::{ControlMessage, InternalEvent, SyncValue};
use rewind_events::{Event, EventKind, SpecialEvent};
use rewind_utils::fingerprint::{
    DpFingerprint, FingerprintValue, OfFingerprint,
};
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use rewind_utils::label::LabelAllocator;
use rewind_utils::openflow::OfType;
use rewind_utils::time::SyncTime;

//
// Helper functions.
//

struct Registry;

impl InvariantNames for Registry {
    fn contains_invariant(&self, name: &str) -> bool {
        matches!(name, "check_connectivity" | "check_liveness")
    }
}

fn decode(value: &serde_json::Value) -> Result<Event, DecodeError> {
    let mut labels = LabelAllocator::new();
    let mut ctx = TraceContext {
        labels: &mut labels,
        invariants: &Registry,
    };
    codec::decode(value, &mut ctx)
}

fn assert_roundtrip(event: &Event) {
    let encoded = codec::encode(event);
    let decoded = decode(&encoded)
        .unwrap_or_else(|error| panic!("decode failed for {event}: {error}"));
    assert_eq!(&decoded, event, "event equality broken for {event}");
    assert_eq!(
        decoded.fingerprint(),
        event.fingerprint(),
        "fingerprint not preserved for {event}"
    );
    // The re-encoded form must be structurally identical.
    assert_eq!(codec::encode(&decoded), encoded);
}

fn control_message(dpid: u64, cid: &str) -> ControlMessage {
    ControlMessage {
        dpid: Dpid(dpid),
        controller_id: cid.into(),
        fingerprint: OfFingerprint::type_only(OfType::PacketIn),
        b64_packet: "AQoACAAAAAE=".to_owned(),
    }
}

fn sample_events() -> Vec<Event> {
    let labels = &mut LabelAllocator::new();
    let dp = DpFingerprint {
        dl_src: Some("00:00:00:00:00:01".parse().unwrap()),
        dl_dst: Some("00:00:00:00:00:02".parse().unwrap()),
        dl_type: Some(0x0800),
        nw_src: Some("10.0.0.1".parse().unwrap()),
        nw_dst: Some("10.0.0.2".parse().unwrap()),
        nw_proto: Some(6),
        tp_src: Some(80),
        tp_dst: Some(5000),
        ..Default::default()
    };
    vec![
        Event::input(labels, InputEvent::ConnectToControllers),
        Event::input(labels, InputEvent::SwitchFailure { dpid: Dpid(1) }),
        Event::input(labels, InputEvent::SwitchRecovery { dpid: Dpid(1) }),
        Event::input(
            labels,
            InputEvent::LinkFailure {
                start_dpid: Dpid(1),
                start_port_no: PortNo(1),
                end_dpid: Dpid(2),
                end_port_no: PortNo(1),
            },
        ),
        Event::input(
            labels,
            InputEvent::LinkRecovery {
                start_dpid: Dpid(1),
                start_port_no: PortNo(1),
                end_dpid: Dpid(2),
                end_port_no: PortNo(1),
            },
        ),
        Event::input(
            labels,
            InputEvent::ControllerFailure {
                controller_id: "c1".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::ControllerRecovery {
                controller_id: "c1".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::HostMigration {
                old_ingress_dpid: Dpid(1),
                old_ingress_port_no: PortNo(3),
                new_ingress_dpid: Dpid(2),
                new_ingress_port_no: PortNo(4),
                host_id: "h1".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::TrafficInjection {
                dp_event: Some(DataplaneEvent {
                    interface: InterfaceSpec {
                        name: "h1-eth0".to_owned(),
                        hw_addr: "00:00:00:00:00:01".parse().unwrap(),
                        ips: vec!["10.0.0.1".to_owned()],
                    },
                    packet: "3q2+7w==".to_owned(),
                }),
                host_id: Some("h1".into()),
            },
        ),
        Event::input(labels, InputEvent::WaitTime { wait_time: 0.5 }),
        Event::input(
            labels,
            InputEvent::CheckInvariants {
                invariant_name: "check_connectivity".to_owned(),
            },
        ),
        Event::input(
            labels,
            InputEvent::ControlChannelBlock {
                dpid: Dpid(1),
                controller_id: "c1".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::ControlChannelUnblock {
                dpid: Dpid(1),
                controller_id: "c1".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::DataplaneDrop {
                fingerprint: dp,
                dpid: Dpid(1),
                port_no: PortNo(2),
                host_id: Some("h1".into()),
                passive: true,
            },
        ),
        Event::input(
            labels,
            InputEvent::BlockControllerPair {
                cid1: "c1".into(),
                cid2: "c2".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::UnblockControllerPair {
                cid1: "c1".into(),
                cid2: "c2".into(),
            },
        ),
        Event::input(
            labels,
            InputEvent::LinkDiscovery {
                controller_id: "c1".into(),
                link_attrs: vec![
                    FingerprintValue::Int(1),
                    FingerprintValue::Int(1),
                    FingerprintValue::Int(2),
                    FingerprintValue::Int(1),
                ],
            },
        ),
        Event::input(
            labels,
            InputEvent::AddIntent(IntentSpec {
                cid: "c1".into(),
                intent_id: "17".to_owned(),
                src_dpid: "00:00:00:00:00:00:00:01".to_owned(),
                dst_dpid: "00:00:00:00:00:00:00:02".to_owned(),
                src_port: 1,
                dst_port: 1,
                src_mac: "00:00:00:00:00:01".parse().unwrap(),
                dst_mac: "00:00:00:00:00:02".parse().unwrap(),
                static_path: false,
                intent_type: "SHORTEST_PATH".to_owned(),
                intent_ip: "192.168.1.1".to_owned(),
                intent_port: 8080,
                intent_url: "/wm/onos/intents".to_owned(),
            }),
        ),
        Event::input(
            labels,
            InputEvent::RemoveIntent {
                cid: "c1".into(),
                intent_id: "17".to_owned(),
                intent_ip: "192.168.1.1".to_owned(),
                intent_port: 8080,
                intent_url: "/wm/onos/intents".to_owned(),
            },
        ),
        Event::input(
            labels,
            InputEvent::PingEvent {
                src_host_id: "h1".into(),
                dst_host_id: "h2".into(),
            },
        ),
        Event::input(labels, InputEvent::NopInput),
        Event::internal(
            labels,
            InternalEvent::ControlMessageSend(control_message(1, "c1")),
        ),
        Event::internal(
            labels,
            InternalEvent::ControlMessageReceive(control_message(1, "c1")),
        ),
        Event::internal(
            labels,
            InternalEvent::ProcessFlowMod(control_message(1, "c1")),
        ),
        Event::internal(
            labels,
            InternalEvent::ControllerStateChange {
                controller_id: "c1".into(),
                inner_fingerprint: FingerprintValue::Str(
                    "mastership changed to %s".to_owned(),
                ),
                name: "mastership changed to %s".to_owned(),
                value: SyncValue::List(vec![SyncValue::Str(
                    "MASTER".to_owned(),
                )]),
            },
        ),
        Event::internal(
            labels,
            InternalEvent::DeterministicValue {
                controller_id: "c1".into(),
                name: "gettimeofday".to_owned(),
                value: SyncValue::Time(SyncTime::new(42, 17)),
            },
        ),
        Event::internal(
            labels,
            InternalEvent::DataplanePermit {
                fingerprint: dp,
                dpid: Dpid(1),
                port_no: PortNo(2),
                passive: true,
            },
        ),
        Event::special(
            labels,
            SpecialEvent::InvariantViolation {
                violations: vec!["h1 cannot reach h2".to_owned()],
                persistent: false,
            },
        ),
    ]
}

//
// Tests.
//

#[test]
fn test_roundtrip_all_classes() {
    for event in sample_events() {
        assert_roundtrip(&event);
    }
}

#[test]
fn test_fingerprint_discrimination() {
    let mut fingerprints = vec![];
    for event in sample_events() {
        let fingerprint = event.fingerprint();
        assert!(
            !fingerprints.contains(&fingerprint),
            "fingerprint collision: {fingerprint}"
        );
        fingerprints.push(fingerprint);
    }
}

#[test]
fn test_link_failure_fingerprints() {
    let labels = &mut LabelAllocator::new();
    let mut fp = |sd, sp, ed, ep| {
        Event::input(
            labels,
            InputEvent::LinkFailure {
                start_dpid: Dpid(sd),
                start_port_no: PortNo(sp),
                end_dpid: Dpid(ed),
                end_port_no: PortNo(ep),
            },
        )
        .fingerprint()
    };
    let a = fp(1, 1, 2, 1);
    let b = fp(1, 1, 2, 2);
    // Differing ports must discriminate.
    assert_ne!(a, b);
    // Swapped endpoints must discriminate too.
    let swapped = fp(2, 1, 1, 1);
    assert_ne!(a, swapped);
    // Same endpoints, distinct events: same fingerprint.
    assert_eq!(a, fp(1, 1, 2, 1));
}

#[test]
fn test_event_equality_is_label_based() {
    let labels = &mut LabelAllocator::new();
    let event1 =
        Event::input(labels, InputEvent::SwitchFailure { dpid: Dpid(1) });
    let mut event2 = event1.clone();
    event2.timed_out = true;
    event2.logical_round = 99;
    assert_eq!(event1, event2);

    let event3 =
        Event::input(labels, InputEvent::SwitchFailure { dpid: Dpid(1) });
    assert_ne!(event1, event3);
}

#[test]
fn test_decode_defaults() {
    let value = serde_json::json!({
        "class": "ControlMessageSend",
        "label": "i1",
        "event_time": [100, 200],
        "logical_round": 3,
        "dpid": 1,
        "controller_id": "c1",
        "fingerprint": [
            "ControlMessageSend",
            {"class": "OFFingerprint", "type": "packet_in"},
            1,
            "c1"
        ],
        "unknown_future_field": {"ignored": true}
    });
    let event = decode(&value).unwrap();
    assert!(!event.prunable);
    assert!(!event.timeout_disallowed);
    assert!(!event.timed_out);
    let EventKind::Internal(InternalEvent::ControlMessageSend(msg)) =
        &event.kind
    else {
        panic!("wrong event kind");
    };
    assert_eq!(msg.fingerprint.msg_type, OfType::PacketIn);
    assert_eq!(msg.b64_packet, "");
}

#[test]
fn test_decode_missing_field() {
    let value = serde_json::json!({
        "class": "SwitchFailure",
        "label": "e1",
        "event_time": [0, 0],
        "logical_round": 0
    });
    assert!(matches!(
        decode(&value),
        Err(DecodeError::MissingField("dpid"))
    ));
}

#[test]
fn test_decode_unknown_class() {
    let value = serde_json::json!({
        "class": "TimeTravel",
        "label": "e1",
        "event_time": [0, 0],
        "logical_round": 0
    });
    match decode(&value) {
        Err(DecodeError::UnknownClass(class)) => {
            assert_eq!(class, "TimeTravel")
        }
        result => panic!("unexpected result: {result:?}"),
    }
}

#[test]
fn test_duplicate_label_is_fatal() {
    let value = serde_json::json!({
        "class": "NOPInput",
        "label": "e1",
        "event_time": [0, 0],
        "logical_round": 0
    });
    let mut labels = LabelAllocator::new();
    let mut ctx = TraceContext {
        labels: &mut labels,
        invariants: &Registry,
    };
    codec::decode(&value, &mut ctx).unwrap();
    assert!(matches!(
        codec::decode(&value, &mut ctx),
        Err(DecodeError::DuplicateLabel(..))
    ));
}

#[test]
fn test_legacy_invariant_check_refused() {
    let value = serde_json::json!({
        "class": "CheckInvariants",
        "label": "e1",
        "event_time": [0, 0],
        "logical_round": 0,
        "invariant_name": "check_connectivity",
        "invariant_check": "YmxvYg=="
    });
    assert!(matches!(
        decode(&value),
        Err(DecodeError::LegacyInvariantCheck)
    ));
}

#[test]
fn test_unknown_invariant_is_fatal_at_decode() {
    let value = serde_json::json!({
        "class": "CheckInvariants",
        "label": "e1",
        "event_time": [0, 0],
        "logical_round": 0,
        "invariant_name": "check_quantum_entanglement"
    });
    match decode(&value) {
        Err(DecodeError::UnknownInvariant(name)) => {
            assert_eq!(name, "check_quantum_entanglement")
        }
        result => panic!("unexpected result: {result:?}"),
    }
}

#[test]
fn test_state_change_fingerprint_accepts_bare_string() {
    let value = serde_json::json!({
        "class": "ControllerStateChange",
        "label": "i1",
        "event_time": [0, 0],
        "logical_round": 0,
        "controller_id": "c1",
        "fingerprint": "link down %s",
        "name": "link down %s",
        "value": ["s1"]
    });
    let event = decode(&value).unwrap();
    assert_eq!(
        event.fingerprint(),
        rewind_utils::fingerprint::Fingerprint::tagged(
            "ControllerStateChange",
            ["link down %s".into(), "c1".into()],
        )
    );
}

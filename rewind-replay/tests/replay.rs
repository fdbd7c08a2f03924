//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rewind_events::input::{InputEvent, IntentSpec};
use rewind_events::internal::{ControlMessage, InternalEvent, SyncValue};
use rewind_events::Event;
use rewind_replay::buffer::{Delivery, Direction};
use rewind_replay::error::CollabError;
use rewind_replay::pending::ConnectionId;
use rewind_replay::replayer::{Observation, Replayer, ReplayerConfig};
use rewind_replay::simulation::{
    ControllerManager, PatchPanel, Simulation, SwitchOps,
};
use rewind_replay::InvariantRegistry;
use rewind_topology::{
    ConnectivityTracker, Host, HostInterface, Link, Switch, TopologyGraph,
};
use rewind_utils::fingerprint::DpFingerprint;
use rewind_utils::ids::{ControllerId, Dpid, HostId, PortNo};
use rewind_utils::openflow::{OfMessage, OfType};
use rewind_utils::time::SyncTime;

//
// Stub collaborators.
//

#[derive(Debug, Default)]
struct CollabLog {
    crashed_switches: BTreeSet<u64>,
    recovered_switches: BTreeSet<u64>,
    crashed_controllers: BTreeSet<String>,
    severed_links: Vec<String>,
    repaired_links: Vec<String>,
    intents: BTreeSet<String>,
    connected: bool,
}

#[derive(Clone, Default)]
struct Stub(Arc<Mutex<CollabLog>>);

impl Stub {
    fn log(&self) -> std::sync::MutexGuard<'_, CollabLog> {
        self.0.lock().unwrap()
    }
}

impl ControllerManager for Stub {
    fn connect_to_controllers(&mut self) -> Result<(), CollabError> {
        self.log().connected = true;
        Ok(())
    }

    fn crash_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError> {
        self.log().crashed_controllers.insert(cid.to_string());
        Ok(())
    }

    fn recover_controller(
        &mut self,
        cid: &ControllerId,
    ) -> Result<(), CollabError> {
        self.log().crashed_controllers.remove(&cid.to_string());
        Ok(())
    }

    fn block_peers(
        &mut self,
        _cid1: &ControllerId,
        _cid2: &ControllerId,
    ) -> Result<(), CollabError> {
        Ok(())
    }

    fn unblock_peers(
        &mut self,
        _cid1: &ControllerId,
        _cid2: &ControllerId,
    ) -> Result<(), CollabError> {
        Ok(())
    }

    fn add_intent(
        &mut self,
        _cid: &ControllerId,
        intent: &IntentSpec,
    ) -> Result<bool, CollabError> {
        self.log().intents.insert(intent.intent_id.clone());
        Ok(true)
    }

    fn remove_intent(
        &mut self,
        _cid: &ControllerId,
        intent_id: &str,
    ) -> Result<bool, CollabError> {
        Ok(self.log().intents.remove(intent_id))
    }

    fn send_link_notification(
        &mut self,
        _cid: &ControllerId,
    ) -> Result<(), CollabError> {
        Ok(())
    }
}

impl PatchPanel for Stub {
    fn sever_link(&mut self, link: &Link) -> Result<bool, CollabError> {
        self.log().severed_links.push(link.to_string());
        Ok(true)
    }

    fn repair_link(&mut self, link: &Link) -> Result<(), CollabError> {
        self.log().repaired_links.push(link.to_string());
        Ok(())
    }

    fn inject(
        &mut self,
        _host_id: Option<&HostId>,
        _iface: &str,
        _packet_b64: &str,
    ) -> Result<(), CollabError> {
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
        _dpid: Dpid,
        _port_no: PortNo,
    ) -> Result<(), CollabError> {
        Ok(())
    }

    fn permit_dp_event(
        &mut self,
        _fingerprint: &DpFingerprint,
        _dpid: Dpid,
        _port_no: PortNo,
    ) -> Result<(), CollabError> {
        Ok(())
    }
}

impl SwitchOps for Stub {
    fn crash_switch(&mut self, dpid: Dpid) -> Result<(), CollabError> {
        self.log().crashed_switches.insert(dpid.0);
        Ok(())
    }

    fn recover_switch(&mut self, dpid: Dpid) -> Result<(), CollabError> {
        self.log().recovered_switches.insert(dpid.0);
        Ok(())
    }

    fn migrate_host(
        &mut self,
        _old_dpid: Dpid,
        _old_port_no: PortNo,
        _new_dpid: Dpid,
        _new_port_no: PortNo,
        _host_id: &HostId,
    ) -> Result<(), CollabError> {
        Ok(())
    }

    fn ping(
        &mut self,
        _src: &HostId,
        _dst: &HostId,
    ) -> Result<bool, CollabError> {
        Ok(true)
    }
}

//
// Helper functions.
//

// Two switches joined by a bidirectional link, one host hanging off
// each switch.
fn sample_topology() -> (TopologyGraph, Link) {
    let mut topology = TopologyGraph::new();
    let s1 = Switch::with_ports(Dpid(1), "s1", 2);
    let s2 = Switch::with_ports(Dpid(2), "s2", 2);
    let h1 = Host::new(
        "h1".into(),
        "h1".to_owned(),
        vec![HostInterface::new(
            "h1-eth0".to_owned(),
            "00:00:00:00:00:01".parse().unwrap(),
            vec!["10.0.0.1".parse().unwrap()],
        )],
    );
    let h2 = Host::new(
        "h2".into(),
        "h2".to_owned(),
        vec![HostInterface::new(
            "h2-eth0".to_owned(),
            "00:00:00:00:00:02".parse().unwrap(),
            vec!["10.0.0.2".parse().unwrap()],
        )],
    );
    topology.add_switch(s1.clone()).unwrap();
    topology.add_switch(s2.clone()).unwrap();
    topology.add_host(h1.clone()).unwrap();
    topology.add_host(h2.clone()).unwrap();

    let trunk = Link::between_switches(&s1, PortNo(1), &s2, PortNo(1));
    topology.add_link(trunk.clone(), true).unwrap();
    topology
        .add_link(Link::access(&h1, &h1.interfaces[0], &s1, PortNo(2)), true)
        .unwrap();
    topology
        .add_link(Link::access(&h2, &h2.interfaces[0], &s2, PortNo(2)), true)
        .unwrap();
    (topology, trunk)
}

fn simulation(
    topology: TopologyGraph,
    default_connected: bool,
    stub: &Stub,
) -> Simulation {
    Simulation::new(
        topology,
        ConnectivityTracker::new(default_connected),
        InvariantRegistry::new(),
        Box::new(stub.clone()),
        Box::new(stub.clone()),
        Box::new(stub.clone()),
    )
}

fn config(timeout_ms: u64) -> ReplayerConfig {
    ReplayerConfig {
        default_timeout: Duration::from_millis(timeout_ms),
        retry_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

fn of_message(msg_type: OfType) -> OfMessage {
    let data = [1, msg_type as u8, 0, 8, 0, 0, 0, 1];
    OfMessage::decode(&data).unwrap()
}

fn control_send_event(
    sim: &mut Simulation,
    msg_type: OfType,
) -> Event {
    let message = of_message(msg_type);
    Event::internal(
        &mut sim.labels,
        InternalEvent::ControlMessageSend(ControlMessage {
            dpid: Dpid(1),
            controller_id: "c1".into(),
            fingerprint: message.fingerprint().unwrap(),
            b64_packet: message.to_base64(),
        }),
    )
}

//
// Tests.
//

// Scenario: single switch failure and recovery, then a connectivity
// check. No invariant violation; the switch's links are untouched.
#[tokio::test(start_paused = true)]
async fn test_switch_failure_recovery() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);
    let links_before = sim.topology.get_switch_links(Dpid(1)).unwrap();

    let events = vec![
        Event::input(&mut sim.labels, InputEvent::ConnectToControllers),
        Event::input(&mut sim.labels, InputEvent::SwitchFailure {
            dpid: Dpid(1),
        }),
        Event::input(&mut sim.labels, InputEvent::WaitTime {
            wait_time: 0.5,
        }),
        Event::input(&mut sim.labels, InputEvent::SwitchRecovery {
            dpid: Dpid(1),
        }),
        Event::input(&mut sim.labels, InputEvent::CheckInvariants {
            invariant_name: "check_connectivity".to_owned(),
        }),
    ];

    let mut replayer = Replayer::new(events, config(200));
    let report = replayer.run(&mut sim).await.unwrap();

    assert!(report.violations.is_empty());
    assert!(report.timed_out.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.rounds, 5);

    let log = stub.log();
    assert!(log.connected);
    assert!(log.crashed_switches.contains(&1));
    assert!(log.recovered_switches.contains(&1));
    drop(log);

    assert!(!sim.switch_is_crashed(Dpid(1)));
    assert_eq!(
        sim.topology.get_switch_links(Dpid(1)).unwrap(),
        links_before
    );
}

// A connectivity check run while the only trunk is severed must report
// a violation; two consecutive failing checks make it persistent.
#[tokio::test(start_paused = true)]
async fn test_link_failure_violates_connectivity() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let events = vec![
        Event::input(&mut sim.labels, InputEvent::LinkFailure {
            start_dpid: Dpid(1),
            start_port_no: PortNo(1),
            end_dpid: Dpid(2),
            end_port_no: PortNo(1),
        }),
        Event::input(&mut sim.labels, InputEvent::CheckInvariants {
            invariant_name: "check_connectivity".to_owned(),
        }),
        Event::input(&mut sim.labels, InputEvent::CheckInvariants {
            invariant_name: "check_connectivity".to_owned(),
        }),
        Event::input(&mut sim.labels, InputEvent::LinkRecovery {
            start_dpid: Dpid(1),
            start_port_no: PortNo(1),
            end_dpid: Dpid(2),
            end_port_no: PortNo(1),
        }),
        Event::input(&mut sim.labels, InputEvent::CheckInvariants {
            invariant_name: "check_connectivity".to_owned(),
        }),
    ];

    let mut replayer = Replayer::new(events, config(200));
    let report = replayer.run(&mut sim).await.unwrap();

    // Two failing checks, then a clean one after recovery.
    assert_eq!(report.violations.len(), 2);
    // The second check promoted the violations to persistent.
    assert!(
        report
            .violation_events
            .iter()
            .any(|event| matches!(
                &event.kind,
                rewind_events::EventKind::Special(
                    rewind_events::SpecialEvent::InvariantViolation {
                        persistent: true,
                        ..
                    }
                )
            ))
    );
    assert!(sim.violations.persistent_violations().is_empty());

    let log = stub.log();
    assert_eq!(log.severed_links.len(), 1);
    assert_eq!(log.repaired_links.len(), 1);
}

// Scenario: a recorded deterministic value answers the controller's
// sync request with exactly the recorded timestamp.
#[tokio::test(start_paused = true)]
async fn test_deterministic_value() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::unbounded_channel();
    sim.sync.register_controller("c1".into(), reply_tx);

    let events = vec![Event::internal(
        &mut sim.labels,
        InternalEvent::DeterministicValue {
            controller_id: "c1".into(),
            name: "gettimeofday".to_owned(),
            value: SyncValue::Time(SyncTime::new(42, 17)),
        },
    )];

    let mut replayer = Replayer::new(events, config(200));
    replayer
        .observation_channel()
        .send(Observation::ValueRequest {
            controller_id: "c1".into(),
            name: "gettimeofday".to_owned(),
        })
        .unwrap();
    let report = replayer.run(&mut sim).await.unwrap();

    assert!(report.timed_out.is_empty());
    assert_eq!(
        reply_rx.try_recv().unwrap(),
        SyncValue::Time(SyncTime::new(42, 17))
    );
}

// Scenario: recorded control-message order is enforced. When the
// simulation emits B before A, A times out and only then B matches.
#[tokio::test(start_paused = true)]
async fn test_control_message_ordering() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let conn = ConnectionId::new(Dpid(1), "c1".into());
    let (delivery_tx, mut delivery_rx) =
        tokio::sync::mpsc::unbounded_channel::<Delivery>();
    sim.buffer.register_connection(conn, delivery_tx);

    let event_a = control_send_event(&mut sim, OfType::PacketIn);
    let event_b = control_send_event(&mut sim, OfType::FlowRemoved);
    let label_a = event_a.label;

    let mut replayer =
        Replayer::new(vec![event_a, event_b], config(100));
    // The simulation emits B first, then never A.
    replayer
        .observation_channel()
        .send(Observation::MessageSend {
            dpid: Dpid(1),
            controller_id: "c1".into(),
            message: of_message(OfType::FlowRemoved),
        })
        .unwrap();

    let report = replayer.run(&mut sim).await.unwrap();

    // A timed out; B was released afterwards.
    assert_eq!(report.timed_out, vec![label_a]);
    let delivery = delivery_rx.try_recv().unwrap();
    assert_eq!(delivery.direction, Direction::Send);
    assert_eq!(delivery.message.header.msg_type, OfType::FlowRemoved);
    assert!(delivery_rx.try_recv().is_err());
}

// The happy path of the same scenario: observations arrive in the
// recorded order and both events pass without timing out.
#[tokio::test(start_paused = true)]
async fn test_control_message_in_order() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let conn = ConnectionId::new(Dpid(1), "c1".into());
    let (delivery_tx, mut delivery_rx) =
        tokio::sync::mpsc::unbounded_channel::<Delivery>();
    sim.buffer.register_connection(conn, delivery_tx);

    let event_a = control_send_event(&mut sim, OfType::PacketIn);
    let event_b = control_send_event(&mut sim, OfType::FlowRemoved);

    let mut replayer =
        Replayer::new(vec![event_a, event_b], config(100));
    for msg_type in [OfType::PacketIn, OfType::FlowRemoved] {
        replayer
            .observation_channel()
            .send(Observation::MessageSend {
                dpid: Dpid(1),
                controller_id: "c1".into(),
                message: of_message(msg_type),
            })
            .unwrap();
    }

    let report = replayer.run(&mut sim).await.unwrap();
    assert!(report.timed_out.is_empty());
    assert_eq!(
        delivery_rx.try_recv().unwrap().message.header.msg_type,
        OfType::PacketIn
    );
    assert_eq!(
        delivery_rx.try_recv().unwrap().message.header.msg_type,
        OfType::FlowRemoved
    );
}

// Scenario: AddIntent feeds the connectivity tracker; RemoveIntent
// undoes every effect.
#[tokio::test(start_paused = true)]
async fn test_intent_roundtrip() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, false, &stub);

    let intent = IntentSpec {
        cid: "c1".into(),
        intent_id: "17".to_owned(),
        src_dpid: "1".to_owned(),
        dst_dpid: "2".to_owned(),
        src_port: 2,
        dst_port: 2,
        src_mac: "00:00:00:00:00:01".parse().unwrap(),
        dst_mac: "00:00:00:00:00:02".parse().unwrap(),
        static_path: false,
        intent_type: "SHORTEST_PATH".to_owned(),
        intent_ip: "127.0.0.1".to_owned(),
        intent_port: 8080,
        intent_url: "/intents".to_owned(),
    };

    let add = Event::input(
        &mut sim.labels,
        InputEvent::AddIntent(intent.clone()),
    );
    let mut replayer = Replayer::new(vec![add], config(100));
    replayer.run(&mut sim).await.unwrap();

    assert!(sim.connectivity.is_connected(&"h1".into(), &"h2".into()));
    assert!(sim.connectivity.policies().contains(&"17".into()));

    let remove = Event::input(&mut sim.labels, InputEvent::RemoveIntent {
        cid: "c1".into(),
        intent_id: "17".to_owned(),
        intent_ip: "127.0.0.1".to_owned(),
        intent_port: 8080,
        intent_url: "/intents".to_owned(),
    });
    let mut replayer = Replayer::new(vec![remove], config(100));
    replayer.run(&mut sim).await.unwrap();

    // Back to the default answer.
    assert!(!sim.connectivity.is_connected(&"h1".into(), &"h2".into()));
    assert!(!sim.connectivity.policies().contains(&"17".into()));
}

// Scheduler progress: with no observations at all, the replay
// terminates with every internal event marked timed out.
#[tokio::test(start_paused = true)]
async fn test_progress_without_observations() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let events = vec![
        control_send_event(&mut sim, OfType::PacketIn),
        control_send_event(&mut sim, OfType::FlowRemoved),
        control_send_event(&mut sim, OfType::PortStatus),
    ];
    let labels: Vec<_> = events.iter().map(|event| event.label).collect();

    let mut replayer = Replayer::new(events, config(50));
    let report = replayer.run(&mut sim).await.unwrap();

    assert_eq!(report.timed_out, labels);
    assert_eq!(report.rounds, 3);
}

// User interruption preserves in-flight state; a second run resumes
// and completes the trace.
#[tokio::test(start_paused = true)]
async fn test_interrupt_preserves_state() {
    let stub = Stub::default();
    let (topology, ..) = sample_topology();
    let mut sim = simulation(topology, true, &stub);

    let events = vec![
        Event::input(&mut sim.labels, InputEvent::NopInput),
        Event::input(&mut sim.labels, InputEvent::NopInput),
    ];

    let mut replayer = Replayer::new(events, config(100));
    replayer
        .observation_channel()
        .send(Observation::Interrupt)
        .unwrap();
    assert!(replayer.run(&mut sim).await.is_err());

    // Resume: the remaining events complete.
    let report = replayer.run(&mut sim).await.unwrap();
    assert_eq!(report.rounds, 2);
}

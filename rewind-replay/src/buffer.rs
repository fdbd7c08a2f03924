//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};

use rewind_events::internal::{ControlMessage, InternalEvent};
use rewind_events::Event;
use rewind_utils::fingerprint::OfFingerprint;
use rewind_utils::ids::{ControllerId, Dpid};
use rewind_utils::label::LabelAllocator;
use rewind_utils::openflow::{DecodeError, OfMessage, OfType};
use tokio::sync::mpsc::UnboundedSender;

use crate::debug::Debug;
use crate::error::Error;
use crate::pending::{ConnectionId, PendingReceive, PendingSend};

// Message direction on a switch<->controller connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    // Switch -> controller.
    Send,
    // Controller -> switch.
    Receive,
}

// A message released from the buffer towards its destination.
#[derive(Debug)]
pub struct Delivery {
    pub direction: Direction,
    pub message: OfMessage,
}

#[derive(Debug)]
struct QueuedMessage {
    fingerprint: OfFingerprint,
    message: OfMessage,
}

#[derive(Debug, Default)]
struct Connection {
    sends: VecDeque<QueuedMessage>,
    receives: VecDeque<QueuedMessage>,
    blocked: bool,
    // Releases that happened while the connection was blocked, flushed
    // in FIFO order on unblock.
    deferred: VecDeque<Delivery>,
    delivery_tx: Option<UnboundedSender<Delivery>>,
}

/// The central chokepoint on every switch<->controller connection.
///
/// Every intercepted control-plane message is held in a per-connection,
/// per-direction FIFO queue until an explicit schedule decision
/// releases it. Whitelisted message types (hello, echo, vendor) bypass
/// all gating.
#[derive(Debug, Default)]
pub struct OpenFlowBuffer {
    conns: BTreeMap<ConnectionId, Connection>,
}

// A release decision for one queued message.
#[derive(Clone, Debug)]
pub enum Pending {
    Send(PendingSend),
    Receive(PendingReceive),
}

/// Per-switch gate between the ingress of a flow_mod and its
/// application to the switch flow table. Identical contract to the
/// receive side of the OpenFlow buffer, bounded to one switch's queue.
#[derive(Debug, Default)]
pub struct FlowModGates {
    gates: BTreeMap<Dpid, Gate>,
}

#[derive(Debug, Default)]
struct Gate {
    queue: VecDeque<QueuedMessage>,
    apply_tx: Option<UnboundedSender<OfMessage>>,
}

// ===== impl OpenFlowBuffer =====

impl OpenFlowBuffer {
    pub fn new() -> OpenFlowBuffer {
        Default::default()
    }

    /// Fingerprints of always-pass message types that never gate on a
    /// schedule decision.
    pub fn in_whitelist(fingerprint: &OfFingerprint) -> bool {
        matches!(
            fingerprint.msg_type,
            OfType::Hello
                | OfType::EchoRequest
                | OfType::EchoReply
                | OfType::Vendor
        )
    }

    // Registers the delivery channel for one connection.
    pub fn register_connection(
        &mut self,
        conn: ConnectionId,
        delivery_tx: UnboundedSender<Delivery>,
    ) {
        self.conns.entry(conn).or_default().delivery_tx = Some(delivery_tx);
    }

    /// Intercepts a switch->controller message: enqueue it and return
    /// the matching `ControlMessageSend` observation.
    pub fn observe_send(
        &mut self,
        labels: &mut LabelAllocator,
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    ) -> Result<Event, DecodeError> {
        self.observe(labels, dpid, controller_id, Direction::Send, message)
    }

    /// Intercepts a controller->switch message: enqueue it and return
    /// the matching `ControlMessageReceive` observation.
    pub fn observe_receive(
        &mut self,
        labels: &mut LabelAllocator,
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    ) -> Result<Event, DecodeError> {
        self.observe(labels, dpid, controller_id, Direction::Receive, message)
    }

    fn observe(
        &mut self,
        labels: &mut LabelAllocator,
        dpid: Dpid,
        controller_id: ControllerId,
        direction: Direction,
        message: OfMessage,
    ) -> Result<Event, DecodeError> {
        let fingerprint = message.fingerprint()?;
        let conn = ConnectionId::new(dpid, controller_id.clone());
        Debug::MessageObserved(&conn, direction, &fingerprint).log();

        let control_message = ControlMessage {
            dpid,
            controller_id,
            fingerprint: fingerprint.clone(),
            b64_packet: message.to_base64(),
        };
        let internal = match direction {
            Direction::Send => {
                InternalEvent::ControlMessageSend(control_message)
            }
            Direction::Receive => {
                InternalEvent::ControlMessageReceive(control_message)
            }
        };

        let state = self.conns.entry(conn.clone()).or_default();
        if OpenFlowBuffer::in_whitelist(&fingerprint) {
            // Whitelisted messages bypass all gating.
            Debug::MessageReleased(&conn, direction, &fingerprint).log();
            if let Some(tx) = &state.delivery_tx {
                let _ = tx.send(Delivery { direction, message });
            }
        } else {
            let queued = QueuedMessage {
                fingerprint,
                message,
            };
            match direction {
                Direction::Send => state.sends.push_back(queued),
                Direction::Receive => state.receives.push_back(queued),
            }
        }

        Ok(Event::internal(labels, internal))
    }

    /// True iff a message with that exact fingerprint is at the head
    /// of the relevant pending-sends queue.
    pub fn message_send_waiting(&self, pending: &PendingSend) -> bool {
        let conn =
            ConnectionId::new(pending.dpid, pending.controller_id.clone());
        self.conns
            .get(&conn)
            .and_then(|state| state.sends.front())
            .is_some_and(|queued| queued.fingerprint == pending.fingerprint)
    }

    /// True iff a message with that exact fingerprint is at the head
    /// of the relevant pending-receives queue.
    pub fn message_receipt_waiting(&self, pending: &PendingReceive) -> bool {
        let conn =
            ConnectionId::new(pending.dpid, pending.controller_id.clone());
        self.conns
            .get(&conn)
            .and_then(|state| state.receives.front())
            .is_some_and(|queued| queued.fingerprint == pending.fingerprint)
    }

    /// Releases the identified message. Must only be called while the
    /// matching `..._waiting` predicate holds; scheduling a message
    /// that is not waiting is a protocol invariant breach, except for
    /// whitelisted fingerprints where `schedule` is an idempotent
    /// no-op.
    pub fn schedule(&mut self, pending: &Pending) -> Result<(), Error> {
        let (conn, direction, fingerprint) = match pending {
            Pending::Send(pending) => (
                ConnectionId::new(
                    pending.dpid,
                    pending.controller_id.clone(),
                ),
                Direction::Send,
                &pending.fingerprint,
            ),
            Pending::Receive(pending) => (
                ConnectionId::new(
                    pending.dpid,
                    pending.controller_id.clone(),
                ),
                Direction::Receive,
                &pending.fingerprint,
            ),
        };

        let state = self.conns.entry(conn.clone()).or_default();
        let queue = match direction {
            Direction::Send => &mut state.sends,
            Direction::Receive => &mut state.receives,
        };
        let waiting = queue
            .front()
            .is_some_and(|queued| queued.fingerprint == *fingerprint);
        if !waiting {
            if OpenFlowBuffer::in_whitelist(fingerprint) {
                return Ok(());
            }
            return Err(Error::ScheduleNotWaiting(conn, fingerprint.clone()));
        }

        let queued = queue.pop_front().unwrap();
        let delivery = Delivery {
            direction,
            message: queued.message,
        };
        if state.blocked {
            Debug::MessageDeferred(&conn, direction, fingerprint).log();
            state.deferred.push_back(delivery);
        } else {
            Debug::MessageReleased(&conn, direction, fingerprint).log();
            if let Some(tx) = &state.delivery_tx {
                let _ = tx.send(delivery);
            }
        }
        Ok(())
    }

    /// Gates a connection: observations continue, but no schedule call
    /// releases traffic until the connection is unblocked. Idempotent.
    pub fn block(&mut self, conn: &ConnectionId) {
        let state = self.conns.entry(conn.clone()).or_default();
        if !state.blocked {
            Debug::ChannelBlocked(conn).log();
            state.blocked = true;
        }
    }

    /// Lifts a connection gate, flushing deferred releases in FIFO
    /// order. Idempotent.
    pub fn unblock(&mut self, conn: &ConnectionId) {
        let Some(state) = self.conns.get_mut(conn) else {
            return;
        };
        if !state.blocked {
            return;
        }
        Debug::ChannelUnblocked(conn).log();
        state.blocked = false;
        while let Some(delivery) = state.deferred.pop_front() {
            if let Some(tx) = &state.delivery_tx {
                let _ = tx.send(delivery);
            }
        }
    }

    pub fn is_blocked(&self, conn: &ConnectionId) -> bool {
        self.conns
            .get(conn)
            .is_some_and(|state| state.blocked)
    }

    // Number of queued (ungated) messages in one direction.
    pub fn pending_count(
        &self,
        conn: &ConnectionId,
        direction: Direction,
    ) -> usize {
        self.conns.get(conn).map_or(0, |state| match direction {
            Direction::Send => state.sends.len(),
            Direction::Receive => state.receives.len(),
        })
    }
}

// ===== impl FlowModGates =====

impl FlowModGates {
    pub fn new() -> FlowModGates {
        Default::default()
    }

    // Registers the flow-table application channel of one switch.
    pub fn register_switch(
        &mut self,
        dpid: Dpid,
        apply_tx: UnboundedSender<OfMessage>,
    ) {
        self.gates.entry(dpid).or_default().apply_tx = Some(apply_tx);
    }

    /// Intercepts a flow_mod at the ingress of a switch, before it is
    /// applied to the flow table. Returns the matching
    /// `ProcessFlowMod` observation.
    pub fn observe(
        &mut self,
        labels: &mut LabelAllocator,
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    ) -> Result<Event, DecodeError> {
        let fingerprint = message.fingerprint()?;
        let conn = ConnectionId::new(dpid, controller_id.clone());
        Debug::FlowModObserved(&conn, &fingerprint).log();

        let internal = InternalEvent::ProcessFlowMod(ControlMessage {
            dpid,
            controller_id,
            fingerprint: fingerprint.clone(),
            b64_packet: message.to_base64(),
        });
        self.gates.entry(dpid).or_default().queue.push_back(
            QueuedMessage {
                fingerprint,
                message,
            },
        );
        Ok(Event::internal(labels, internal))
    }

    // True iff the identified flow_mod is at the head of the switch's
    // queue.
    pub fn message_receipt_waiting(&self, pending: &PendingReceive) -> bool {
        self.gates
            .get(&pending.dpid)
            .and_then(|gate| gate.queue.front())
            .is_some_and(|queued| queued.fingerprint == pending.fingerprint)
    }

    // Applies the identified flow_mod to the switch's flow table.
    pub fn schedule(&mut self, pending: &PendingReceive) -> Result<(), Error> {
        let conn =
            ConnectionId::new(pending.dpid, pending.controller_id.clone());
        let gate = self.gates.entry(pending.dpid).or_default();
        let waiting = gate
            .queue
            .front()
            .is_some_and(|queued| queued.fingerprint == pending.fingerprint);
        if !waiting {
            return Err(Error::FlowModNotWaiting(
                conn,
                pending.fingerprint.clone(),
            ));
        }
        Debug::FlowModReleased(&conn, &pending.fingerprint).log();
        let queued = gate.queue.pop_front().unwrap();
        if let Some(tx) = &gate.apply_tx {
            let _ = tx.send(queued.message);
        }
        Ok(())
    }
}

// ===== tests =====

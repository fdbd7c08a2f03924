//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use rewind_events::input::InputEvent;
use rewind_events::internal::InternalEvent;
use rewind_events::{Event, EventKind, SpecialEvent};
use rewind_utils::ids::{ControllerId, Dpid};
use rewind_utils::label::Label;
use rewind_utils::openflow::OfMessage;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::buffer::OpenFlowBuffer;
use crate::debug::Debug;
use crate::error::{Error, InterruptReason};
use crate::exec::{self, Outcome};
use crate::pending::PendingStateChange;
use crate::simulation::Simulation;

/// Replayer tuning knobs.
#[derive(Clone, Debug)]
pub struct ReplayerConfig {
    /// How long one event may wait for its matching observation.
    pub default_timeout: Duration,
    /// Backoff between proceed attempts while waiting.
    pub retry_interval: Duration,
    /// Auto-whitelist every send-side control message event.
    pub pass_through_sends: bool,
    /// Auto-pass events whose fingerprint is in the static whitelist
    /// (hello, echo, vendor).
    pub ignore_whitelisted_packets: bool,
    /// Drop to an interactive shell on the first invariant violation.
    pub fail_to_interactive: bool,
    /// Drop to an interactive shell on the first persistent violation.
    pub fail_to_interactive_on_persistent_violations: bool,
}

/// An observation enqueued by a background worker for the main loop to
/// apply.
#[derive(Debug)]
pub enum Observation {
    MessageSend {
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    },
    MessageReceive {
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    },
    FlowMod {
        dpid: Dpid,
        controller_id: ControllerId,
        message: OfMessage,
    },
    StateChange(PendingStateChange),
    ValueRequest {
        controller_id: ControllerId,
        name: String,
    },
    Interrupt,
}

/// End-of-run summary.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub rounds: i64,
    pub timed_out: Vec<Label>,
    pub failed: Vec<Label>,
    pub violations: BTreeMap<i64, Vec<String>>,
    /// InvariantViolation events produced during the run, ready to be
    /// appended to the output trace.
    pub violation_events: Vec<Event>,
}

/// Drives one trace to completion, logical round by logical round.
///
/// Input events are injected into the simulation; internal events wait
/// for their matching observation or time out. Interruption preserves
/// the event cursor so a session can resume where it stopped.
pub struct Replayer {
    config: ReplayerConfig,
    events: Vec<Event>,
    cursor: usize,
    logical_round: i64,
    observations_tx: UnboundedSender<Observation>,
    observations_rx: UnboundedReceiver<Observation>,
    interrupted: bool,
    timed_out: Vec<Label>,
    failed: Vec<Label>,
    violation_events: Vec<Event>,
}

// ===== impl ReplayerConfig =====

impl Default for ReplayerConfig {
    fn default() -> ReplayerConfig {
        ReplayerConfig {
            default_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(10),
            pass_through_sends: false,
            ignore_whitelisted_packets: true,
            fail_to_interactive: false,
            fail_to_interactive_on_persistent_violations: false,
        }
    }
}

// ===== impl Replayer =====

impl Replayer {
    pub fn new(events: Vec<Event>, config: ReplayerConfig) -> Replayer {
        let (observations_tx, observations_rx) = mpsc::unbounded_channel();
        Replayer {
            config,
            events,
            cursor: 0,
            logical_round: 0,
            observations_tx,
            observations_rx,
            interrupted: false,
            timed_out: vec![],
            failed: vec![],
            violation_events: vec![],
        }
    }

    /// Channel end handed to background workers (and signal handlers)
    /// to enqueue observations for the main loop.
    pub fn observation_channel(&self) -> UnboundedSender<Observation> {
        self.observations_tx.clone()
    }

    /// Runs the trace to completion. On interruption the cursor and
    /// all per-event state are preserved; calling `run` again resumes.
    pub async fn run(
        &mut self,
        sim: &mut Simulation,
    ) -> Result<ReplayReport, Error> {
        while self.step(sim).await? {}
        info!(rounds = %self.logical_round, "replay complete");
        Ok(self.report(sim))
    }

    /// Advances the replay by exactly one event. Returns false once
    /// the trace is exhausted.
    pub async fn step(
        &mut self,
        sim: &mut Simulation,
    ) -> Result<bool, Error> {
        if self.cursor >= self.events.len() {
            return Ok(false);
        }
        self.drain_observations(sim);
        if self.interrupted {
            self.interrupted = false;
            let error = Error::Interrupted(InterruptReason::UserInterrupt);
            error.log();
            return Err(error);
        }

        let event = self.events[self.cursor].clone();
        Debug::EventStart(&event).log();
        match &event.kind {
            EventKind::Special(..) => {
                // Logged but never executed.
                Debug::EventSkipped(&event).log();
                self.advance();
            }
            EventKind::Input(InputEvent::WaitTime { wait_time }) => {
                info!(%event, %wait_time, "pausing simulation");
                tokio::time::sleep(Duration::from_secs_f64(*wait_time)).await;
                Debug::EventDone(&event).log();
                self.advance();
            }
            EventKind::Input(input) => {
                self.run_input(sim, &event, input).await?;
            }
            EventKind::Internal(internal) => {
                self.run_internal(sim, &event, internal).await?;
            }
        }
        Ok(true)
    }

    /// Summary of the replay so far.
    pub fn report(&self, sim: &Simulation) -> ReplayReport {
        ReplayReport {
            rounds: self.logical_round,
            timed_out: self.timed_out.clone(),
            failed: self.failed.clone(),
            violations: sim.violations.snapshot().clone(),
            violation_events: self.violation_events.clone(),
        }
    }

    /// The label of the event the cursor is on, if any.
    pub fn current_event(&self) -> Option<&Event> {
        self.events.get(self.cursor)
    }

    // Injects one input event, retrying until done or timed out.
    async fn run_input(
        &mut self,
        sim: &mut Simulation,
        event: &Event,
        input: &InputEvent,
    ) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.default_timeout;
        loop {
            match exec::proceed_input(sim, event, input, self.logical_round)? {
                Outcome::Done => {
                    if let InputEvent::CheckInvariants { .. } = input {
                        self.post_invariant_check(sim)?;
                    }
                    Debug::EventDone(event).log();
                    self.advance();
                    return Ok(());
                }
                Outcome::Failed => {
                    Debug::EventFailed(event).log();
                    self.mark_failed();
                    self.advance();
                    return Ok(());
                }
                Outcome::Retry => {
                    if Instant::now() >= deadline {
                        Debug::EventTimedOut(event).log();
                        self.mark_timed_out();
                        self.advance();
                        return Ok(());
                    }
                    tokio::time::sleep(self.config.retry_interval).await;
                    self.drain_observations(sim);
                }
            }
        }
    }

    // Waits for one internal event's observation, honoring the
    // whitelist and the timeout rules.
    async fn run_internal(
        &mut self,
        sim: &mut Simulation,
        event: &Event,
        internal: &InternalEvent,
    ) -> Result<(), Error> {
        if self.whitelisted(internal) {
            Debug::EventWhitelisted(event).log();
            self.advance();
            return Ok(());
        }

        let deadline = Instant::now() + self.config.default_timeout;
        loop {
            if self.interrupted {
                self.interrupted = false;
                let error = Error::Interrupted(InterruptReason::UserInterrupt);
                error.log();
                return Err(error);
            }
            match exec::proceed_internal(sim, event, internal)? {
                Outcome::Done => {
                    Debug::EventDone(event).log();
                    self.advance();
                    return Ok(());
                }
                Outcome::Failed => {
                    Debug::EventFailed(event).log();
                    self.mark_failed();
                    self.advance();
                    return Ok(());
                }
                Outcome::Retry => {
                    // An event carrying timeout_disallowed waits
                    // indefinitely.
                    if !event.timeout_disallowed
                        && Instant::now() >= deadline
                    {
                        Debug::EventTimedOut(event).log();
                        self.mark_timed_out();
                        self.advance();
                        return Ok(());
                    }
                    tokio::time::sleep(self.config.retry_interval).await;
                    self.drain_observations(sim);
                }
            }
        }
    }

    // Whether the event auto-passes without waiting for an
    // observation.
    fn whitelisted(&self, internal: &InternalEvent) -> bool {
        match internal {
            InternalEvent::ControlMessageSend(msg) => {
                self.config.pass_through_sends
                    || (self.config.ignore_whitelisted_packets
                        && OpenFlowBuffer::in_whitelist(&msg.fingerprint))
            }
            InternalEvent::ControlMessageReceive(msg) => {
                self.config.ignore_whitelisted_packets
                    && OpenFlowBuffer::in_whitelist(&msg.fingerprint)
            }
            InternalEvent::DataplanePermit { passive, .. } => *passive,
            _ => false,
        }
    }

    // Applies the fail-to-interactive policy after an invariant check
    // and logs violations as special events.
    fn post_invariant_check(
        &mut self,
        sim: &mut Simulation,
    ) -> Result<(), Error> {
        let violations = sim.violations.last_check();
        let persistent = sim.violations.persistent_violations();
        if !violations.is_empty() {
            let mut event = Event::special(
                &mut sim.labels,
                SpecialEvent::InvariantViolation {
                    violations: violations.clone(),
                    persistent: false,
                },
            );
            event.logical_round = self.logical_round;
            self.violation_events.push(event);
        }
        if !persistent.is_empty() {
            warn!(?persistent, "persistent violations detected");
            let mut event = Event::special(
                &mut sim.labels,
                SpecialEvent::InvariantViolation {
                    violations: persistent.clone(),
                    persistent: true,
                },
            );
            event.logical_round = self.logical_round;
            self.violation_events.push(event);
            if self.config.fail_to_interactive_on_persistent_violations {
                let error = Error::Interrupted(
                    InterruptReason::PersistentViolation,
                );
                error.log();
                return Err(error);
            }
        }
        if !violations.is_empty() && self.config.fail_to_interactive {
            let error =
                Error::Interrupted(InterruptReason::InvariantViolation);
            error.log();
            return Err(error);
        }
        Ok(())
    }

    // Applies queued observations to the buffers and trackers. This is
    // the only place background input reaches the shared state.
    fn drain_observations(&mut self, sim: &mut Simulation) {
        while let Ok(observation) = self.observations_rx.try_recv() {
            match observation {
                Observation::MessageSend {
                    dpid,
                    controller_id,
                    message,
                } => {
                    if let Err(error) = sim.buffer.observe_send(
                        &mut sim.labels,
                        dpid,
                        controller_id,
                        message,
                    ) {
                        warn!(%error, "failed to fingerprint message");
                    }
                }
                Observation::MessageReceive {
                    dpid,
                    controller_id,
                    message,
                } => {
                    if let Err(error) = sim.buffer.observe_receive(
                        &mut sim.labels,
                        dpid,
                        controller_id,
                        message,
                    ) {
                        warn!(%error, "failed to fingerprint message");
                    }
                }
                Observation::FlowMod {
                    dpid,
                    controller_id,
                    message,
                } => {
                    if let Err(error) = sim.flow_mod_gates.observe(
                        &mut sim.labels,
                        dpid,
                        controller_id,
                        message,
                    ) {
                        warn!(%error, "failed to fingerprint flow_mod");
                    }
                }
                Observation::StateChange(state_change) => {
                    sim.sync.notify_state_change(state_change);
                }
                Observation::ValueRequest {
                    controller_id,
                    name,
                } => {
                    sim.sync.notify_value_request(controller_id, name);
                }
                Observation::Interrupt => {
                    self.interrupted = true;
                }
            }
        }
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.logical_round += 1;
    }

    fn mark_timed_out(&mut self) {
        let event = &mut self.events[self.cursor];
        event.timed_out = true;
        self.timed_out.push(event.label);
    }

    fn mark_failed(&mut self) {
        let event = &mut self.events[self.cursor];
        event.timed_out = true;
        self.failed.push(event.label);
    }
}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod codec;
pub mod error;
pub mod input;
pub mod internal;
pub mod trace;

use std::hash::{Hash, Hasher};

use enum_as_inner::EnumAsInner;
use rewind_utils::fingerprint::Fingerprint;
use rewind_utils::label::{Label, LabelAllocator, LabelPrefix};
use rewind_utils::time::SyncTime;

use crate::input::InputEvent;
use crate::internal::InternalEvent;

/// A single trace event.
///
/// Input events are injected into the simulation by the replayer;
/// internal events are observed happening inside the controllers;
/// special events are logged but never executed. Two events are equal
/// iff they have the same class and the same label, so events are safe
/// to use as map keys.
#[derive(Clone, Debug)]
pub struct Event {
    pub label: Label,
    pub event_time: SyncTime,
    pub logical_round: i64,
    /// Labels of internal events causally required by this input event,
    /// consumed by the trace pruner.
    pub dependent_labels: Vec<Label>,
    /// Whether the trace pruner may drop this event. Initialization
    /// inputs are not prunable.
    pub prunable: bool,
    /// Whether the replayer must wait indefinitely for this event.
    pub timeout_disallowed: bool,
    /// Whether the most recent wait for this event timed out.
    pub timed_out: bool,
    pub kind: EventKind,
}

// The three event families.
#[derive(Clone, Debug, EnumAsInner)]
pub enum EventKind {
    Input(InputEvent),
    Internal(InternalEvent),
    Special(SpecialEvent),
}

// Events that are logged but never executed by the replayer.
#[derive(Clone, Debug)]
pub enum SpecialEvent {
    InvariantViolation {
        violations: Vec<String>,
        persistent: bool,
    },
}

// ===== impl Event =====

impl Event {
    // Creates a new input event with a freshly allocated label.
    pub fn input(labels: &mut LabelAllocator, input: InputEvent) -> Event {
        let timeout_disallowed =
            matches!(input, InputEvent::ConnectToControllers);
        Event {
            label: labels.allocate(LabelPrefix::Input),
            event_time: SyncTime::now(),
            logical_round: -1,
            dependent_labels: vec![],
            prunable: input.prunable_default(),
            timeout_disallowed,
            timed_out: false,
            kind: EventKind::Input(input),
        }
    }

    // Creates a new internal event with a freshly allocated label.
    pub fn internal(
        labels: &mut LabelAllocator,
        internal: InternalEvent,
    ) -> Event {
        Event {
            label: labels.allocate(LabelPrefix::Internal),
            event_time: SyncTime::now(),
            logical_round: -1,
            dependent_labels: vec![],
            prunable: false,
            timeout_disallowed: false,
            timed_out: false,
            kind: EventKind::Internal(internal),
        }
    }

    // Creates a new special event with a freshly allocated label.
    pub fn special(
        labels: &mut LabelAllocator,
        special: SpecialEvent,
    ) -> Event {
        Event {
            label: labels.allocate(LabelPrefix::Input),
            event_time: SyncTime::now(),
            logical_round: -1,
            dependent_labels: vec![],
            prunable: true,
            timeout_disallowed: false,
            timed_out: false,
            kind: EventKind::Special(special),
        }
    }

    // Returns the class tag identifying the event type in the trace.
    pub fn class_tag(&self) -> &'static str {
        match &self.kind {
            EventKind::Input(input) => input.class_tag(),
            EventKind::Internal(internal) => internal.class_tag(),
            EventKind::Special(special) => special.class_tag(),
        }
    }

    /// Computes the event fingerprint, the canonical equality key used
    /// to match events across runs.
    pub fn fingerprint(&self) -> Fingerprint {
        match &self.kind {
            EventKind::Input(input) => input.fingerprint(),
            EventKind::Internal(internal) => internal.fingerprint(),
            EventKind::Special(special) => special.fingerprint(),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class_tag(), self.label)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Event) -> bool {
        self.class_tag() == other.class_tag() && self.label == other.label
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

// ===== impl SpecialEvent =====

impl SpecialEvent {
    pub fn class_tag(&self) -> &'static str {
        match self {
            SpecialEvent::InvariantViolation { .. } => "InvariantViolation",
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::tagged(self.class_tag(), [])
    }
}

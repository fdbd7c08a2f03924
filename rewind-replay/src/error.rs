//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::fingerprint::OfFingerprint;
use rewind_utils::ids::ControllerId;
use tracing::{error, warn};

use crate::pending::ConnectionId;

// Replay errors.
//
// Everything except `Interrupted` is a protocol invariant breach that
// aborts the run with a diagnostic; per-event failures never surface
// here, they mark the event and the replay continues.
#[derive(Debug)]
pub enum Error {
    ScheduleNotWaiting(ConnectionId, OfFingerprint),
    FlowModNotWaiting(ConnectionId, OfFingerprint),
    StateChangeNotPending(ControllerId),
    NoValueRequestPending(ControllerId),
    SpecialEventExecuted(String),
    TopologyBreach(rewind_topology::Error),
    Interrupted(InterruptReason),
}

// Why a replay was interrupted. In-flight state is preserved so the
// session can resume.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterruptReason {
    UserInterrupt,
    InvariantViolation,
    PersistentViolation,
}

// Errors surfaced by the external collaborators (controller manager,
// patch panel, switch ops).
#[derive(Debug)]
pub enum CollabError {
    UnknownEntity(String),
    Timeout(String),
    Io(String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::ScheduleNotWaiting(conn, fingerprint)
            | Error::FlowModNotWaiting(conn, fingerprint) => {
                error!(%conn, %fingerprint, "{}", self);
            }
            Error::StateChangeNotPending(controller_id)
            | Error::NoValueRequestPending(controller_id) => {
                error!(%controller_id, "{}", self);
            }
            Error::SpecialEventExecuted(label) => {
                error!(%label, "{}", self);
            }
            Error::TopologyBreach(error) => {
                error!(%error, "{}", self);
            }
            Error::Interrupted(reason) => {
                warn!(?reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ScheduleNotWaiting(..) => {
                write!(f, "scheduled message is not at the head of its queue")
            }
            Error::FlowModNotWaiting(..) => {
                write!(f, "scheduled flow_mod is not waiting in the switch")
            }
            Error::StateChangeNotPending(..) => {
                write!(f, "acknowledged state change was never observed")
            }
            Error::NoValueRequestPending(..) => {
                write!(f, "no deterministic value request is pending")
            }
            Error::SpecialEventExecuted(..) => {
                write!(f, "special events must never be executed")
            }
            Error::TopologyBreach(..) => {
                write!(f, "topology data-model breach")
            }
            Error::Interrupted(..) => {
                write!(f, "replay interrupted")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TopologyBreach(error) => Some(error),
            _ => None,
        }
    }
}

impl From<rewind_topology::Error> for Error {
    fn from(error: rewind_topology::Error) -> Error {
        Error::TopologyBreach(error)
    }
}

// ===== impl CollabError =====

impl CollabError {
    pub(crate) fn log(&self) {
        match self {
            CollabError::UnknownEntity(entity) => {
                warn!(%entity, "{}", self);
            }
            CollabError::Timeout(what) => {
                warn!(%what, "{}", self);
            }
            CollabError::Io(detail) => {
                warn!(%detail, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollabError::UnknownEntity(..) => {
                write!(f, "event references an unknown entity")
            }
            CollabError::Timeout(..) => {
                write!(f, "collaborator operation timed out")
            }
            CollabError::Io(..) => {
                write!(f, "collaborator I/O failure")
            }
        }
    }
}

impl std::error::Error for CollabError {}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_events::Event;
use rewind_utils::fingerprint::OfFingerprint;
use tracing::debug;

use crate::buffer::Direction;
use crate::pending::ConnectionId;

// Replay debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    EventStart(&'a Event),
    EventDone(&'a Event),
    EventTimedOut(&'a Event),
    EventFailed(&'a Event),
    EventSkipped(&'a Event),
    EventWhitelisted(&'a Event),
    MessageObserved(&'a ConnectionId, Direction, &'a OfFingerprint),
    MessageReleased(&'a ConnectionId, Direction, &'a OfFingerprint),
    MessageDeferred(&'a ConnectionId, Direction, &'a OfFingerprint),
    ChannelBlocked(&'a ConnectionId),
    ChannelUnblocked(&'a ConnectionId),
    FlowModObserved(&'a ConnectionId, &'a OfFingerprint),
    FlowModReleased(&'a ConnectionId, &'a OfFingerprint),
}

// ===== impl Debug =====

impl<'a> Debug<'a> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::EventStart(event)
            | Debug::EventDone(event)
            | Debug::EventTimedOut(event)
            | Debug::EventFailed(event)
            | Debug::EventSkipped(event)
            | Debug::EventWhitelisted(event) => {
                debug!(event = %event, fingerprint = %event.fingerprint(), "{}", self);
            }
            Debug::MessageObserved(conn, direction, fingerprint)
            | Debug::MessageReleased(conn, direction, fingerprint)
            | Debug::MessageDeferred(conn, direction, fingerprint) => {
                debug!(%conn, ?direction, %fingerprint, "{}", self);
            }
            Debug::ChannelBlocked(conn) | Debug::ChannelUnblocked(conn) => {
                debug!(%conn, "{}", self);
            }
            Debug::FlowModObserved(conn, fingerprint)
            | Debug::FlowModReleased(conn, fingerprint) => {
                debug!(%conn, %fingerprint, "{}", self);
            }
        }
    }
}

impl<'a> std::fmt::Display for Debug<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::EventStart(..) => {
                write!(f, "starting event")
            }
            Debug::EventDone(..) => {
                write!(f, "event done")
            }
            Debug::EventTimedOut(..) => {
                write!(f, "event timed out")
            }
            Debug::EventFailed(..) => {
                write!(f, "event failed")
            }
            Debug::EventSkipped(..) => {
                write!(f, "event skipped")
            }
            Debug::EventWhitelisted(..) => {
                write!(f, "event whitelisted")
            }
            Debug::MessageObserved(..) => {
                write!(f, "control message observed")
            }
            Debug::MessageReleased(..) => {
                write!(f, "control message released")
            }
            Debug::MessageDeferred(..) => {
                write!(f, "control message deferred on blocked channel")
            }
            Debug::ChannelBlocked(..) => {
                write!(f, "control channel blocked")
            }
            Debug::ChannelUnblocked(..) => {
                write!(f, "control channel unblocked")
            }
            Debug::FlowModObserved(..) => {
                write!(f, "flow_mod buffered in switch")
            }
            Debug::FlowModReleased(..) => {
                write!(f, "flow_mod applied to flow table")
            }
        }
    }
}

//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::hash::{Hash, Hasher};

use derive_new::new;
use rewind_events::internal::SyncValue;
use rewind_utils::fingerprint::{FingerprintValue, OfFingerprint};
use rewind_utils::ids::{ControllerId, Dpid};
use rewind_utils::time::SyncTime;

// One switch<->controller connection.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, new)]
pub struct ConnectionId {
    pub dpid: Dpid,
    pub controller_id: ControllerId,
}

/// Identity of a queued switch->controller message inside the OpenFlow
/// buffer.
#[derive(Clone, Debug, Eq, Hash, PartialEq, new)]
pub struct PendingSend {
    pub dpid: Dpid,
    pub controller_id: ControllerId,
    pub fingerprint: OfFingerprint,
}

/// Identity of a queued controller->switch message inside the OpenFlow
/// buffer.
#[derive(Clone, Debug, Eq, Hash, PartialEq, new)]
pub struct PendingReceive {
    pub dpid: Dpid,
    pub controller_id: ControllerId,
    pub fingerprint: OfFingerprint,
}

/// A state-change observation buffered on a controller's sync channel.
///
/// Identity is `(fingerprint, controller id)` only: the recorded time
/// and the interpolated values do not discriminate between otherwise
/// equivalent observations.
#[derive(Clone, Debug, new)]
pub struct PendingStateChange {
    pub controller_id: ControllerId,
    pub event_time: SyncTime,
    pub fingerprint: FingerprintValue,
    pub name: String,
    pub value: SyncValue,
}

// ===== impl ConnectionId =====

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}<->{}", self.dpid, self.controller_id)
    }
}

// ===== impl PendingStateChange =====

impl PartialEq for PendingStateChange {
    fn eq(&self, other: &PendingStateChange) -> bool {
        self.fingerprint == other.fingerprint
            && self.controller_id == other.controller_id
    }
}

impl Eq for PendingStateChange {}

impl Hash for PendingStateChange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
        self.controller_id.hash(state);
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_change_identity() {
        let psc1 = PendingStateChange::new(
            "c1".into(),
            SyncTime::new(1, 0),
            FingerprintValue::Str("link down %s".to_owned()),
            "link down %s".to_owned(),
            SyncValue::Str("s1".to_owned()),
        );
        let psc2 = PendingStateChange::new(
            "c1".into(),
            SyncTime::new(99, 0),
            FingerprintValue::Str("link down %s".to_owned()),
            "link down %s".to_owned(),
            SyncValue::Str("s2".to_owned()),
        );
        // Time and value do not enter identity.
        assert_eq!(psc1, psc2);

        let psc3 = PendingStateChange {
            controller_id: "c2".into(),
            ..psc1.clone()
        };
        assert_ne!(psc1, psc3);
    }
}

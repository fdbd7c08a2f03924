//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};

use rewind_events::internal::SyncValue;
use rewind_utils::ids::ControllerId;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::error::Error;
use crate::pending::PendingStateChange;

/// Harness-side endpoint of the controller sync channels.
///
/// Buffers the state-change notifications controllers emit and the
/// deterministic-value requests they block on. The replayer matches
/// them against `ControllerStateChange` / `DeterministicValue` trace
/// events and answers value requests from the recorded values.
#[derive(Debug, Default)]
pub struct SyncChannel {
    state_changes: Vec<PendingStateChange>,
    value_requests: BTreeMap<ControllerId, VecDeque<String>>,
    reply_txs: BTreeMap<ControllerId, UnboundedSender<SyncValue>>,
}

// ===== impl SyncChannel =====

impl SyncChannel {
    pub fn new() -> SyncChannel {
        Default::default()
    }

    // Registers the reply channel of one controller.
    pub fn register_controller(
        &mut self,
        controller_id: ControllerId,
        reply_tx: UnboundedSender<SyncValue>,
    ) {
        self.reply_txs.insert(controller_id, reply_tx);
    }

    // Buffers a fire-and-forget state change notification.
    pub fn notify_state_change(&mut self, state_change: PendingStateChange) {
        debug!(controller_id = %state_change.controller_id,
            name = %state_change.name, "state change observed");
        self.state_changes.push(state_change);
    }

    // Buffers a deterministic value request awaiting a reply.
    pub fn notify_value_request(
        &mut self,
        controller_id: ControllerId,
        name: String,
    ) {
        debug!(%controller_id, %name, "deterministic value requested");
        self.value_requests
            .entry(controller_id)
            .or_default()
            .push_back(name);
    }

    /// Whether a buffered notification matches the pending state
    /// change (identity is fingerprint + controller id).
    pub fn state_change_pending(
        &self,
        state_change: &PendingStateChange,
    ) -> bool {
        self.state_changes.contains(state_change)
    }

    /// Acknowledges (consumes) one buffered notification matching the
    /// pending state change.
    pub fn ack_pending_state_change(
        &mut self,
        state_change: &PendingStateChange,
    ) -> Result<(), Error> {
        let Some(position) = self
            .state_changes
            .iter()
            .position(|buffered| buffered == state_change)
        else {
            return Err(Error::StateChangeNotPending(
                state_change.controller_id.clone(),
            ));
        };
        self.state_changes.remove(position);
        Ok(())
    }

    /// Whether the controller has an unanswered deterministic value
    /// request.
    pub fn pending_deterministic_value_request(
        &self,
        controller_id: &ControllerId,
    ) -> bool {
        self.value_requests
            .get(controller_id)
            .is_some_and(|requests| !requests.is_empty())
    }

    /// Answers the controller's oldest deterministic value request
    /// with the recorded value.
    pub fn send_deterministic_value(
        &mut self,
        controller_id: &ControllerId,
        value: SyncValue,
    ) -> Result<(), Error> {
        let request = self
            .value_requests
            .get_mut(controller_id)
            .and_then(VecDeque::pop_front);
        let Some(name) = request else {
            return Err(Error::NoValueRequestPending(controller_id.clone()));
        };
        debug!(%controller_id, %name, %value, "deterministic value answered");
        if let Some(tx) = self.reply_txs.get(controller_id) {
            let _ = tx.send(value);
        }
        Ok(())
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use rewind_utils::fingerprint::FingerprintValue;
    use rewind_utils::time::SyncTime;
    use tokio::sync::mpsc;

    use super::*;

    fn state_change(cid: &str, fingerprint: &str) -> PendingStateChange {
        PendingStateChange::new(
            cid.into(),
            SyncTime::new(0, 0),
            FingerprintValue::Str(fingerprint.to_owned()),
            fingerprint.to_owned(),
            SyncValue::Null,
        )
    }

    #[test]
    fn test_state_change_ack() {
        let mut sync = SyncChannel::new();
        let psc = state_change("c1", "mastership changed to %s");

        assert!(!sync.state_change_pending(&psc));
        sync.notify_state_change(psc.clone());
        assert!(sync.state_change_pending(&psc));

        sync.ack_pending_state_change(&psc).unwrap();
        assert!(!sync.state_change_pending(&psc));
        assert!(matches!(
            sync.ack_pending_state_change(&psc),
            Err(Error::StateChangeNotPending(..))
        ));
    }

    #[test]
    fn test_deterministic_value_roundtrip() {
        let mut sync = SyncChannel::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sync.register_controller("c1".into(), tx);

        assert!(!sync.pending_deterministic_value_request(&"c1".into()));
        sync.notify_value_request("c1".into(), "gettimeofday".to_owned());
        assert!(sync.pending_deterministic_value_request(&"c1".into()));

        sync.send_deterministic_value(
            &"c1".into(),
            SyncValue::Time(SyncTime::new(42, 17)),
        )
        .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncValue::Time(SyncTime::new(42, 17))
        );
        assert!(!sync.pending_deterministic_value_request(&"c1".into()));
        assert!(matches!(
            sync.send_deterministic_value(&"c1".into(), SyncValue::Null),
            Err(Error::NoValueRequestPending(..))
        ));
    }
}

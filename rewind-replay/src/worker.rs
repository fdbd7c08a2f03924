//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rewind_utils::ids::ControllerId;
use rewind_utils::openflow::OfMessage;
use rewind_utils::task::Task;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::buffer::Direction;
use crate::pending::{ConnectionId, PendingStateChange};
use crate::replayer::Observation;

/// A raw OpenFlow frame intercepted on one switch<->controller
/// connection.
#[derive(Debug)]
pub struct ControlFrame {
    pub direction: Direction,
    pub data: Vec<u8>,
}

/// A message intercepted on one controller's sync channel.
#[derive(Debug)]
pub enum SyncFrame {
    StateChange(PendingStateChange),
    ValueRequest { name: String },
}

/// Source of intercepted OpenFlow frames for one connection.
pub trait Transport: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Option<ControlFrame>> + Send;
}

/// Source of intercepted sync-channel messages for one controller.
pub trait SyncTransport: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Option<SyncFrame>> + Send;
}

/// Network I/O worker for one controller connection: reads OpenFlow
/// frames and enqueues them as observations for the main loop.
///
/// The block flag suspends forwarding without dropping frames.
#[derive(Debug)]
pub struct IoWorker {
    suspended: Arc<AtomicBool>,
    _task: Task<()>,
}

// Sync-channel reader for one controller.
#[derive(Debug)]
pub struct SyncReader {
    _task: Task<()>,
}

/// The set of background workers owned by a replay session. Dropping
/// the pool cancels every worker.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: BTreeMap<ConnectionId, IoWorker>,
    readers: BTreeMap<ControllerId, SyncReader>,
}

// ===== impl IoWorker =====

impl IoWorker {
    pub fn spawn<T>(
        conn: ConnectionId,
        mut transport: T,
        observations: UnboundedSender<Observation>,
    ) -> IoWorker
    where
        T: Transport,
    {
        let suspended = Arc::new(AtomicBool::new(false));
        let flag = suspended.clone();
        let task = Task::spawn(async move {
            while let Some(frame) = transport.recv().await {
                // Hold the frame while suspended; nothing is dropped.
                while flag.load(Ordering::Acquire) {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                let message = match OfMessage::decode(&frame.data) {
                    Ok(message) => message,
                    Err(error) => {
                        warn!(%conn, %error, "failed to decode OpenFlow frame");
                        continue;
                    }
                };
                let observation = match frame.direction {
                    Direction::Send => Observation::MessageSend {
                        dpid: conn.dpid,
                        controller_id: conn.controller_id.clone(),
                        message,
                    },
                    Direction::Receive => Observation::MessageReceive {
                        dpid: conn.dpid,
                        controller_id: conn.controller_id.clone(),
                        message,
                    },
                };
                if observations.send(observation).is_err() {
                    break;
                }
            }
        });
        IoWorker {
            suspended,
            _task: task,
        }
    }

    // Suspends forwarding without dropping frames.
    pub fn block(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    // Resumes forwarding.
    pub fn unblock(&self) {
        self.suspended.store(false, Ordering::Release);
    }
}

// ===== impl SyncReader =====

impl SyncReader {
    pub fn spawn<T>(
        controller_id: ControllerId,
        mut transport: T,
        observations: UnboundedSender<Observation>,
    ) -> SyncReader
    where
        T: SyncTransport,
    {
        let task = Task::spawn(async move {
            while let Some(frame) = transport.recv().await {
                let observation = match frame {
                    SyncFrame::StateChange(state_change) => {
                        Observation::StateChange(state_change)
                    }
                    SyncFrame::ValueRequest { name } => {
                        Observation::ValueRequest {
                            controller_id: controller_id.clone(),
                            name,
                        }
                    }
                };
                if observations.send(observation).is_err() {
                    break;
                }
            }
        });
        SyncReader { _task: task }
    }
}

// ===== impl WorkerPool =====

impl WorkerPool {
    pub fn new() -> WorkerPool {
        Default::default()
    }

    pub fn add_worker(&mut self, conn: ConnectionId, worker: IoWorker) {
        self.workers.insert(conn, worker);
    }

    pub fn add_reader(
        &mut self,
        controller_id: ControllerId,
        reader: SyncReader,
    ) {
        self.readers.insert(controller_id, reader);
    }

    pub fn block(&self, conn: &ConnectionId) {
        if let Some(worker) = self.workers.get(conn) {
            worker.block();
        }
    }

    pub fn unblock(&self, conn: &ConnectionId) {
        if let Some(worker) = self.workers.get(conn) {
            worker.unblock();
        }
    }
}

// ===== trait implementations =====

impl Transport for UnboundedReceiver<ControlFrame> {
    async fn recv(&mut self) -> Option<ControlFrame> {
        UnboundedReceiver::recv(self).await
    }
}

impl SyncTransport for UnboundedReceiver<SyncFrame> {
    async fn recv(&mut self) -> Option<SyncFrame> {
        UnboundedReceiver::recv(self).await
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use rewind_utils::openflow::{OFP_VERSION, OfType};
    use tokio::sync::mpsc;

    use super::*;

    fn frame(msg_type: OfType) -> ControlFrame {
        ControlFrame {
            direction: Direction::Send,
            data: vec![OFP_VERSION, msg_type as u8, 0, 8, 0, 0, 0, 1],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_forwards_frames() {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (obs_tx, mut obs_rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new(rewind_utils::ids::Dpid(1), "c1".into());
        let _worker = IoWorker::spawn(conn, frame_rx, obs_tx);

        frame_tx.send(frame(OfType::PacketIn)).unwrap();
        let observation = obs_rx.recv().await.unwrap();
        assert!(matches!(
            observation,
            Observation::MessageSend { dpid, .. }
                if dpid == rewind_utils::ids::Dpid(1)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_worker_holds_frames() {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (obs_tx, mut obs_rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new(rewind_utils::ids::Dpid(1), "c1".into());
        let worker = IoWorker::spawn(conn, frame_rx, obs_tx);

        worker.block();
        frame_tx.send(frame(OfType::PacketIn)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(obs_rx.try_recv().is_err());

        // Unblocking delivers the held frame; nothing was dropped.
        worker.unblock();
        assert!(obs_rx.recv().await.is_some());
    }
}
